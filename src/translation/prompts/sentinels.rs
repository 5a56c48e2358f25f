/*!
 * Sentinel markers delimiting text in prompts and model output.
 *
 * Every context unit and the target unit are wrapped in a
 * `<TRANSLATE_START>` / `<TRANSLATE_END>` pair. The model is asked to answer
 * with its translation wrapped the same way; an answer without the end
 * marker is treated as truncated or malformed.
 */

use log::debug;

/// Opening sentinel
pub const SENTINEL_START: &str = "<TRANSLATE_START>";

/// Closing sentinel, also used as the generation stop marker
pub const SENTINEL_END: &str = "<TRANSLATE_END>";

/// Wrap a text block in the sentinel pair
pub fn wrap(text: &str) -> String {
    format!("{}\n{}\n{}", SENTINEL_START, text, SENTINEL_END)
}

/// Whether the text contains either sentinel
pub fn contains_sentinel(text: &str) -> bool {
    text.contains(SENTINEL_START) || text.contains(SENTINEL_END)
}

/// Outcome of checking one raw model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelCheck {
    /// The end sentinel was found; holds the text before it
    Complete(String),
    /// The end sentinel was found but nothing precedes it
    Empty,
    /// The end sentinel is missing
    Unterminated,
}

/// Check a raw output for the end sentinel and cut it there
///
/// Everything from the first end sentinel on is discarded. A start sentinel
/// echoed by the model is stripped along with anything before it.
pub fn extract_translation(output: &str) -> SentinelCheck {
    let Some(end_pos) = output.find(SENTINEL_END) else {
        debug!("End sentinel missing in {} chars of output", output.len());
        return SentinelCheck::Unterminated;
    };

    let mut body = &output[..end_pos];
    if let Some(start_pos) = body.rfind(SENTINEL_START) {
        body = &body[start_pos + SENTINEL_START.len()..];
    }

    let body = body.trim();
    if body.is_empty() {
        SentinelCheck::Empty
    } else {
        SentinelCheck::Complete(body.to_string())
    }
}
