/*!
 * Length oracle: token counts for text spans.
 *
 * The chunker and the statistics pass only need to know how long a span is in
 * model-native units. `Tokenizer` is the capability; `HeuristicTokenizer` is a
 * deterministic offline estimate; `LengthOracle` memoises lengths per run.
 */

use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TokenizationError;
use crate::translation::cache::LengthCache;
use crate::translation::prompts::{SENTINEL_END, SENTINEL_START};

/// Id reserved for the opening sentinel
pub const SENTINEL_START_ID: u32 = 1;

/// Id reserved for the closing sentinel
pub const SENTINEL_END_ID: u32 = 2;

/// First id available to ordinary pieces
const FIRST_PIECE_ID: u32 = 256;

/// Longest piece a single word token may cover, in characters
const MAX_PIECE_CHARS: usize = 4;

// @pretokenizer: one CJK character, a run of other word characters, or one mark
static PIECE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}]|[\w&&[^\p{Han}\p{Hiragana}\p{Katakana}]]+|[^\w\s]")
        .expect("Invalid pretokenizer regex")
});

/// Tokenizer capability
pub trait Tokenizer: Send + Sync + Debug {
    /// Encode text into token ids
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError>;

    /// Number of tokens in the text
    fn length(&self, text: &str) -> Result<usize, TokenizationError> {
        Ok(self.encode(text)?.len())
    }

    /// Id of a registered special marker
    fn special_token_id(&self, marker: &str) -> Option<u32>;
}

/// Regex-based token estimator
///
/// Words are cut into pieces of at most four characters, which tracks
/// subword vocabularies closely enough for budgeting English prose.
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    /// Special markers and their reserved ids
    specials: Vec<(&'static str, u32)>,
}

impl HeuristicTokenizer {
    /// Create a tokenizer with the sentinel markers registered
    pub fn new() -> Self {
        Self {
            specials: vec![(SENTINEL_START, SENTINEL_START_ID), (SENTINEL_END, SENTINEL_END_ID)],
        }
    }

    fn check_characters(text: &str) -> Result<(), TokenizationError> {
        for (offset, c) in text.char_indices() {
            if c.is_ascii_control() && c != '\t' && c != '\n' && c != '\r' && c != '\x7f' {
                return Err(TokenizationError::UnsupportedCharacter {
                    code_point: c as u32,
                    offset,
                });
            }
        }
        Ok(())
    }

    fn piece_id(piece: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        piece.hash(&mut hasher);
        FIRST_PIECE_ID + (hasher.finish() % u64::from(u32::MAX - FIRST_PIECE_ID)) as u32
    }

    fn encode_plain(&self, text: &str, ids: &mut Vec<u32>) {
        for found in PIECE_REGEX.find_iter(text) {
            let chars: Vec<char> = found.as_str().chars().collect();
            for piece in chars.chunks(MAX_PIECE_CHARS) {
                let piece: String = piece.iter().collect();
                ids.push(Self::piece_id(&piece));
            }
        }
    }

    fn next_special(&self, text: &str) -> Option<(usize, &'static str, u32)> {
        self.specials.iter()
            .filter_map(|&(marker, id)| text.find(marker).map(|pos| (pos, marker, id)))
            .min_by_key(|&(pos, _, _)| pos)
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        Self::check_characters(text)?;

        let mut ids = Vec::new();
        let mut rest = text;
        while let Some((pos, marker, id)) = self.next_special(rest) {
            self.encode_plain(&rest[..pos], &mut ids);
            ids.push(id);
            rest = &rest[pos + marker.len()..];
        }
        self.encode_plain(rest, &mut ids);

        Ok(ids)
    }

    fn special_token_id(&self, marker: &str) -> Option<u32> {
        self.specials.iter().find(|(m, _)| *m == marker).map(|&(_, id)| id)
    }
}

/// Cached token lengths over a shared tokenizer
#[derive(Debug, Clone)]
pub struct LengthOracle {
    tokenizer: Arc<dyn Tokenizer>,
    cache: LengthCache,
}

impl LengthOracle {
    /// Create an oracle over the given tokenizer
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            cache: LengthCache::new(true),
        }
    }

    /// Create an oracle over the heuristic tokenizer
    pub fn heuristic() -> Self {
        Self::new(Arc::new(HeuristicTokenizer::new()))
    }

    /// Token length of a span
    pub fn length(&self, text: &str) -> Result<usize, TokenizationError> {
        if let Some(length) = self.cache.get(text) {
            return Ok(length);
        }

        let length = self.tokenizer.length(text)?;
        self.cache.store(text, length);
        Ok(length)
    }

    /// The underlying tokenizer
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Cache statistics as `(hits, misses, hit_rate)`
    pub fn cache_stats(&self) -> (usize, usize, f64) {
        self.cache.stats()
    }

    /// Forget all cached lengths
    pub fn clear(&self) {
        let (hits, misses, _) = self.cache.stats();
        debug!("Clearing length cache ({} hits, {} misses)", hits, misses);
        self.cache.clear();
    }
}
