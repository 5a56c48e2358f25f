/*!
 * Core document model types for Markdown translation.
 *
 * A `Document` is split into `Paragraph`s, translatable paragraphs are cut
 * into `Unit`s, and every unit yields one `TranslationResult`. The results are
 * put back together into a `TranslatedDocument`.
 */

use serde::{Deserialize, Serialize};

/// Separator between paragraphs
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Separator between a block and the text line it was cut from
pub const LINE_SEPARATOR: &str = "\n";

/// Raw Markdown input, immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
}

impl Document {
    /// Create a document, normalising Windows line endings to `\n`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.contains("\r\n") {
            text.replace("\r\n", "\n")
        } else {
            text
        };
        Self { text }
    }

    /// The normalised document text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the document has no content at all
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// What a paragraph holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphKind {
    /// Prose, headings, lists, tables
    Text,
    /// Whitespace only
    Blank,
    /// Fenced code block
    Code,
    /// Display math block
    Math,
}

/// How a paragraph is attached to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphBreak {
    /// A blank line
    #[default]
    Blank,
    /// A single line break, where a code or math block starts or ends
    /// inside a run of text lines
    Line,
}

impl ParagraphBreak {
    /// The separator text
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blank => PARAGRAPH_SEPARATOR,
            Self::Line => LINE_SEPARATOR,
        }
    }
}

/// A contiguous span of the document between blank lines, or a code or
/// math block cut out of a run of text lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Position in the document
    pub index: usize,

    /// Raw text, including any leading or trailing whitespace
    pub text: String,

    /// Classification of the content
    pub kind: ParagraphKind,

    /// Separator in front of this paragraph, unused for the first one
    #[serde(default)]
    pub separator: ParagraphBreak,
}

impl Paragraph {
    /// Create a paragraph and classify its content.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Self { index, text, kind, separator: ParagraphBreak::Blank }
    }

    /// Attach the paragraph to its predecessor with `separator`
    pub fn with_separator(mut self, separator: ParagraphBreak) -> Self {
        self.separator = separator;
        self
    }

    /// Text without surrounding whitespace
    pub fn body(&self) -> &str {
        self.text.trim()
    }

    /// Whether the paragraph is sent to the model.
    ///
    /// Code and math blocks are only translated when block preservation is off.
    pub fn is_translatable(&self, preserve_blocks: bool) -> bool {
        match self.kind {
            ParagraphKind::Text => true,
            ParagraphKind::Blank => false,
            ParagraphKind::Code | ParagraphKind::Math => !preserve_blocks,
        }
    }

    /// Put translated body text back between the original surrounding whitespace.
    pub fn rebuild(&self, body: &str) -> String {
        let leading = &self.text[..self.text.len() - self.text.trim_start().len()];
        let trailing = &self.text[self.text.trim_end().len()..];
        format!("{}{}{}", leading, body, trailing)
    }
}

fn classify(text: &str) -> ParagraphKind {
    let body = text.trim();
    if body.is_empty() {
        ParagraphKind::Blank
    } else if body.starts_with("```") || body.starts_with("~~~") {
        ParagraphKind::Code
    } else if body.starts_with("$$") {
        ParagraphKind::Math
    } else {
        ParagraphKind::Text
    }
}

/// Whitespace placed in front of a unit when its paragraph is reassembled
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitSeparator {
    /// A single space
    #[default]
    Space,
    /// A line break plus the indentation of the next line, stored verbatim
    Newline(String),
    /// Nothing, for pieces of a word cut at character boundaries
    Attached,
}

impl UnitSeparator {
    /// A line break followed by `indent`
    pub fn newline(indent: &str) -> Self {
        Self::Newline(format!("\n{}", indent))
    }

    /// The separator text
    pub fn as_str(&self) -> &str {
        match self {
            Self::Space => " ",
            Self::Newline(text) => text,
            Self::Attached => "",
        }
    }
}

/// The atomic translation request body.
///
/// Either a whole paragraph or one sentence-bounded fragment of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Trimmed source text
    pub text: String,

    /// Index of the parent paragraph
    pub paragraph: usize,

    /// Position within the parent paragraph
    pub ordinal: usize,

    /// Token length of `text`
    pub tokens: usize,

    /// Set when a single sentence exceeded the budget and was emitted anyway
    #[serde(default)]
    pub oversized: bool,

    /// Separator placed before this unit inside its paragraph
    #[serde(default)]
    pub separator: UnitSeparator,
}

/// Output for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Index of the unit in the document's unit list
    pub unit: usize,

    /// Translated text, or the source text when the unit failed
    pub text: String,

    /// Whether the model produced a complete translation
    pub success: bool,

    /// Generation attempts actually used
    pub attempts: u32,
}

/// Summary of one translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationReport {
    /// Paragraphs in the document
    pub paragraphs: usize,

    /// Units sent to the model
    pub units_total: usize,

    /// Units translated successfully
    pub units_translated: usize,

    /// Units that failed and were kept in the source language
    pub failed_units: Vec<usize>,

    /// Generation attempts over all units
    pub total_attempts: u32,

    /// Prompt tokens reported by the backend
    pub prompt_tokens: u64,

    /// Completion tokens reported by the backend
    pub completion_tokens: u64,
}

impl TranslationReport {
    /// Record one unit result.
    pub fn record(&mut self, result: &TranslationResult) {
        self.total_attempts += result.attempts;
        if result.success {
            self.units_translated += 1;
        } else {
            self.failed_units.push(result.unit);
        }
    }

    /// Whether every unit was translated
    pub fn is_complete(&self) -> bool {
        self.failed_units.is_empty() && self.units_translated == self.units_total
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}/{} unit(s) translated in {} attempt(s)",
            self.units_translated, self.units_total, self.total_attempts
        );
        if !self.failed_units.is_empty() {
            summary.push_str(&format!(", {} kept in the source language", self.failed_units.len()));
        }
        if self.prompt_tokens + self.completion_tokens > 0 {
            summary.push_str(&format!(
                ", tokens: {} prompt + {} completion",
                self.prompt_tokens, self.completion_tokens
            ));
        }
        summary
    }
}

/// Reassembled Markdown plus the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedDocument {
    /// Translated Markdown
    pub text: String,

    /// Per-run summary
    pub report: TranslationReport,
}
