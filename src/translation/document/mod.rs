/*!
 * Document modeling for Markdown translation.
 *
 * This module provides the types that flow through the pipeline:
 * - The immutable source document and its paragraphs
 * - Units, the bodies of individual translation requests
 * - Per-unit results and the reassembled output with its run report
 */

pub mod model;

// Re-export types used by other modules
pub use model::{
    Document, Paragraph, ParagraphBreak, ParagraphKind, TranslatedDocument, TranslationReport,
    TranslationResult, Unit, UnitSeparator, LINE_SEPARATOR, PARAGRAPH_SEPARATOR,
};
