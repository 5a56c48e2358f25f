/*!
 * Context-aware document translation.
 *
 * This module contains the translation pipeline, split into several submodules:
 *
 * - `tokenizer`: Token length oracle
 * - `cache`: Length caching for the oracle
 * - `document`: Document model (paragraphs, units, results)
 * - `segmenter`: Paragraph splitting and joining
 * - `chunker`: Budget-respecting units from paragraphs
 * - `context`: Lookback context windows
 * - `prompts`: Sentinel markers and prompt construction
 * - `client`: Bounded generation with retry
 * - `orchestrator`: Runs the pipeline over a whole document
 * - `stats`: Length statistics
 */

// Re-export main types for easier usage
pub use self::chunker::{Chunker, OversizedPolicy};
pub use self::client::{BoundedGenerationClient, RetryState, Translation};
pub use self::context::{build_context, context_windows, ContextWindow};
pub use self::orchestrator::{
    budget_from, CancellationFlag, FailurePolicy, TranslationPlan, Translator, TranslatorConfig,
};
pub use self::stats::DocumentStatistics;
pub use self::tokenizer::{HeuristicTokenizer, LengthOracle, Tokenizer};

// Re-export document model types
pub use self::document::{
    Document, Paragraph, ParagraphBreak, ParagraphKind, TranslatedDocument, TranslationReport,
    TranslationResult, Unit, UnitSeparator,
};

// Re-export prompt types
pub use self::prompts::{PromptTemplate, TranslationPromptBuilder};

// Submodules
pub mod cache;
pub mod chunker;
pub mod client;
pub mod context;
pub mod document;
pub mod orchestrator;
pub mod prompts;
pub mod segmenter;
pub mod stats;
pub mod tokenizer;
