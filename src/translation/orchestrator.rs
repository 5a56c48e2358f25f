/*!
 * Pipeline orchestrator.
 *
 * Splits the document, chunks translatable paragraphs, translates every unit
 * strictly in order with its lookback context, and reassembles the result.
 * Partial results live only in local state, so an aborted or dropped run
 * never leaves a half-translated document behind.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{ChunkError, TranslationError};
use crate::providers::Provider;
use crate::translation::chunker::{Chunker, OversizedPolicy};
use crate::translation::client::BoundedGenerationClient;
use crate::translation::context::context_windows;
use crate::translation::document::{
    Document, Paragraph, TranslatedDocument, TranslationReport, TranslationResult, Unit,
};
use crate::translation::prompts::sentinels::contains_sentinel;
use crate::translation::segmenter;
use crate::translation::stats::DocumentStatistics;
use crate::translation::tokenizer::{LengthOracle, Tokenizer};

/// Default context length of the target model
pub const DEFAULT_MAX_TOTAL_LENGTH: usize = 4096;

/// Default share of the context length one unit may take
pub const DEFAULT_BUDGET_RATIO: f64 = 0.35;

/// Unit budget for a model context length: `floor(max_total_length * ratio)`
pub fn budget_from(max_total_length: usize, budget_ratio: f64) -> usize {
    (max_total_length as f64 * budget_ratio).floor() as usize
}

/// What to do when a unit cannot be translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole document
    #[default]
    Abort,
    /// Keep the unit's source text and carry on
    KeepOriginal,
}

impl std::str::FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "abort" => Ok(Self::Abort),
            "keep_original" | "keep" => Ok(Self::KeepOriginal),
            _ => Err(anyhow::anyhow!("Invalid failure policy: {}", s)),
        }
    }
}

/// Settings for one translation run
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatorConfig {
    /// Source language code
    pub source_language: String,

    /// Target language code
    pub target_language: String,

    /// Maximum tokens per unit
    pub budget: usize,

    /// Number of preceding units sent as context
    pub num_context: usize,

    /// Total generation attempts per unit
    pub num_retry: u32,

    /// Base delay before retrying after a backend failure
    pub retry_backoff_ms: u64,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Cap on generated tokens per attempt
    pub max_output_tokens: Option<u32>,

    /// Handling of sentences longer than the budget
    pub oversized_policy: OversizedPolicy,

    /// Handling of units that fail to translate
    pub failure_policy: FailurePolicy,

    /// Pass fenced code and display math through untranslated
    pub preserve_code_blocks: bool,

    /// Terms to keep verbatim
    pub keep_terms: Vec<String>,

    /// Custom instruction template
    pub instruction: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "ja".to_string(),
            budget: budget_from(DEFAULT_MAX_TOTAL_LENGTH, DEFAULT_BUDGET_RATIO),
            num_context: 2,
            num_retry: 3,
            retry_backoff_ms: 1000,
            temperature: None,
            max_output_tokens: None,
            oversized_policy: OversizedPolicy::default(),
            failure_policy: FailurePolicy::default(),
            preserve_code_blocks: true,
            keep_terms: Vec::new(),
            instruction: None,
        }
    }
}

/// Shared flag that stops a run before its next unit
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback, called with `(done, total)` after every unit
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Paragraphs and the flat, document-ordered unit list
#[derive(Debug, Clone)]
pub struct TranslationPlan {
    /// All paragraphs, including blank and preserved ones
    pub paragraphs: Vec<Paragraph>,

    /// Units of translatable paragraphs, in document order
    pub units: Vec<Unit>,

    /// Whether each paragraph is translated
    pub translatable: Vec<bool>,
}

impl TranslationPlan {
    /// Split and chunk a document.
    pub fn build(document: &Document, chunker: &Chunker, config: &TranslatorConfig) -> Result<Self, ChunkError> {
        let paragraphs = segmenter::split(document);
        let mut units = Vec::new();
        let mut translatable = Vec::with_capacity(paragraphs.len());

        for paragraph in &paragraphs {
            let translate = paragraph.is_translatable(config.preserve_code_blocks);
            if translate {
                units.extend(chunker.chunk(paragraph, config.budget)?);
            }
            translatable.push(translate);
        }

        Ok(Self { paragraphs, units, translatable })
    }

    /// Put translated unit texts back into the document.
    ///
    /// `texts[i]` replaces `units[i]`. Fails if a sentinel marker appears
    /// anywhere in the assembled output.
    pub fn assemble<S: AsRef<str>>(&self, texts: &[S]) -> Result<String, TranslationError> {
        let mut assembled = Vec::with_capacity(self.paragraphs.len());
        let mut cursor = 0;

        for (paragraph, &translate) in self.paragraphs.iter().zip(&self.translatable) {
            let output = if translate {
                let mut body = String::new();
                while cursor < self.units.len() && self.units[cursor].paragraph == paragraph.index {
                    if !body.is_empty() {
                        body.push_str(self.units[cursor].separator.as_str());
                    }
                    body.push_str(texts.get(cursor).map_or("", |t| t.as_ref()));
                    cursor += 1;
                }
                paragraph.rebuild(&body)
            } else {
                paragraph.text.clone()
            };

            if contains_sentinel(&output) {
                error!("Sentinel marker found in assembled paragraph {}", paragraph.index);
                return Err(TranslationError::SentinelLeak { paragraph: paragraph.index });
            }
            assembled.push(output);
        }

        let separators = self.paragraphs.iter().map(|p| p.separator);
        Ok(segmenter::join_with(assembled.iter().map(String::as_str).zip(separators)))
    }
}

/// Sequential document translator
pub struct Translator {
    config: TranslatorConfig,
    oracle: LengthOracle,
    chunker: Chunker,
    client: BoundedGenerationClient,
    cancellation: CancellationFlag,
    progress: Option<ProgressCallback>,
}

impl Translator {
    /// Create a translator
    pub fn new(config: TranslatorConfig, provider: Arc<dyn Provider>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let oracle = LengthOracle::new(tokenizer);
        let chunker = Chunker::new(oracle.clone(), config.oversized_policy);
        let client = BoundedGenerationClient::new(provider, &config);

        Self {
            config,
            oracle,
            chunker,
            client,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Use a shared cancellation flag
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Report progress after every unit
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// The run settings
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// The cached length oracle
    pub fn oracle(&self) -> &LengthOracle {
        &self.oracle
    }

    /// The cancellation flag checked before every unit
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Split and chunk a document without translating it
    pub fn plan(&self, document: &Document) -> Result<TranslationPlan, ChunkError> {
        TranslationPlan::build(document, &self.chunker, &self.config)
    }

    /// Length statistics for a document under the current settings
    pub fn statistics(&self, document: &Document) -> Result<DocumentStatistics, ChunkError> {
        let plan = self.plan(document)?;
        DocumentStatistics::from_plan(&plan, &self.oracle, &self.config)
    }

    /// Translate a whole document.
    pub async fn translate(&self, document: &Document) -> Result<TranslatedDocument, TranslationError> {
        let plan = self.plan(document)?;
        let total = plan.units.len();
        info!("Translating {} unit(s) from {} paragraph(s) (budget {} tokens, context {})",
              total, plan.paragraphs.len(), self.config.budget, self.config.num_context);

        let mut report = TranslationReport {
            paragraphs: plan.paragraphs.len(),
            units_total: total,
            ..Default::default()
        };
        let mut results: Vec<TranslationResult> = Vec::with_capacity(total);

        for window in context_windows(&plan.units, self.config.num_context) {
            if self.cancellation.is_cancelled() {
                warn!("Translation cancelled after {} of {} unit(s)", window.position, total);
                return Err(TranslationError::Cancelled { completed: window.position, total });
            }

            debug!("Unit {}/{} (paragraph {}, {} tokens, {} context unit(s))",
                   window.position + 1, total, window.target.paragraph, window.target.tokens, window.context.len());

            let result = match self.client.translate_unit(&window.target.text, window.context).await {
                Ok(translation) => {
                    report.prompt_tokens += translation.prompt_tokens;
                    report.completion_tokens += translation.completion_tokens;
                    TranslationResult {
                        unit: window.position,
                        text: translation.text,
                        success: true,
                        attempts: translation.attempts,
                    }
                }
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        error!("Unit {} failed, aborting document: {}", window.position, e);
                        return Err(e);
                    }
                    FailurePolicy::KeepOriginal => {
                        warn!("Unit {} failed, keeping source text: {}", window.position, e);
                        TranslationResult {
                            unit: window.position,
                            text: window.target.text.clone(),
                            success: false,
                            attempts: e.attempts().unwrap_or(0),
                        }
                    }
                },
            };

            report.record(&result);
            results.push(result);

            if let Some(progress) = &self.progress {
                progress(results.len(), total);
            }
        }

        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        let text = plan.assemble(&texts)?;

        if !report.failed_units.is_empty() {
            warn!("{} unit(s) kept in the source language", report.failed_units.len());
        }
        info!("Translated {}/{} unit(s) in {} attempt(s)", report.units_translated, total, report.total_attempts);

        Ok(TranslatedDocument { text, report })
    }
}
