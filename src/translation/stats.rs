/*!
 * Document statistics.
 *
 * Token lengths of translatable paragraphs and of the requests the pipeline
 * would send, used to pick a budget and context size before a run.
 */

use std::fmt;

use serde::Serialize;

use crate::errors::ChunkError;
use crate::translation::chunker::Chunker;
use crate::translation::context::context_windows;
use crate::translation::document::Document;
use crate::translation::orchestrator::{TranslationPlan, TranslatorConfig};
use crate::translation::tokenizer::LengthOracle;

/// Average, minimum and maximum of a set of lengths
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LengthSummary {
    /// Number of samples
    pub count: usize,
    /// Mean length
    pub average: f64,
    /// Shortest length
    pub min: usize,
    /// Longest length
    pub max: usize,
}

impl LengthSummary {
    /// Summarise a sequence of lengths; all zero when empty
    pub fn from_lengths(lengths: impl IntoIterator<Item = usize>) -> Self {
        let mut summary = Self::default();
        let mut total = 0usize;

        for length in lengths {
            if summary.count == 0 {
                summary.min = length;
                summary.max = length;
            } else {
                summary.min = summary.min.min(length);
                summary.max = summary.max.max(length);
            }
            total += length;
            summary.count += 1;
        }

        if summary.count > 0 {
            summary.average = total as f64 / summary.count as f64;
        }
        summary
    }
}

impl fmt::Display for LengthSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "avg {:.1}, min {}, max {}", self.average, self.min, self.max)
    }
}

/// Length statistics of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStatistics {
    /// Translatable paragraphs
    pub paragraphs: usize,

    /// Token lengths of translatable paragraphs
    pub paragraph_tokens: LengthSummary,

    /// Units after chunking
    pub units: usize,

    /// Units flagged as over budget
    pub oversized_units: usize,

    /// Unit budget in tokens
    pub budget: usize,

    /// Context units per request
    pub num_context: usize,

    /// Context plus target tokens per request
    pub request_tokens: LengthSummary,
}

impl DocumentStatistics {
    /// Compute statistics for a document.
    pub fn compute(document: &Document, oracle: &LengthOracle, config: &TranslatorConfig) -> Result<Self, ChunkError> {
        let chunker = Chunker::new(oracle.clone(), config.oversized_policy);
        let plan = TranslationPlan::build(document, &chunker, config)?;
        Self::from_plan(&plan, oracle, config)
    }

    /// Compute statistics for an existing plan.
    pub fn from_plan(plan: &TranslationPlan, oracle: &LengthOracle, config: &TranslatorConfig) -> Result<Self, ChunkError> {
        let mut paragraph_lengths = Vec::new();
        for (paragraph, &translate) in plan.paragraphs.iter().zip(&plan.translatable) {
            if translate {
                paragraph_lengths.push(oracle.length(paragraph.body())?);
            }
        }

        Ok(Self {
            paragraphs: paragraph_lengths.len(),
            paragraph_tokens: LengthSummary::from_lengths(paragraph_lengths),
            units: plan.units.len(),
            oversized_units: plan.units.iter().filter(|u| u.oversized).count(),
            budget: config.budget,
            num_context: config.num_context,
            request_tokens: LengthSummary::from_lengths(
                context_windows(&plan.units, config.num_context).map(|w| w.request_tokens()),
            ),
        })
    }
}

impl fmt::Display for DocumentStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Paragraphs: {}", self.paragraphs)?;
        writeln!(f, "Paragraph tokens: {}", self.paragraph_tokens)?;
        writeln!(f, "Units (budget {}): {}", self.budget, self.units)?;
        if self.oversized_units > 0 {
            writeln!(f, "Oversized units: {}", self.oversized_units)?;
        }
        write!(f, "Request tokens (context {}): {}", self.num_context, self.request_tokens)
    }
}
