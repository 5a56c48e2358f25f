/*!
 * Bounded generation client.
 *
 * Wraps one generation call per unit: the context and target are wrapped in
 * sentinels, generation stops on the end sentinel, and the raw output is
 * checked for it afterwards. Output without the end sentinel and transient
 * backend failures are retried within a fixed attempt budget.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::{GenerationRequest, Provider};
use crate::translation::document::Unit;
use crate::translation::orchestrator::TranslatorConfig;
use crate::translation::prompts::{extract_translation, PromptTemplate, SentinelCheck, TranslationPromptBuilder, SENTINEL_END};

/// Position in the bounded retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Making the given attempt, counted from 1
    Attempting(u32),
    /// A complete translation was extracted
    Succeeded,
    /// Every attempt was used without success
    Exhausted,
}

impl RetryState {
    /// State after a failed attempt
    pub fn after_failure(self, max_attempts: u32) -> Self {
        match self {
            Self::Attempting(attempt) if attempt < max_attempts => Self::Attempting(attempt + 1),
            Self::Attempting(_) => Self::Exhausted,
            state => state,
        }
    }
}

/// A translated unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Translated text with sentinels removed
    pub text: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Prompt tokens reported by the backend over all attempts
    pub prompt_tokens: u64,
    /// Completion tokens reported by the backend over all attempts
    pub completion_tokens: u64,
}

/// Generation client with sentinel discipline and bounded retry
#[derive(Debug, Clone)]
pub struct BoundedGenerationClient {
    provider: Arc<dyn Provider>,
    /// Display name of the source language
    source_language: String,
    /// Display name of the target language
    target_language: String,
    template: PromptTemplate,
    keep_terms: Vec<String>,
    /// Total attempt budget per unit
    num_retry: u32,
    retry_backoff_ms: u64,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl BoundedGenerationClient {
    /// Create a client for the given provider and settings
    pub fn new(provider: Arc<dyn Provider>, config: &TranslatorConfig) -> Self {
        let template = config.instruction.as_deref()
            .map(PromptTemplate::new)
            .unwrap_or_default();

        Self {
            provider,
            source_language: display_name(&config.source_language),
            target_language: display_name(&config.target_language),
            template,
            keep_terms: config.keep_terms.clone(),
            num_retry: config.num_retry.max(1),
            retry_backoff_ms: config.retry_backoff_ms,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// Build the prompt for one target and its context
    pub fn build_prompt(&self, target: &str, context: &[Unit]) -> String {
        TranslationPromptBuilder::new(&self.source_language, &self.target_language)
            .with_template(self.template.clone())
            .with_context(context.iter().map(|unit| unit.text.as_str()))
            .with_keep_terms(self.keep_terms.iter().map(String::as_str))
            .build(target)
    }

    /// Translate one unit.
    ///
    /// Makes at most `num_retry` generation calls. Fails with
    /// `IncompleteTranslation` when no attempt produced the end sentinel, or
    /// with `GenerationBackend` when the last attempt failed on the backend or
    /// the backend reported a non-retryable error.
    pub async fn translate_unit(&self, target: &str, context: &[Unit]) -> Result<Translation, TranslationError> {
        let mut request = GenerationRequest::new(self.build_prompt(target, context)).stop(SENTINEL_END);
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_output_tokens {
            request = request.max_tokens(max_tokens);
        }

        let mut state = RetryState::Attempting(1);
        let mut attempts = 0;
        let mut translated = String::new();
        let mut last_error: Option<ProviderError> = None;
        let mut prompt_tokens = 0;
        let mut completion_tokens = 0;

        loop {
            match state {
                RetryState::Attempting(attempt) => {
                    attempts = attempt;
                    match self.provider.generate(request.clone()).await {
                        Ok(generation) => {
                            prompt_tokens += generation.prompt_tokens.unwrap_or(0);
                            completion_tokens += generation.completion_tokens.unwrap_or(0);
                            last_error = None;

                            match extract_translation(&generation.text) {
                                SentinelCheck::Complete(text) => {
                                    translated = text;
                                    state = RetryState::Succeeded;
                                }
                                SentinelCheck::Empty => {
                                    warn!("Empty translation between sentinels - attempt {}/{}", attempt, self.num_retry);
                                    state = state.after_failure(self.num_retry);
                                }
                                SentinelCheck::Unterminated => {
                                    warn!("Output has no end sentinel - attempt {}/{}", attempt, self.num_retry);
                                    state = state.after_failure(self.num_retry);
                                }
                            }
                        }
                        Err(e) if !e.is_retryable() => {
                            error!("{} backend error, not retrying: {}", self.provider.name(), e);
                            return Err(TranslationError::GenerationBackend { attempts: attempt, source: e });
                        }
                        Err(e) => {
                            error!("{} backend error: {} - attempt {}/{}", self.provider.name(), e, attempt, self.num_retry);
                            last_error = Some(e);
                            state = state.after_failure(self.num_retry);

                            if let RetryState::Attempting(_) = state {
                                let backoff_ms = self.retry_backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                            }
                        }
                    }
                }
                RetryState::Succeeded => {
                    debug!("Unit translated in {} attempt(s)", attempts);
                    return Ok(Translation {
                        text: translated,
                        attempts,
                        prompt_tokens,
                        completion_tokens,
                    });
                }
                RetryState::Exhausted => {
                    return Err(match last_error {
                        Some(source) => TranslationError::GenerationBackend { attempts, source },
                        None => TranslationError::IncompleteTranslation { attempts },
                    });
                }
            }
        }
    }
}

fn display_name(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}
