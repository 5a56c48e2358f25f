/*!
 * Provider implementations for different generation backends.
 *
 * This module contains client implementations for the supported LLM servers:
 * - Ollama: Local LLM server
 * - vLLM: OpenAI-compatible completions server
 * - Mock: Deterministic provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single-shot text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt text
    pub prompt: String,

    /// Marker that ends generation when the model produces it.
    /// Backends keep the marker in the returned text.
    pub stop: Option<String>,

    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a new request for the given prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stop: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Stop generation at the given marker
    pub fn stop(mut self, stop: impl Into<String>) -> Self {
        self.stop = Some(stop.into());
        self
    }

    /// Limit the number of generated tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw output of one generation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    /// Decoded output text
    pub text: String,

    /// Prompt tokens reported by the backend
    pub prompt_tokens: Option<u64>,

    /// Completion tokens reported by the backend
    pub completion_tokens: Option<u64>,
}

impl Generation {
    /// Create a generation without usage information
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}

/// Common trait for all generation backends
///
/// This trait defines the generation capability the translation core consumes,
/// allowing backends to be used interchangeably and replaced by mocks in tests.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Run one generation call
    ///
    /// # Arguments
    /// * `request` - The prompt and generation parameters
    ///
    /// # Returns
    /// * `Result<Generation, ProviderError>` - The raw model output or an error
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError>;

    /// Test the connection to the provider
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Human readable backend name for logs
    fn name(&self) -> &str;
}

pub mod mock;
pub mod ollama;
pub mod vllm;
