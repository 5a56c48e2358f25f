/*!
 * Error types for the llm-translator application.
 *
 * This module contains custom error types for the different layers of the
 * translation pipeline, using the thiserror crate for ergonomic error definitions.
 * Chunk- and unit-level errors always propagate upward; only the orchestrator
 * decides whether a failed unit aborts the document.
 */

use thiserror::Error;

/// Errors that can occur when working with generation backends
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether another attempt may succeed.
    ///
    /// Server errors, rate limiting, connection problems and malformed
    /// responses are transient. Authentication failures and other client
    /// errors will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ParseError(_) | Self::ConnectionError(_) => true,
            Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::AuthenticationError(_) => false,
        }
    }

    /// Map an HTTP error status and body to a provider error.
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised by a tokenizer backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizationError {
    /// The input contains a character the tokenizer cannot encode
    #[error("Unsupported character U+{code_point:04X} at byte offset {offset}")]
    UnsupportedCharacter {
        /// Unicode scalar value of the rejected character
        code_point: u32,
        /// Byte offset of the character in the input
        offset: usize,
    },

    /// The tokenizer backend failed for another reason
    #[error("Tokenizer backend error: {0}")]
    Backend(String),
}

/// Errors raised while splitting a paragraph into units
#[derive(Error, Debug)]
pub enum ChunkError {
    /// A single sentence does not fit into the unit budget
    #[error("Sentence in paragraph {paragraph} needs {tokens} tokens, budget is {budget}")]
    OversizedSentence {
        /// Ordinal of the paragraph holding the sentence
        paragraph: usize,
        /// Token length of the sentence
        tokens: usize,
        /// Configured unit budget
        budget: usize,
    },

    /// Measuring a span failed
    #[error("Tokenization error: {0}")]
    Tokenization(#[from] TokenizationError),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The model never produced a sentinel-terminated answer
    #[error("Incomplete translation: no end sentinel after {attempts} attempt(s)")]
    IncompleteTranslation {
        /// Number of generation attempts made
        attempts: u32,
    },

    /// The generation backend kept failing
    #[error("Generation backend failed after {attempts} attempt(s): {source}")]
    GenerationBackend {
        /// Number of generation attempts made
        attempts: u32,
        /// Last backend error
        #[source]
        source: ProviderError,
    },

    /// Measuring a unit failed
    #[error("Tokenization error: {0}")]
    Tokenization(#[from] TokenizationError),

    /// Chunking a paragraph failed
    #[error("Chunking error: {0}")]
    Chunk(ChunkError),

    /// The run was aborted before completion
    #[error("Translation cancelled after {completed} of {total} unit(s)")]
    Cancelled {
        /// Units finished before cancellation
        completed: usize,
        /// Units in the document
        total: usize,
    },

    /// A sentinel marker survived into the assembled document
    #[error("Sentinel marker leaked into paragraph {paragraph} of the translated output")]
    SentinelLeak {
        /// Ordinal of the offending paragraph
        paragraph: usize,
    },
}

impl From<ChunkError> for TranslationError {
    fn from(error: ChunkError) -> Self {
        match error {
            ChunkError::Tokenization(e) => Self::Tokenization(e),
            other => Self::Chunk(other),
        }
    }
}

impl TranslationError {
    /// Generation attempts consumed before the error, if any were made
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::IncompleteTranslation { attempts } | Self::GenerationBackend { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
