use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Generation, GenerationRequest, Provider};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model name
    model: String,
    /// Context length passed as `num_ctx`
    num_ctx: Option<u32>,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaGenerateRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
    /// Whether to use raw prompting
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    /// Context window size
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

/// One line of a streamed generation response
#[derive(Debug, Deserialize)]
pub struct GenerationChunk {
    /// Generated text fragment
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens (final chunk only)
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens (final chunk only)
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Error reported mid-stream
    #[serde(default)]
    pub error: Option<String>,
}

impl Ollama {
    /// Create a new Ollama client
    ///
    /// `endpoint` may omit the scheme, in which case `http://` is assumed.
    pub fn new(endpoint: &str, model: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let base_url = normalize_endpoint(endpoint)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            // Force HTTP/1.1 - Ollama uses HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            model: model.into(),
            num_ctx: None,
            client,
        })
    }

    /// Set the context window size sent with each request
    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, request: &GenerationRequest) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            options: Some(GenerationOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                num_ctx: self.num_ctx,
            }),
            // Stop strings are enforced client-side: Ollama strips them from the output
            stream: true,
            raw: None,
        }
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self.client.get(&url)
            .send()
            .await?
            .json()
            .await?;

        response["version"].as_str()
            .map(|v| v.to_string())
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.build_request(&request);

        let mut response = self.client.post(&url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let mut stream = StreamAccumulator::new(request.stop.as_deref());
        while let Some(bytes) = response.chunk().await? {
            if stream.feed(&bytes)? {
                // Dropping the response closes the connection and aborts generation
                debug!("Stop marker reached after {} chars, closing stream", stream.generation.text.len());
                break;
            }
        }
        stream.finish()
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {}", version);
        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Incremental parser for Ollama's JSON-lines stream
#[derive(Debug)]
struct StreamAccumulator<'a> {
    stop: Option<&'a str>,
    pending: Vec<u8>,
    generation: Generation,
    finished: bool,
}

impl<'a> StreamAccumulator<'a> {
    fn new(stop: Option<&'a str>) -> Self {
        Self {
            stop,
            pending: Vec::new(),
            generation: Generation::default(),
            finished: false,
        }
    }

    /// Consume raw bytes. Returns true once reading should stop.
    fn feed(&mut self, bytes: &[u8]) -> Result<bool, ProviderError> {
        self.pending.extend_from_slice(bytes);

        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if self.consume_line(&line)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<bool, ProviderError> {
        let line = std::str::from_utf8(line)
            .map_err(|e| ProviderError::ParseError(format!("Invalid UTF-8 in Ollama stream: {}", e)))?
            .trim();
        if line.is_empty() {
            return Ok(false);
        }

        let chunk: GenerationChunk = serde_json::from_str(line)
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama stream line: {}", e)))?;

        if let Some(message) = chunk.error {
            return Err(ProviderError::ApiError { status_code: 500, message });
        }

        self.generation.text.push_str(&chunk.response);
        if chunk.prompt_eval_count.is_some() {
            self.generation.prompt_tokens = chunk.prompt_eval_count;
        }
        if chunk.eval_count.is_some() {
            self.generation.completion_tokens = chunk.eval_count;
        }

        if chunk.done {
            self.finished = true;
            return Ok(true);
        }

        if self.stop.is_some_and(|stop| self.generation.text.contains(stop)) {
            self.finished = true;
            return Ok(true);
        }
        Ok(false)
    }

    fn finish(mut self) -> Result<Generation, ProviderError> {
        // A final line without trailing newline; ignored once reading stopped
        if !self.finished && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.consume_line(&rest)?;
        }
        Ok(self.generation)
    }
}

/// Turn a configured endpoint into a base URL without trailing slash
pub(crate) fn normalize_endpoint(endpoint: &str) -> Result<String, ProviderError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ProviderError::ConnectionError("Endpoint cannot be empty".to_string()));
    }

    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let url = url::Url::parse(&with_scheme)
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}
