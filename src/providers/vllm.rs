use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::ollama::normalize_endpoint;
use crate::providers::{Generation, GenerationRequest, Provider};

/// Client for an OpenAI-compatible completions server such as vLLM
#[derive(Debug)]
pub struct Vllm {
    /// HTTP client for API requests
    client: Client,
    /// API base URL, e.g. `http://localhost:8000/v1`
    base_url: String,
    /// Model name served by the endpoint
    model: String,
    /// Optional bearer token
    api_key: String,
}

/// Completions request
#[derive(Debug, Serialize)]
pub struct CompletionRequest {
    /// The model to use
    model: String,

    /// Prompt text
    prompt: String,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Stop strings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,

    /// vLLM extension: keep the matched stop string in the output
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    include_stop_str_in_output: bool,
}

/// Completions response
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    /// Generated choices
    pub choices: Vec<CompletionChoice>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// One generated choice
#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    /// Generated text
    pub text: String,
    /// Why generation ended (`stop`, `length`)
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// The stop string or token that ended generation (vLLM only)
    #[serde(default)]
    pub stop_reason: Option<serde_json::Value>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens
    pub prompt_tokens: u64,
    /// Number of generated tokens
    pub completion_tokens: u64,
}

impl Vllm {
    /// Create a new client
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_endpoint(endpoint)?,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop.iter().cloned().collect(),
            include_stop_str_in_output: request.stop.is_some(),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
        }
    }
}

/// Turn a completions response into raw output text
///
/// Servers that ignore `include_stop_str_in_output` still report the matched
/// stop string in `stop_reason`; the marker is restored in that case so the
/// caller can verify it.
fn extract_generation(response: CompletionResponse, stop: Option<&str>) -> Result<Generation, ProviderError> {
    let choice = response.choices.into_iter().next()
        .ok_or_else(|| ProviderError::ParseError("Completions response has no choices".to_string()))?;

    let mut text = choice.text;
    if let Some(stop) = stop {
        let stopped_on_marker = choice.finish_reason.as_deref() == Some("stop")
            && choice.stop_reason.as_ref().and_then(|r| r.as_str()) == Some(stop);
        if stopped_on_marker && !text.contains(stop) {
            text.push_str(stop);
        }
    }

    Ok(Generation {
        text,
        prompt_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
        completion_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
    })
}

#[async_trait]
impl Provider for Vllm {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
        let url = format!("{}/completions", self.base_url);
        let body = self.build_request(&request);

        let response = self.authorize(self.client.post(&url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Completions API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let completion = response.json::<CompletionResponse>().await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse completions response: {}", e)))?;

        extract_generation(completion, request.stop.as_deref())
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }
        debug!("Connected to completions server at {}", self.base_url);
        Ok(())
    }

    fn name(&self) -> &str {
        "vllm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> CompletionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_buildRequest_withStop_shouldAskToKeepStopString() {
        let client = Vllm::new("http://localhost:8000/v1", "Qwen/Qwen2.5-7B-Instruct", "", 30).unwrap();
        let request = GenerationRequest::new("prompt").stop("<END>");

        let json = serde_json::to_value(client.build_request(&request)).unwrap();
        assert_eq!(json["stop"][0], "<END>");
        assert_eq!(json["include_stop_str_in_output"], true);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_buildRequest_withoutStop_shouldOmitStopFields() {
        let client = Vllm::new("localhost:8000/v1", "m", "", 30).unwrap();
        let json = serde_json::to_value(client.build_request(&GenerationRequest::new("p"))).unwrap();
        assert!(json.get("stop").is_none());
        assert!(json.get("include_stop_str_in_output").is_none());
    }

    #[test]
    fn test_extractGeneration_withStrippedStopString_shouldRestoreMarker() {
        let completion = response(r#"{
            "choices": [{"text": "翻訳", "finish_reason": "stop", "stop_reason": "<END>"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }"#);

        let generation = extract_generation(completion, Some("<END>")).unwrap();
        assert_eq!(generation.text, "翻訳<END>");
        assert_eq!(generation.prompt_tokens, Some(12));
        assert_eq!(generation.completion_tokens, Some(4));
    }

    #[test]
    fn test_extractGeneration_withLengthFinish_shouldNotInventMarker() {
        let completion = response(r#"{"choices": [{"text": "途中", "finish_reason": "length", "stop_reason": null}]}"#);

        let generation = extract_generation(completion, Some("<END>")).unwrap();
        assert_eq!(generation.text, "途中");
        assert_eq!(generation.prompt_tokens, None);
    }

    #[test]
    fn test_extractGeneration_withNoChoices_shouldFail() {
        let completion = response(r#"{"choices": []}"#);
        assert!(matches!(extract_generation(completion, None), Err(ProviderError::ParseError(_))));
    }
}
