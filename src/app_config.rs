use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::translation::chunker::OversizedPolicy;
use crate::translation::orchestrator::{budget_from, FailurePolicy, TranslatorConfig};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Generation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: vLLM or any OpenAI-compatible completions server
    Vllm,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Vllm => "vLLM",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::Vllm => "vllm".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "vllm" | "openai-compatible" => Ok(Self::Vllm),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Server-side context window (Ollama num_ctx)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                timeout_secs: default_timeout_secs(),
                num_ctx: None,
            },
            TranslationProvider::Vllm => Self {
                provider_type: "vllm".to_string(),
                model: default_vllm_model(),
                api_key: String::new(),
                endpoint: default_vllm_endpoint(),
                timeout_secs: default_timeout_secs(),
                num_ctx: None,
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Generation backend to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available generation backends
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,

    /// Document segmentation settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Instruction appended after the target block
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// Total generation attempts per unit
    #[serde(default = "default_num_retry")]
    pub num_retry: u32,

    /// Backoff base for retries after backend failures (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Cap on generated tokens per request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Behaviour when a unit cannot be translated
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Terms that must stay untranslated
    #[serde(default)]
    pub keep_terms: Vec<String>,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            instruction: default_instruction(),
            num_retry: default_num_retry(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            max_output_tokens: None,
            failure_policy: FailurePolicy::default(),
            keep_terms: Vec::new(),
        }
    }
}

/// How documents are cut into units
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Context length of the model in tokens
    #[serde(default = "default_max_total_length")]
    pub max_total_length: usize,

    /// Share of the context length a single unit may take
    #[serde(default = "default_budget_ratio")]
    pub budget_ratio: f64,

    /// Preceding units sent as context
    #[serde(default = "default_num_context")]
    pub num_context: usize,

    /// Behaviour for single sentences over the budget
    #[serde(default)]
    pub oversized_policy: OversizedPolicy,

    /// Pass fenced code and display math through untranslated
    #[serde(default = "default_true")]
    pub preserve_code_blocks: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_total_length: default_max_total_length(),
            budget_ratio: default_budget_ratio(),
            num_context: default_num_context(),
            oversized_policy: OversizedPolicy::default(),
            preserve_code_blocks: true,
        }
    }
}

impl SegmentationConfig {
    /// Unit budget in tokens
    pub fn budget(&self) -> usize {
        budget_from(self.max_total_length, self.budget_ratio)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_timeout_secs() -> u64 {
    300 // long documents on local models are slow
}

fn default_num_retry() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_total_length() -> usize {
    4096
}

fn default_budget_ratio() -> f64 {
    0.35
}

fn default_num_context() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_vllm_endpoint() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_vllm_model() -> String {
    "Qwen/Qwen2.5-7B-Instruct".to_string()
}

fn default_instruction() -> String {
    crate::translation::prompts::PromptTemplate::PAPER_TRANSLATOR.to_string()
}

impl Config {
    /// Load the configuration file, creating it with defaults if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;
        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!("Source and target language are both '{}'", self.target_language));
        }

        let segmentation = &self.translation.segmentation;
        if segmentation.max_total_length == 0 {
            return Err(anyhow!("max_total_length must be greater than 0"));
        }
        if !(segmentation.budget_ratio > 0.0 && segmentation.budget_ratio <= 1.0) {
            return Err(anyhow!("budget_ratio must be in (0, 1], got {}", segmentation.budget_ratio));
        }
        if segmentation.budget() == 0 {
            return Err(anyhow!(
                "Unit budget is 0 tokens (max_total_length {} x budget_ratio {})",
                segmentation.max_total_length, segmentation.budget_ratio
            ));
        }

        let common = &self.translation.common;
        if common.num_retry == 0 {
            return Err(anyhow!("num_retry must be at least 1"));
        }
        if !(0.0..=2.0).contains(&common.temperature) {
            return Err(anyhow!("temperature must be between 0.0 and 2.0, got {}", common.temperature));
        }
        if common.keep_terms.iter().any(|term| term.trim().is_empty()) {
            return Err(anyhow!("keep_terms must not contain empty entries"));
        }

        let endpoint = self.translation.get_endpoint();
        let with_scheme = if endpoint.contains("://") {
            endpoint.clone()
        } else {
            format!("http://{}", endpoint)
        };
        url::Url::parse(&with_scheme)
            .with_context(|| format!("Invalid {} endpoint: {}", self.translation.provider.display_name(), endpoint))?;

        Ok(())
    }

    /// Settings for the translation pipeline
    pub fn translator_config(&self) -> TranslatorConfig {
        let common = &self.translation.common;
        let segmentation = &self.translation.segmentation;

        TranslatorConfig {
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            budget: segmentation.budget(),
            num_context: segmentation.num_context,
            num_retry: common.num_retry,
            retry_backoff_ms: common.retry_backoff_ms,
            temperature: Some(common.temperature),
            max_output_tokens: common.max_output_tokens,
            oversized_policy: segmentation.oversized_policy,
            failure_policy: common.failure_policy,
            preserve_code_blocks: segmentation.preserve_code_blocks,
            keep_terms: common.keep_terms.clone(),
            instruction: Some(common.instruction.clone()),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "ja".to_string(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable configuration of the active provider, added with defaults if absent
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Vllm => default_vllm_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Vllm => default_vllm_endpoint(),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|&t| t > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::Vllm),
            ],
            common: TranslationCommonConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}
