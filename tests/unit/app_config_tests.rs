/*!
 * Tests for configuration loading and validation
 */

use anyhow::Result;
use llm_translator::app_config::{Config, LogLevel, TranslationProvider};
use llm_translator::translation::{FailurePolicy, OversizedPolicy};
use crate::common;

/// The config file is created with defaults and read back unchanged
#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let created = Config::load_or_create(&path)?;
    assert!(path.exists());

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.target_language, created.target_language);
    assert_eq!(loaded.translation.get_model(), "qwen2.5:7b");
    assert_eq!(loaded.log_level, LogLevel::Info);
    assert!(loaded.validate().is_ok());
    Ok(())
}

/// Saved settings survive a reload
#[test]
fn test_save_withCustomSettings_shouldRoundTrip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("custom.json");
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Vllm;
    config.translation.segmentation.num_context = 5;
    config.translation.segmentation.oversized_policy = OversizedPolicy::Fail;
    config.translation.common.failure_policy = FailurePolicy::KeepOriginal;
    config.translation.common.keep_terms = vec!["Transformer".to_string()];

    config.save(&path)?;
    let loaded = Config::load_or_create(&path)?;

    assert_eq!(loaded.translation.provider, TranslationProvider::Vllm);
    let translator = loaded.translator_config();
    assert_eq!(translator.num_context, 5);
    assert_eq!(translator.oversized_policy, OversizedPolicy::Fail);
    assert_eq!(translator.failure_policy, FailurePolicy::KeepOriginal);
    assert_eq!(translator.keep_terms, vec!["Transformer".to_string()]);
    Ok(())
}

/// Malformed JSON is reported instead of replaced
#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Endpoints must parse as URLs
#[test]
fn test_validate_withBrokenEndpoint_shouldFail() {
    let mut config = Config::default();
    config.translation.active_provider_config_mut().endpoint = "http://[::1".to_string();

    assert!(config.validate().is_err());
}

/// Budget follows max_total_length and budget_ratio
#[test]
fn test_translatorConfig_shouldDeriveBudget() {
    let mut config = Config::default();
    config.translation.segmentation.max_total_length = 8192;
    config.translation.segmentation.budget_ratio = 0.25;

    assert_eq!(config.translator_config().budget, 2048);
    assert_eq!(config.translator_config().source_language, "en");
}
