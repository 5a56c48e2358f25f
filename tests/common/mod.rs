/*!
 * Common test utilities for the llm-translator test suite
 */

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use llm_translator::providers::mock::MockProvider;
use llm_translator::translation::{HeuristicTokenizer, Translator, TranslatorConfig};

/// A short paper with headings, a list, a code block with inner blank
/// lines, display math and an extra blank line between paragraphs.
pub const SAMPLE_PAPER: &str = "# Attention Is Not All You Need

## Abstract

We study long-context translation. Our method splits documents into units. \
Each unit fits a fixed token budget. Results show fewer truncated outputs.



## Method

- Split on blank lines.
- Pack sentences greedily.

```python
def split(doc):

    return doc.split(\"\\n\\n\")
```

$$
L = -\\sum_i \\log p(y_i)
$$

We thank the reviewers, e.g. Dr. Smith, for their comments.
";

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Translator settings with negligible retry backoff
pub fn fast_config() -> TranslatorConfig {
    TranslatorConfig {
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

/// Translator over a mock backend and the heuristic tokenizer
pub fn mock_translator(provider: &MockProvider, config: TranslatorConfig) -> Translator {
    Translator::new(config, Arc::new(provider.clone()), Arc::new(HeuristicTokenizer::new()))
}
