/*!
 * Integration tests for application lifecycle
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use llm_translator::app_config::Config;
use llm_translator::app_controller::{Controller, FileOutcome, FolderSummary};
use llm_translator::file_utils::FileManager;
use llm_translator::providers::mock::MockProvider;
use crate::common::{self, SAMPLE_PAPER};

fn mock_controller(provider: &MockProvider) -> Controller {
    let mut config = Config::default();
    config.translation.common.retry_backoff_ms = 1;
    Controller::with_provider(config, Arc::new(provider.clone()))
}

/// Interrupt source firing after 20ms for the first `signals` calls, then never
async fn interrupt(call: usize, signals: usize) -> std::io::Result<()> {
    if call < signals {
        tokio::time::sleep(Duration::from_millis(20)).await;
    } else {
        std::future::pending::<()>().await;
    }
    Ok(())
}

/// A single file is translated next to its source
#[tokio::test]
async fn test_run_withMarkdownFile_shouldWriteSuffixedOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "paper.md", SAMPLE_PAPER)?;
    let provider = MockProvider::working();
    let controller = mock_controller(&provider);

    let outcome = controller.run(input, temp_dir.path().to_path_buf(), false).await?;

    let expected = temp_dir.path().join("paper_ja.md");
    assert_eq!(outcome, FileOutcome::Translated(expected.clone()));
    let output = FileManager::read_to_string(&expected)?;
    assert!(output.starts_with("[TRANSLATED] # Attention Is Not All You Need\n\n"));
    assert!(output.contains("```python\ndef split(doc):\n\n"));
    assert!(!output.contains("<TRANSLATE_"));
    Ok(())
}

/// Existing outputs are only replaced with force overwrite
#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "notes.md", "Hello.")?;
    let existing = common::create_test_file(temp_dir.path(), "notes_ja.md", "old")?;
    let provider = MockProvider::working();
    let controller = mock_controller(&provider);

    let outcome = controller.run(input.clone(), temp_dir.path().to_path_buf(), false).await?;
    assert_eq!(outcome, FileOutcome::Skipped(existing.clone()));
    assert_eq!(provider.request_count(), 0);
    assert_eq!(FileManager::read_to_string(&existing)?, "old");

    controller.run(input, temp_dir.path().to_path_buf(), true).await?;
    assert_eq!(FileManager::read_to_string(&existing)?, "[TRANSLATED] Hello.");
    Ok(())
}

/// A failed document leaves no partial output behind
#[tokio::test]
async fn test_run_withFailingBackend_shouldNotWriteOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "paper.md", "One.\n\nTwo.")?;
    let controller = mock_controller(&MockProvider::failing());

    let result = controller.run(input, temp_dir.path().to_path_buf(), false).await;

    assert!(result.is_err());
    assert!(!temp_dir.path().join("paper_ja.md").exists());
    Ok(())
}

/// A missing input file is an error
#[tokio::test]
async fn test_run_withMissingFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = mock_controller(&MockProvider::working());

    let result = controller
        .run(temp_dir.path().join("absent.md"), temp_dir.path().to_path_buf(), false)
        .await;

    assert!(result.is_err());
    Ok(())
}

/// Folder mode translates every source once and skips previous outputs
#[tokio::test]
async fn test_runFolder_withNestedFiles_shouldTranslateEachSource() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "a.md", "Alpha.")?;
    common::create_test_file(temp_dir.path(), "sub/b.md", "Beta.")?;
    common::create_test_file(temp_dir.path(), "c_ja.md", "already translated")?;
    common::create_test_file(temp_dir.path(), "readme.txt", "ignored")?;
    let provider = MockProvider::working();
    let controller = mock_controller(&provider);

    let summary = controller.run_folder(temp_dir.path().to_path_buf(), false).await?;

    assert_eq!(summary, FolderSummary { translated: 2, skipped: 0, failed: 0 });
    assert_eq!(provider.request_count(), 2);
    assert_eq!(FileManager::read_to_string(temp_dir.path().join("sub/b_ja.md"))?, "[TRANSLATED] Beta.");

    let again = controller.run_folder(temp_dir.path().to_path_buf(), false).await?;
    assert_eq!(again, FolderSummary { translated: 0, skipped: 2, failed: 0 });
    Ok(())
}

/// A folder without Markdown files is an error
#[tokio::test]
async fn test_runFolder_withoutMarkdown_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "readme.txt", "ignored")?;
    let controller = mock_controller(&MockProvider::working());

    assert!(controller.run_folder(temp_dir.path().to_path_buf(), false).await.is_err());
    Ok(())
}

/// Statistics are computed without calling the backend
#[test]
fn test_statistics_forSamplePaper_shouldCountTranslatableParagraphs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "paper.md", SAMPLE_PAPER)?;
    let provider = MockProvider::working();
    let controller = mock_controller(&provider);

    let stats = controller.statistics(&input)?;

    assert_eq!(stats.paragraphs, 6);
    assert_eq!(stats.units, 6);
    assert_eq!(stats.budget, 1433);
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

/// One interrupt lets the unit in flight finish, then stops without output
#[tokio::test]
async fn test_runUntilSignalled_withOneInterrupt_shouldCancelWithoutOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "paper.md", "One.\n\nTwo.\n\nThree.")?;
    let provider = MockProvider::slow(100);
    let controller = mock_controller(&provider);
    let calls = AtomicUsize::new(0);

    let result = controller
        .run_until_signalled(
            controller.run(input, temp_dir.path().to_path_buf(), false),
            || interrupt(calls.fetch_add(1, Ordering::SeqCst), 1),
        )
        .await;

    let error = result.expect_err("interrupted run must fail");
    assert!(format!("{:#}", error).contains("cancelled after 1 of 3"));
    assert!(controller.cancellation().is_cancelled());
    assert_eq!(provider.request_count(), 1);
    assert!(!temp_dir.path().join("paper_ja.md").exists());
    Ok(())
}

/// A second interrupt abandons a long generation call at once
#[tokio::test]
async fn test_runUntilSignalled_withSecondInterrupt_shouldAbortInFlightCall() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "paper.md", "One.\n\nTwo.")?;
    let provider = MockProvider::slow(10_000);
    let controller = mock_controller(&provider);
    let calls = AtomicUsize::new(0);
    let start = Instant::now();

    let result = controller
        .run_until_signalled(
            controller.run(input, temp_dir.path().to_path_buf(), false),
            || interrupt(calls.fetch_add(1, Ordering::SeqCst), 2),
        )
        .await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!temp_dir.path().join("paper_ja.md").exists());
    Ok(())
}

/// Without an interrupt the run completes normally
#[tokio::test]
async fn test_runUntilSignalled_withoutInterrupt_shouldReturnRunResult() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "notes.md", "Hello.")?;
    let controller = mock_controller(&MockProvider::slow(10));
    let calls = AtomicUsize::new(0);

    let outcome = controller
        .run_until_signalled(
            controller.run(input, temp_dir.path().to_path_buf(), false),
            || interrupt(calls.fetch_add(1, Ordering::SeqCst), 0),
        )
        .await?;

    assert_eq!(outcome, FileOutcome::Translated(temp_dir.path().join("notes_ja.md")));
    Ok(())
}
