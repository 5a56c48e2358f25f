/*!
 * Integration tests for whole-document translation against mock backends
 */

use std::time::{Duration, Instant};

use llm_translator::errors::{ProviderError, TranslationError};
use llm_translator::providers::mock::{MockProvider, MockReply};
use llm_translator::translation::prompts::target_block;
use llm_translator::translation::{
    context_windows, CancellationFlag, Document, FailurePolicy, OversizedPolicy, TranslatorConfig,
};
use crate::common::{self, SAMPLE_PAPER};

/// Identity translation reproduces the paper byte for byte
#[tokio::test]
async fn test_translate_samplePaper_withIdentityProvider_shouldReproduceInput() {
    let provider = MockProvider::identity();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator.translate(&Document::new(SAMPLE_PAPER)).await.unwrap();

    assert_eq!(translated.text, SAMPLE_PAPER);
    // headings, abstract, list and closing paragraph; code, math and blanks pass through
    assert_eq!(translated.report.units_total, 6);
    assert_eq!(provider.request_count(), 6);
    assert!(translated.report.is_complete());
}

/// Units come back in document order
#[tokio::test]
async fn test_translate_withWorkingProvider_shouldKeepParagraphOrder() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator
        .translate(&Document::new("First.\n\nSecond.\n\nThird."))
        .await
        .unwrap();

    assert_eq!(
        translated.text,
        "[TRANSLATED] First.\n\n[TRANSLATED] Second.\n\n[TRANSLATED] Third."
    );
}

/// Code blocks with inner blank lines stay whole and untranslated
#[tokio::test]
async fn test_translate_withCodeAndMath_shouldPassBlocksThrough() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator.translate(&Document::new(SAMPLE_PAPER)).await.unwrap();

    assert!(translated.text.contains("```python\ndef split(doc):\n\n    return doc.split(\"\\n\\n\")\n```"));
    assert!(translated.text.contains("$$\nL = -\\sum_i \\log p(y_i)\n$$"));
    for request in provider.requests() {
        let target = llm_translator::translation::prompts::target_block(&request.prompt).unwrap();
        assert!(!target.contains("def split"));
    }
}

/// A fence opening right under a text line is still passed through
#[tokio::test]
async fn test_translate_withFenceAfterTextLine_shouldNotSendCodeToModel() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator
        .translate(&Document::new("Run this:\n```python\nx = 1\n\ny = 2\n```\n\nDone."))
        .await
        .unwrap();

    assert_eq!(
        translated.text,
        "[TRANSLATED] Run this:\n```python\nx = 1\n\ny = 2\n```\n\n[TRANSLATED] Done."
    );
    assert_eq!(provider.request_count(), 2);
}

/// Nested list indentation survives when a list is split into several units
#[tokio::test]
async fn test_translate_nestedListOverBudget_shouldKeepIndentation() {
    let source = "- Top item one is here.\n  - Nested item two is here.\n  - Nested item three is here.";
    let provider = MockProvider::identity();
    let config = TranslatorConfig { budget: 8, ..common::fast_config() };
    let translator = common::mock_translator(&provider, config);

    let translated = translator.translate(&Document::new(source)).await.unwrap();

    assert!(provider.request_count() >= 3);
    assert_eq!(translated.text, source);
}

/// Indentation inside a packed unit reaches the model
#[tokio::test]
async fn test_translate_nestedListPackedTogether_shouldSendIndentedLines() {
    let source = "- Top item one is here.\n  - Nested item two is here.\n  - Nested item six is here.";
    let provider = MockProvider::identity();
    let config = TranslatorConfig { budget: 20, ..common::fast_config() };
    let translator = common::mock_translator(&provider, config);

    let translated = translator.translate(&Document::new(source)).await.unwrap();

    assert_eq!(translated.text, source);
    let first = provider.requests()[0].prompt.clone();
    assert_eq!(target_block(&first), Some("- Top item one is here.\n  - Nested item two is here."));
}

/// A blank paragraph keeps its place and is never sent to the model
#[tokio::test]
async fn test_translate_withBlankParagraph_shouldPreserveItInPlace() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator
        .translate(&Document::new("Before.\n\n   \n\nAfter."))
        .await
        .unwrap();

    assert_eq!(translated.text, "[TRANSLATED] Before.\n\n   \n\n[TRANSLATED] After.");
    assert_eq!(provider.request_count(), 2);
}

/// Every unit stays within the budget under the force-split policy
#[test]
fn test_plan_withSmallBudget_shouldKeepEveryUnitWithinBudget() {
    let config = TranslatorConfig { budget: 8, ..common::fast_config() };
    let translator = common::mock_translator(&MockProvider::identity(), config);

    let plan = translator.plan(&Document::new(SAMPLE_PAPER)).unwrap();

    assert!(plan.units.len() > 6);
    for unit in &plan.units {
        assert!(unit.tokens <= 8, "unit {:?} has {} tokens", unit.text, unit.tokens);
        assert!(!unit.oversized);
    }
}

/// Under the emit policy only flagged units may exceed the budget
#[test]
fn test_plan_withEmitPolicy_shouldFlagOversizedUnits() {
    let config = TranslatorConfig {
        budget: 3,
        oversized_policy: OversizedPolicy::Emit,
        ..common::fast_config()
    };
    let translator = common::mock_translator(&MockProvider::identity(), config);

    let plan = translator.plan(&Document::new("Tiny. This sentence is far too long.")).unwrap();

    assert_eq!(plan.units.len(), 2);
    assert!(!plan.units[0].oversized);
    assert!(plan.units[1].oversized);
    assert!(plan.units.iter().all(|u| u.oversized || u.tokens <= 3));
}

/// Context windows only look backwards and hold at most `num_context` units
#[test]
fn test_contextWindows_overSamplePaper_shouldBeCausal() {
    let config = TranslatorConfig { budget: 8, ..common::fast_config() };
    let translator = common::mock_translator(&MockProvider::identity(), config);
    let plan = translator.plan(&Document::new(SAMPLE_PAPER)).unwrap();

    for num_context in 0..4 {
        for (i, window) in context_windows(&plan.units, num_context).enumerate() {
            assert_eq!(window.position, i);
            assert_eq!(window.context.len(), i.min(num_context));
            assert_eq!(window.context, &plan.units[i - window.context.len()..i]);
        }
    }
}

/// Text the model writes after the end sentinel is dropped
#[tokio::test]
async fn test_translate_withTrailingText_shouldCutAtSentinel() {
    let provider = MockProvider::trailing_text();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator.translate(&Document::new("Short para one.")).await.unwrap();

    assert_eq!(translated.text, "[TRANSLATED] Short para one.");
    assert_eq!(translated.report.total_attempts, 1);
}

/// A backend that never closes the sentinel uses up the retry budget
#[tokio::test]
async fn test_translate_withUnterminatedOutput_shouldCallExactlyNumRetryTimes() {
    let provider = MockProvider::unterminated();
    let config = TranslatorConfig { num_retry: 4, ..common::fast_config() };
    let translator = common::mock_translator(&provider, config);

    let result = translator.translate(&Document::new("Never finished.")).await;

    assert!(matches!(result, Err(TranslationError::IncompleteTranslation { attempts: 4 })));
    assert_eq!(provider.request_count(), 4);
}

/// Backend failures consume the same retry budget
#[tokio::test]
async fn test_translate_withFailingBackend_shouldSurfaceGenerationBackend() {
    let provider = MockProvider::failing();
    let translator = common::mock_translator(&provider, common::fast_config());

    let result = translator.translate(&Document::new("Doomed.")).await;

    match result {
        Err(TranslationError::GenerationBackend { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(source, ProviderError::ApiError { status_code: 500, .. }));
        }
        other => panic!("expected GenerationBackend, got {:?}", other),
    }
    assert_eq!(provider.request_count(), 3);
}

/// Authentication failures are not retried
#[tokio::test]
async fn test_translate_withAuthFailure_shouldNotRetry() {
    let provider = MockProvider::scripted([MockReply::Fail(401)]);
    let translator = common::mock_translator(&provider, common::fast_config());

    let result = translator.translate(&Document::new("Locked out.")).await;

    assert!(matches!(result, Err(TranslationError::GenerationBackend { attempts: 1, .. })));
    assert_eq!(provider.request_count(), 1);
}

/// A transient failure is retried and the document completes
#[tokio::test]
async fn test_translate_withIntermittentBackend_shouldRecover() {
    let provider = MockProvider::intermittent(2);
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator.translate(&Document::new("One.\n\nTwo.")).await.unwrap();

    assert_eq!(translated.text, "[TRANSLATED] One.\n\n[TRANSLATED] Two.");
    assert_eq!(translated.report.total_attempts, 3);
    assert!(translated.report.is_complete());
}

/// Keep-original leaves failed units in the source language
#[tokio::test]
async fn test_translate_withKeepOriginal_shouldContinuePastFailedUnit() {
    let provider = MockProvider::scripted([
        MockReply::Text("no sentinel".to_string()),
        MockReply::Text("still none".to_string()),
    ]);
    let config = TranslatorConfig {
        num_retry: 2,
        failure_policy: FailurePolicy::KeepOriginal,
        ..common::fast_config()
    };
    let translator = common::mock_translator(&provider, config);

    let translated = translator.translate(&Document::new("Kept.\n\nTranslated.")).await.unwrap();

    assert_eq!(translated.text, "Kept.\n\n[TRANSLATED] Translated.");
    assert_eq!(translated.report.failed_units, vec![0]);
    assert_eq!(translated.report.units_translated, 1);
}

/// Keep terms found in the target are listed in its prompt
#[tokio::test]
async fn test_translate_withKeepTerms_shouldMentionThemInPrompt() {
    let provider = MockProvider::working();
    let config = TranslatorConfig {
        keep_terms: vec!["LoRA".to_string()],
        ..common::fast_config()
    };
    let translator = common::mock_translator(&provider, config);

    translator.translate(&Document::new("We fine-tune with LoRA.")).await.unwrap();

    let prompt = &provider.requests()[0].prompt;
    assert!(prompt.contains("Keep the following terms exactly as written"));
    assert!(prompt.contains("- LoRA\n"));
    assert!(prompt.contains("Japanese"));
}

/// The worked example from the design notes
#[tokio::test]
async fn test_translate_twoShortParagraphs_shouldSendFirstAsContextOfSecond() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());
    let document = Document::new("Short para one.\n\nShort para two.");

    let plan = translator.plan(&document).unwrap();
    let windows: Vec<_> = context_windows(&plan.units, 2).collect();
    assert_eq!(plan.paragraphs.len(), 2);
    assert!(windows[0].context.is_empty());
    assert_eq!(windows[1].context, &plan.units[..1]);

    translator.translate(&document).await.unwrap();
    let requests = provider.requests();
    let contexts = llm_translator::translation::prompts::templates::context_blocks(&requests[1].prompt);
    assert_eq!(contexts, vec!["Short para one."]);
}

/// An empty document needs no requests
#[tokio::test]
async fn test_translate_emptyDocument_shouldReturnEmptyText() {
    let provider = MockProvider::working();
    let translator = common::mock_translator(&provider, common::fast_config());

    let translated = translator.translate(&Document::new("")).await.unwrap();

    assert_eq!(translated.text, "");
    assert_eq!(provider.request_count(), 0);
}

/// Cancelling while a generation call is in flight stops before the next unit
#[tokio::test]
async fn test_translate_cancelledDuringSlowCall_shouldDiscardPartialResults() {
    let provider = MockProvider::slow(100);
    let cancellation = CancellationFlag::new();
    let translator = common::mock_translator(&provider, common::fast_config())
        .with_cancellation(cancellation.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancellation.cancel();
    });
    let result = translator.translate(&Document::new("One.\n\nTwo.\n\nThree.")).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(TranslationError::Cancelled { completed: 1, total: 3 })));
    assert_eq!(provider.request_count(), 1);
}

/// Dropping the translation future mid-call is safe
#[tokio::test]
async fn test_translate_droppedByTimeout_shouldStopCallingBackend() {
    let provider = MockProvider::slow(5_000);
    let translator = common::mock_translator(&provider, common::fast_config());
    let start = Instant::now();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        translator.translate(&Document::new("One.\n\nTwo.")),
    )
    .await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(5));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(provider.request_count(), 1);
}
