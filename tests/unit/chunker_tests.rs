/*!
 * Tests for sentence splitting and unit packing
 */

use llm_translator::errors::ChunkError;
use llm_translator::translation::chunker::split_sentences;
use llm_translator::translation::{Chunker, LengthOracle, OversizedPolicy, Paragraph, UnitSeparator};

fn chunker(policy: OversizedPolicy) -> Chunker {
    Chunker::new(LengthOracle::heuristic(), policy)
}

/// Abbreviations and initials do not end sentences
#[test]
fn test_splitSentences_withAbbreviations_shouldNotBreakEarly() {
    let sentences = split_sentences("See Fig. 2 by A. Vaswani et al. for details. Then stop.");
    let texts: Vec<&str> = sentences.iter().map(|s| s.text).collect();

    assert_eq!(texts, vec!["See Fig. 2 by A. Vaswani et al. for details.", "Then stop."]);
}

/// Japanese full stops end sentences without spaces
#[test]
fn test_splitSentences_withIdeographicStops_shouldSplit() {
    let sentences = split_sentences("最初の文。次の文。");
    let texts: Vec<&str> = sentences.iter().map(|s| s.text).collect();

    assert_eq!(texts, vec!["最初の文。", "次の文。"]);
}

/// Line breaks are remembered as unit separators
#[test]
fn test_splitSentences_withLineBreaks_shouldUseNewlineSeparator() {
    let sentences = split_sentences("- first item\n- second item");

    assert_eq!(sentences.len(), 2);
    assert_eq!(sentences[1].separator, UnitSeparator::newline(""));
}

/// Sentences are packed greedily in order
#[test]
fn test_chunk_withFiveSentences_shouldPackFirstThreeTogether() {
    // each sentence is 4 tokens
    let paragraph = Paragraph::new(0, "This is one. This is two. This is ten. This is six. This is odd.");

    let units = chunker(OversizedPolicy::ForceSplit).chunk(&paragraph, 12).unwrap();

    let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
    assert_eq!(texts, vec!["This is one. This is two. This is ten.", "This is six. This is odd."]);
    assert_eq!(units[1].ordinal, 1);
}

/// The fail policy rejects a sentence over the budget
#[test]
fn test_chunk_withFailPolicy_shouldRejectOversizedSentence() {
    let paragraph = Paragraph::new(7, "Short. This sentence has far too many tokens for the budget.");

    let result = chunker(OversizedPolicy::Fail).chunk(&paragraph, 5);

    assert!(matches!(result, Err(ChunkError::OversizedSentence { paragraph: 7, budget: 5, .. })));
}

/// Force split cuts long sentences at word boundaries
#[test]
fn test_chunk_withForceSplit_shouldRespectBudget() {
    let paragraph = Paragraph::new(0, "This sentence has far too many tokens for the budget.");

    let units = chunker(OversizedPolicy::ForceSplit).chunk(&paragraph, 5).unwrap();

    assert!(units.len() > 1);
    assert!(units.iter().all(|u| u.tokens <= 5 && !u.oversized));
    let rejoined: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
    assert_eq!(rejoined.join(" "), paragraph.text);
}

/// Ordered list numbers stay with their item when a list is split
#[test]
fn test_chunk_withOrderedList_shouldKeepNumbersWithItems() {
    // 8 tokens per line
    let paragraph = Paragraph::new(0, "1. First item is here.\n2. Second item is here.");

    let units = chunker(OversizedPolicy::default()).chunk(&paragraph, 8).unwrap();

    let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
    assert_eq!(texts, vec!["1. First item is here.", "2. Second item is here."]);
    assert_eq!(units[1].separator, UnitSeparator::newline(""));
}
