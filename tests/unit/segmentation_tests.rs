/*!
 * Tests for paragraph splitting and context windows
 */

use llm_translator::translation::segmenter::{join, split};
use llm_translator::translation::{build_context, Document, ParagraphKind};
use crate::common::SAMPLE_PAPER;

/// Joining the split paragraphs gives back the document
#[test]
fn test_split_thenJoin_shouldReproduceDocument() {
    for text in [SAMPLE_PAPER, "", "one", "\n\n", "a\n\n\n\nb\n", "```\nopen fence\n\nnever closed"] {
        let document = Document::new(text);
        assert_eq!(join(&split(&document)), text);
    }
}

/// Paragraph kinds of the sample paper
#[test]
fn test_split_samplePaper_shouldClassifyParagraphs() {
    let kinds: Vec<ParagraphKind> = split(&Document::new(SAMPLE_PAPER)).iter().map(|p| p.kind).collect();

    assert_eq!(kinds, vec![
        ParagraphKind::Text,
        ParagraphKind::Text,
        ParagraphKind::Text,
        ParagraphKind::Blank,
        ParagraphKind::Text,
        ParagraphKind::Text,
        ParagraphKind::Code,
        ParagraphKind::Math,
        ParagraphKind::Text,
    ]);
}

/// Windows near the start are shorter than `num_context`
#[test]
fn test_buildContext_shouldClampAtDocumentStart() {
    let units = ["u0", "u1", "u2", "u3"];

    assert!(build_context(&units, 0, 2).is_empty());
    assert_eq!(build_context(&units, 1, 2), &["u0"]);
    assert_eq!(build_context(&units, 3, 2), &["u1", "u2"]);
    assert!(build_context(&units, 3, 0).is_empty());
}
