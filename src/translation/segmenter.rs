/*!
 * Paragraph splitter.
 *
 * Splits a document on blank lines. Runs of blank lines become empty
 * paragraphs in place, so joining the result with the recorded separators
 * gives back the document byte for byte. Fenced code and display math that
 * contain blank lines stay in one paragraph, and a block that starts or ends
 * among text lines becomes a paragraph of its own.
 */

use log::debug;

use crate::translation::document::{Document, Paragraph, ParagraphBreak, LINE_SEPARATOR, PARAGRAPH_SEPARATOR};

/// Block construct left open at the end of a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Backticks,
    Tildes,
    Math,
}

/// Fence state after one line
fn step(open: Option<OpenBlock>, line: &str) -> Option<OpenBlock> {
    let line = line.trim_start();
    match open {
        None if line.starts_with("```") => Some(OpenBlock::Backticks),
        None if line.starts_with("~~~") => Some(OpenBlock::Tildes),
        None if line.matches("$$").count() % 2 == 1 => Some(OpenBlock::Math),
        Some(OpenBlock::Backticks) if line.starts_with("```") => None,
        Some(OpenBlock::Tildes) if line.starts_with("~~~") => None,
        Some(OpenBlock::Math) if line.matches("$$").count() % 2 == 1 => None,
        state => state,
    }
}

/// Track fence state across the lines of one piece.
fn scan_blocks(text: &str, open: Option<OpenBlock>) -> Option<OpenBlock> {
    text.split('\n').fold(open, step)
}

/// Cut code and math blocks out of the text lines around them.
///
/// Whitespace-only lines never form a segment of their own; they stay with
/// the segment before them, or with the block they precede.
fn cut_blocks(piece: &str) -> Vec<String> {
    let mut segments: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut open = None;

    for line in piece.split('\n') {
        let next = step(open, line);
        if open.is_none() && next.is_some() && current.iter().any(|l| !l.trim().is_empty()) {
            segments.push(std::mem::take(&mut current));
        }
        current.push(line);
        if open.is_some() && next.is_none() {
            segments.push(std::mem::take(&mut current));
        }
        open = next;
    }
    if !current.is_empty() {
        segments.push(current);
    }

    let mut merged: Vec<String> = Vec::with_capacity(segments.len());
    for segment in segments {
        let text = segment.join(LINE_SEPARATOR);
        match merged.last_mut() {
            Some(last) if text.trim().is_empty() => {
                last.push_str(LINE_SEPARATOR);
                last.push_str(&text);
            }
            _ => merged.push(text),
        }
    }
    merged
}

/// Split a document into paragraphs.
pub fn split(document: &Document) -> Vec<Paragraph> {
    let text = document.as_str();
    if text.is_empty() {
        return Vec::new();
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut open = None;
    for piece in text.split(PARAGRAPH_SEPARATOR) {
        match pieces.last_mut() {
            Some(current) if open.is_some() => {
                current.push_str(PARAGRAPH_SEPARATOR);
                current.push_str(piece);
            }
            _ => pieces.push(piece.to_string()),
        }
        open = scan_blocks(piece, open);
    }

    if open.is_some() {
        debug!("Document ends inside an unterminated {:?} block", open);
    }

    let mut paragraphs = Vec::with_capacity(pieces.len());
    for piece in pieces {
        for (position, segment) in cut_blocks(&piece).into_iter().enumerate() {
            let separator = if position == 0 { ParagraphBreak::Blank } else { ParagraphBreak::Line };
            paragraphs.push(Paragraph::new(paragraphs.len(), segment).with_separator(separator));
        }
    }
    paragraphs
}

/// Join paragraph texts with their recorded separators
pub fn join_with<'a>(parts: impl IntoIterator<Item = (&'a str, ParagraphBreak)>) -> String {
    let mut joined = String::new();
    for (position, (text, separator)) in parts.into_iter().enumerate() {
        if position > 0 {
            joined.push_str(separator.as_str());
        }
        joined.push_str(text);
    }
    joined
}

/// Inverse of [`split`]
pub fn join(paragraphs: &[Paragraph]) -> String {
    join_with(paragraphs.iter().map(|p| (p.text.as_str(), p.separator)))
}
