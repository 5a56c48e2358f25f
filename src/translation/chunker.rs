/*!
 * Unit chunker.
 *
 * A paragraph that fits the token budget becomes one unit. A longer paragraph
 * is split into sentences, and the sentences are packed greedily into units
 * that each stay within the budget.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::ChunkError;
use crate::translation::document::{Paragraph, Unit, UnitSeparator};
use crate::translation::tokenizer::LengthOracle;

/// Abbreviations whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "al.", "fig.", "figs.", "eq.", "eqs.", "etc.", "vs.", "cf.", "dr.", "mr.", "ms.",
    "mrs.", "no.", "sec.", "ref.", "approx.", "resp.",
];

/// What to do with a single sentence that exceeds the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizedPolicy {
    /// Emit it as its own unit, flagged `oversized`
    Emit,
    /// Fail the whole chunk operation
    Fail,
    /// Cut it at word boundaries, or characters for a single long word
    #[default]
    ForceSplit,
}

impl std::str::FromStr for OversizedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "emit" => Ok(Self::Emit),
            "fail" => Ok(Self::Fail),
            "force_split" | "split" => Ok(Self::ForceSplit),
            _ => Err(anyhow::anyhow!("Invalid oversized policy: {}", s)),
        }
    }
}

/// One sentence and the whitespace class that preceded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    /// Trimmed sentence text
    pub text: &'a str,
    /// Separator to restore in front of it
    pub separator: UnitSeparator,
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』' | '）')
}

/// Whether the period at the end of `text` belongs to an abbreviation or initial
fn ends_with_abbreviation(text: &str) -> bool {
    let Some(word) = text.split_whitespace().last() else {
        return false;
    };
    let word = word.trim_start_matches(['(', '[', '"', '\'']).to_lowercase();

    if ABBREVIATIONS.contains(&word.as_str()) {
        return true;
    }
    // @initials: "A." in "A. Vaswani"
    let mut chars = word.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_alphabetic())
}

/// Whether `text[start..pos]` is the number of an ordered list item, as in `1. First`
fn is_enumerator(text: &str, start: usize, pos: usize) -> bool {
    let number = &text[start..pos];
    let before = text[..start].trim_end_matches([' ', '\t']);
    !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
        && (before.is_empty() || before.ends_with('\n'))
}

/// Split text into sentences.
///
/// Sentences end at terminal punctuation (plus closing quotes or brackets)
/// followed by whitespace, and at line breaks. Ideographic terminal marks end
/// a sentence even without following whitespace.
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut separator = UnitSeparator::Space;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        let boundary = if c == '\n' {
            Some((pos, i))
        } else if is_terminal(c) {
            let mut j = i + 1;
            while j < chars.len() && is_closing(chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map_or(text.len(), |&(p, _)| p);
            let spaced = chars.get(j).is_none_or(|&(_, next)| next.is_whitespace());
            let ideographic = !c.is_ascii();

            let continues = c == '.'
                && (ends_with_abbreviation(&text[start..pos + 1]) || is_enumerator(text, start, pos));
            if (spaced || ideographic) && !continues {
                Some((end, j))
            } else {
                None
            }
        } else {
            None
        };

        let Some((end, next)) = boundary else {
            i += 1;
            continue;
        };

        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(Sentence { text: sentence, separator: std::mem::take(&mut separator) });
        }

        let gap_start = chars.get(next).map_or(text.len(), |&(p, _)| p);
        let mut k = next;
        let mut line_break = false;
        while k < chars.len() && chars[k].1.is_whitespace() {
            line_break |= chars[k].1 == '\n';
            k += 1;
        }
        start = chars.get(k).map_or(text.len(), |&(p, _)| p);
        if !sentence.is_empty() || line_break {
            separator = if line_break {
                // @indent: whitespace after the last line break of the gap
                let gap = &text[gap_start..start];
                UnitSeparator::newline(gap.rsplit('\n').next().unwrap_or_default())
            } else {
                UnitSeparator::Space
            };
        }
        i = k.max(i + 1);
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(Sentence { text: rest, separator });
    }

    sentences
}

/// Splits paragraphs into budget-respecting units
#[derive(Debug, Clone)]
pub struct Chunker {
    oracle: LengthOracle,
    policy: OversizedPolicy,
}

/// Greedy accumulation buffer
struct Pending {
    text: String,
    separator: UnitSeparator,
}

impl Chunker {
    /// Create a chunker measuring with `oracle`
    pub fn new(oracle: LengthOracle, policy: OversizedPolicy) -> Self {
        Self { oracle, policy }
    }

    /// Split one paragraph into units of at most `budget` tokens.
    pub fn chunk(&self, paragraph: &Paragraph, budget: usize) -> Result<Vec<Unit>, ChunkError> {
        let body = paragraph.body();
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.oracle.length(body)?;
        if tokens < budget {
            return Ok(vec![Unit {
                text: body.to_string(),
                paragraph: paragraph.index,
                ordinal: 0,
                tokens,
                oversized: false,
                separator: UnitSeparator::Space,
            }]);
        }

        debug!("Paragraph {} has {} tokens, splitting into sentences (budget {})",
               paragraph.index, tokens, budget);

        let mut units = Vec::new();
        let mut pending: Option<Pending> = None;

        for sentence in split_sentences(body) {
            let sentence_tokens = self.oracle.length(sentence.text)?;

            if sentence_tokens > budget {
                self.flush(&mut pending, paragraph, &mut units)?;
                self.place_oversized(sentence, sentence_tokens, paragraph, budget, &mut units)?;
                continue;
            }

            pending = match pending.take() {
                None => Some(Pending { text: sentence.text.to_string(), separator: sentence.separator }),
                Some(mut buffer) => {
                    let candidate = format!("{}{}{}", buffer.text, sentence.separator.as_str(), sentence.text);
                    if self.oracle.length(&candidate)? <= budget {
                        buffer.text = candidate;
                        Some(buffer)
                    } else {
                        let mut flushed = Some(buffer);
                        self.flush(&mut flushed, paragraph, &mut units)?;
                        Some(Pending { text: sentence.text.to_string(), separator: sentence.separator })
                    }
                }
            };
        }
        self.flush(&mut pending, paragraph, &mut units)?;

        Ok(units)
    }

    fn push_unit(
        &self,
        text: String,
        separator: UnitSeparator,
        oversized: bool,
        paragraph: &Paragraph,
        units: &mut Vec<Unit>,
    ) -> Result<(), ChunkError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Ok(());
        }
        let tokens = self.oracle.length(&text)?;
        units.push(Unit {
            text,
            paragraph: paragraph.index,
            ordinal: units.len(),
            tokens,
            oversized,
            separator,
        });
        Ok(())
    }

    fn flush(&self, pending: &mut Option<Pending>, paragraph: &Paragraph, units: &mut Vec<Unit>) -> Result<(), ChunkError> {
        match pending.take() {
            Some(buffer) => self.push_unit(buffer.text, buffer.separator, false, paragraph, units),
            None => Ok(()),
        }
    }

    fn place_oversized(
        &self,
        sentence: Sentence<'_>,
        tokens: usize,
        paragraph: &Paragraph,
        budget: usize,
        units: &mut Vec<Unit>,
    ) -> Result<(), ChunkError> {
        match self.policy {
            OversizedPolicy::Emit => {
                warn!("Sentence in paragraph {} has {} tokens (budget {}), emitting as is",
                      paragraph.index, tokens, budget);
                self.push_unit(sentence.text.to_string(), sentence.separator, true, paragraph, units)
            }
            OversizedPolicy::Fail => Err(ChunkError::OversizedSentence {
                paragraph: paragraph.index,
                tokens,
                budget,
            }),
            OversizedPolicy::ForceSplit => {
                debug!("Force-splitting a {}-token sentence in paragraph {}", tokens, paragraph.index);
                for (index, piece) in self.force_split(sentence.text, budget)?.into_iter().enumerate() {
                    let separator = if index == 0 { sentence.separator.clone() } else { piece.separator };
                    self.push_unit(piece.text, separator, piece.oversized, paragraph, units)?;
                }
                Ok(())
            }
        }
    }

    /// Cut a sentence at word boundaries into pieces that fit the budget.
    ///
    /// A single word longer than the budget is cut at character boundaries.
    /// A character that alone exceeds the budget is returned flagged.
    fn force_split(&self, sentence: &str, budget: usize) -> Result<Vec<Piece>, ChunkError> {
        let mut pieces = Vec::new();
        let mut current = Piece::default();

        for word in sentence.split_whitespace() {
            let candidate = if current.text.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current.text, word)
            };
            if self.oracle.length(&candidate)? <= budget {
                current.text = candidate;
                continue;
            }

            if !current.text.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            if self.oracle.length(word)? <= budget {
                current.text = word.to_string();
            } else {
                let mut fragments = self.split_characters(word, budget)?;
                if fragments.last().is_some_and(|last| !last.oversized) {
                    current = fragments.pop().unwrap_or_default();
                }
                pieces.extend(fragments);
            }
        }
        if !current.text.is_empty() {
            pieces.push(current);
        }

        Ok(pieces)
    }

    /// Cut one word into character runs; runs after the first attach without a space.
    fn split_characters(&self, word: &str, budget: usize) -> Result<Vec<Piece>, ChunkError> {
        let mut pieces = Vec::new();
        let mut current = Piece::default();

        for c in word.chars() {
            let mut candidate = current.text.clone();
            candidate.push(c);
            if self.oracle.length(&candidate)? <= budget {
                current.text = candidate;
                continue;
            }

            let separator = if pieces.is_empty() && current.text.is_empty() {
                UnitSeparator::Space
            } else {
                UnitSeparator::Attached
            };
            if !current.text.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let single = c.to_string();
            if self.oracle.length(&single)? <= budget {
                current = Piece { text: single, separator, oversized: false };
            } else {
                pieces.push(Piece { text: single, separator, oversized: true });
                current.separator = UnitSeparator::Attached;
            }
        }
        if !current.text.is_empty() {
            pieces.push(current);
        }

        Ok(pieces)
    }
}

/// A fragment produced by force splitting
#[derive(Debug, Default)]
struct Piece {
    text: String,
    separator: UnitSeparator,
    oversized: bool,
}
