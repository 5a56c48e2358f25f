/*!
 * Prompt templates for document translation.
 *
 * A prompt is the sentinel-wrapped context units, then the sentinel-wrapped
 * target unit, then a fixed instruction telling the model to translate only
 * the target block and to answer inside the same sentinels.
 */

use super::sentinels::{wrap, SENTINEL_END, SENTINEL_START};

/// Heading placed above the context blocks
pub const CONTEXT_HEADING: &str = "## Context (preceding text, for reference only)";

/// Heading placed above the target block
pub const TARGET_HEADING: &str = "## Text to translate";

/// Instruction template appended after the target block.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default instruction for paper translation.
    pub const PAPER_TRANSLATOR: &'static str = "You are an AI researcher translating an academic paper written in Markdown \
from {source_language} into {target_language}. Translate only the block under \"Text to translate\" into \
{target_language} while preserving Markdown formatting, math, code, links and citations exactly. \
Keep personal names in their original form. Do not translate the context blocks and do not add explanations.";

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default paper translator template.
    pub fn paper_translator() -> Self {
        Self::new(Self::PAPER_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::paper_translator()
    }
}

/// Builder for constructing translation prompts with context.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder<'a> {
    source_language: String,
    target_language: String,
    template: PromptTemplate,
    context: Vec<&'a str>,
    keep_terms: Vec<&'a str>,
}

impl<'a> TranslationPromptBuilder<'a> {
    /// Create a new prompt builder.
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            template: PromptTemplate::default(),
            context: Vec::new(),
            keep_terms: Vec::new(),
        }
    }

    /// Use a custom instruction template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the preceding units, oldest first.
    pub fn with_context(mut self, context: impl IntoIterator<Item = &'a str>) -> Self {
        self.context = context.into_iter().collect();
        self
    }

    /// Set terms that must stay untranslated.
    pub fn with_keep_terms(mut self, terms: impl IntoIterator<Item = &'a str>) -> Self {
        self.keep_terms = terms.into_iter().collect();
        self
    }

    /// Build the complete prompt for one target unit.
    pub fn build(&self, target: &str) -> String {
        let mut prompt = String::new();

        if !self.context.is_empty() {
            prompt.push_str(CONTEXT_HEADING);
            prompt.push_str("\n\n");
            for unit in &self.context {
                prompt.push_str(&wrap(unit));
                prompt.push_str("\n\n");
            }
        }

        prompt.push_str(TARGET_HEADING);
        prompt.push_str("\n\n");
        prompt.push_str(&wrap(target));
        prompt.push_str("\n\n");

        prompt.push_str(&self.template.render(&self.source_language, &self.target_language));

        let present: Vec<&str> = self.keep_terms.iter()
            .copied()
            .filter(|term| !term.is_empty() && target.contains(term))
            .collect();
        if !present.is_empty() {
            prompt.push_str("\nKeep the following terms exactly as written, untranslated:\n");
            for term in present {
                prompt.push_str("- ");
                prompt.push_str(term);
                prompt.push('\n');
            }
        }

        prompt.push_str(&format!(
            "\nAnswer with the translation only, starting with {} on its own line and ending with {} on its own line.\n",
            SENTINEL_START, SENTINEL_END
        ));
        prompt
    }
}

/// Find the target text in a prompt built by [`TranslationPromptBuilder`]
pub fn target_block(prompt: &str) -> Option<&str> {
    let section = &prompt[prompt.find(TARGET_HEADING)? + TARGET_HEADING.len()..];
    let start = section.find(SENTINEL_START)? + SENTINEL_START.len();
    let end = start + section[start..].find(SENTINEL_END)?;
    Some(section[start..end].trim_matches('\n'))
}

/// Context texts in a prompt built by [`TranslationPromptBuilder`], oldest first
pub fn context_blocks(prompt: &str) -> Vec<&str> {
    let Some(heading) = prompt.find(CONTEXT_HEADING) else {
        return Vec::new();
    };
    let end = prompt.find(TARGET_HEADING).unwrap_or(prompt.len());
    let mut rest = &prompt[heading..end];
    let mut blocks = Vec::new();

    while let Some(start) = rest.find(SENTINEL_START) {
        let body_start = start + SENTINEL_START.len();
        let Some(len) = rest[body_start..].find(SENTINEL_END) else {
            break;
        };
        blocks.push(rest[body_start..body_start + len].trim_matches('\n'));
        rest = &rest[body_start + len + SENTINEL_END.len()..];
    }
    blocks
}
