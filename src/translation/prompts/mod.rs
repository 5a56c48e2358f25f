/*!
 * Prompt construction for document translation.
 *
 * This module provides:
 * - The sentinel markers that delimit context and target text
 * - Instruction templates and the prompt builder
 */

pub mod sentinels;
pub mod templates;

// Re-export main types
pub use sentinels::{extract_translation, SentinelCheck, SENTINEL_END, SENTINEL_START};
pub use templates::{target_block, PromptTemplate, TranslationPromptBuilder};
