/*!
 * Context management for document translation.
 *
 * Units are translated one at a time with a bounded window of the units
 * that precede them as reference.
 */

pub mod window;

// Re-export main types
pub use window::{build_context, context_windows, ContextWindow, ContextWindowIterator};
