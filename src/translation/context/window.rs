/*!
 * Lookback context for translation.
 *
 * Each unit is translated together with up to `num_context` units that
 * precede it in the document, across paragraph boundaries. The window never
 * contains the unit being translated or anything after it.
 */

use crate::translation::document::Unit;

/// The preceding units for the unit at `index`.
///
/// Returns `units[max(0, index - num_context)..index]`. An index past the end
/// is clamped to the list length.
pub fn build_context<T>(units: &[T], index: usize, num_context: usize) -> &[T] {
    let index = index.min(units.len());
    &units[index.saturating_sub(num_context)..index]
}

/// A target unit together with its lookback window.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow<'a> {
    /// Index of the target in the unit list
    pub position: usize,

    /// Unit to translate
    pub target: &'a Unit,

    /// Preceding units, oldest first
    pub context: &'a [Unit],
}

impl<'a> ContextWindow<'a> {
    /// Create the window for the unit at `position`.
    ///
    /// Returns `None` when `position` is out of range.
    pub fn new(units: &'a [Unit], position: usize, num_context: usize) -> Option<Self> {
        let target = units.get(position)?;
        Some(Self {
            position,
            target,
            context: build_context(units, position, num_context),
        })
    }

    /// Source texts of the context units, oldest first
    pub fn context_texts(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.context.iter().map(|unit| unit.text.as_str())
    }

    /// Token length of the whole request body: context plus target
    pub fn request_tokens(&self) -> usize {
        self.context.iter().map(|unit| unit.tokens).sum::<usize>() + self.target.tokens
    }
}

/// Iterator that yields a context window for every unit in order.
pub struct ContextWindowIterator<'a> {
    units: &'a [Unit],
    num_context: usize,
    current_position: usize,
}

impl<'a> Iterator for ContextWindowIterator<'a> {
    type Item = ContextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = ContextWindow::new(self.units, self.current_position, self.num_context)?;
        self.current_position += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.units.len().saturating_sub(self.current_position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ContextWindowIterator<'_> {}

/// Windows for every unit, in document order
pub fn context_windows(units: &[Unit], num_context: usize) -> ContextWindowIterator<'_> {
    ContextWindowIterator {
        units,
        num_context,
        current_position: 0,
    }
}
