use std::ops::Range;

use super::transform::TextSelection;

/// Result of dispatching a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Ranges of the new document touched by the transaction
    pub changed: Vec<Range<usize>>,
    pub new_selection: TextSelection,
    pub version: u64,
    /// IDs the command reported as inserted or changed
    pub blocks: Vec<String>,
}

impl Patch {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}
