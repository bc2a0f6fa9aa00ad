//! Linear undo/redo over stamp collection snapshots
//!
//! Every structural change records a full snapshot. Recording after an undo
//! discards the redo-able future. A drag records one entry per position
//! update rather than one per gesture, so long drags produce long logs.

use crate::stamp::StampCollection;

#[derive(Debug, Clone, PartialEq)]
pub struct EditHistory {
    entries: Vec<StampCollection>,
    index: usize,
}

impl EditHistory {
    /// A history holding a single empty snapshot
    pub fn new() -> Self {
        Self {
            entries: vec![StampCollection::new()],
            index: 0,
        }
    }

    /// Truncate everything after the current entry, append `collection`
    /// and make it current.
    pub fn record(&mut self, collection: StampCollection) {
        self.entries.truncate(self.index + 1);
        self.entries.push(collection);
        self.index = self.entries.len() - 1;
    }

    /// Step back one entry. Returns false at the first entry.
    pub fn undo(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Step forward one entry. Returns false at the last entry.
    pub fn redo(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// The active collection
    pub fn current(&self) -> &StampCollection {
        &self.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        // Always holds at least the initial snapshot
        false
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}
