//! Change Tracking
//!
//! A [`ChangeTracker`] keeps a two-slot window of value snapshots. Each new
//! snapshot is compared with the previous one by content, so in-place edits
//! of a value are detected even though its identity never changed.
//!
//! Snapshots are taken with `Clone` and compared with `PartialEq`. A type
//! that wants a different notion of "changed" expresses it through its own
//! `PartialEq` impl.

use smallvec::SmallVec;

/// A recorded difference between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<T> {
    pub previous: T,
    pub next: T,
}

/// Snapshot-based equality detector for a single cell.
#[derive(Debug)]
pub struct ChangeTracker<T> {
    window: SmallVec<[T; 2]>,
    changes: Vec<Change<T>>,
}

impl<T: Clone + PartialEq> ChangeTracker<T> {
    pub fn new() -> Self {
        Self {
            window: SmallVec::new(),
            changes: Vec::new(),
        }
    }

    /// Push a snapshot of `value`.
    ///
    /// Once two snapshots are present they are compared, a [`Change`] is
    /// recorded if they differ, and the older one leaves the window.
    pub fn snapshot(&mut self, value: &T) {
        self.window.push(value.clone());
        if self.window.len() == 2 {
            let previous = self.window.remove(0);
            let next = &self.window[0];
            if previous != *next {
                self.changes.push(Change {
                    previous,
                    next: next.clone(),
                });
            }
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change<T>] {
        &self.changes
    }

    /// The earliest recorded change, if any.
    pub fn first_change(&self) -> Option<&Change<T>> {
        self.changes.first()
    }

    /// Forget all snapshots and recorded changes.
    pub fn clear(&mut self) {
        self.window.clear();
        self.changes.clear();
    }
}

impl<T: Clone + PartialEq> Default for ChangeTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
