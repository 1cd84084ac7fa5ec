// Local undo/redo history as full-grid snapshots.
//
// `record()` pushes a deep copy of the grid and clears the redo stack; it is
// called right before every local mutation that changes the grid. `undo()`
// and `redo()` swap the live grid with the top of the opposite stack, so the
// pair obeys the inverse law: n undos after n recorded mutations restore the
// pre-mutation grid exactly, and n redos after that restore the post-mutation
// grid exactly.
//
// Snapshots are whole grids. The default canvas is 50x50, so a snapshot is
// 10 KB; the undo depth is capped by `limit`, dropping the oldest snapshot
// first. The redo stack never exceeds the undo depth it was built from.
//
// History is per client and never sent anywhere. Remote edits do not record
// snapshots, so an undo also rolls back remote edits that landed after the
// checkpoint; see `model.rs` for how restores are re-broadcast.

use std::collections::VecDeque;

use crate::grid::Grid;

/// Default maximum number of undo snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Clone, Debug)]
pub struct History {
    undo: VecDeque<Grid>,
    redo: Vec<Grid>,
    limit: usize,
}

impl History {
    /// Create an empty history keeping at most `limit` undo snapshots.
    /// A limit of 0 disables history entirely.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Snapshot `current` onto the undo stack and clear the redo stack.
    pub fn record(&mut self, current: &Grid) {
        self.redo.clear();
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(current.clone());
    }

    /// Restore the most recent snapshot into `current`, moving the replaced
    /// grid onto the redo stack. Returns false (and does nothing) if there is
    /// nothing to undo.
    pub fn undo(&mut self, current: &mut Grid) -> bool {
        let Some(snapshot) = self.undo.pop_back() else {
            return false;
        };
        self.redo.push(std::mem::replace(current, snapshot));
        true
    }

    /// Inverse of `undo`.
    pub fn redo(&mut self, current: &mut Grid) -> bool {
        let Some(snapshot) = self.redo.pop() else {
            return false;
        };
        self.undo.push_back(std::mem::replace(current, snapshot));
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
