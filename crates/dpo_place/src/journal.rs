//! Transaction log of staged cell relocations.
//!
//! Each [`MoveAction`] is applied to the placement and segment index as soon
//! as it is recorded. Rolling back replays the inverse of every action in
//! reverse order; committing simply forgets them.

use crate::ids::{CellId, SegmentId};

/// One applied relocation of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAction {
    /// The relocated cell.
    pub cell: CellId,
    /// Left edge before the move.
    pub orig_left: i64,
    /// Bottom edge before the move.
    pub orig_bottom: i64,
    /// Segments occupied before the move.
    pub orig_segs: Vec<SegmentId>,
    /// Left edge after the move.
    pub new_left: i64,
    /// Bottom edge after the move.
    pub new_bottom: i64,
    /// Segments occupied after the move.
    pub new_segs: Vec<SegmentId>,
}

/// An ordered list of applied relocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    actions: Vec<MoveAction>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Records an already-applied action.
    pub fn push(&mut self, action: MoveAction) {
        self.actions.push(action);
    }

    /// Appends all actions of another journal.
    pub fn extend(&mut self, other: &Journal) {
        self.actions.extend(other.actions.iter().cloned());
    }

    /// Recorded actions in application order.
    pub fn actions(&self) -> &[MoveAction] {
        &self.actions
    }

    /// Forgets every action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Removes and returns every action, leaving the journal empty.
    pub fn take(&mut self) -> Vec<MoveAction> {
        std::mem::take(&mut self.actions)
    }

    /// Distinct cells touched by the journal, in first-touch order.
    pub fn affected_cells(&self) -> Vec<CellId> {
        let mut cells: Vec<CellId> = Vec::with_capacity(self.actions.len());
        for a in &self.actions {
            if !cells.contains(&a.cell) {
                cells.push(a.cell);
            }
        }
        cells
    }

    /// Position of a cell before the first action that moved it.
    pub fn position_before(&self, cell: CellId) -> Option<(i64, i64)> {
        self.actions
            .iter()
            .find(|a| a.cell == cell)
            .map(|a| (a.orig_left, a.orig_bottom))
    }
}
