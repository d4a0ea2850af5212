//! Mutable cell positions owned by the move engine.

use crate::db::Netlist;
use crate::ids::CellId;
use serde::{Deserialize, Serialize};

/// Lower-left corners of every cell, indexed by [`CellId`].
///
/// Cell dimensions are copied from the netlist at construction so that the
/// segment index and objective code can read geometry without a netlist
/// borrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    left: Vec<i64>,
    bottom: Vec<i64>,
    width: Vec<i64>,
    height: Vec<i64>,
}

impl Placement {
    /// Captures the current netlist positions.
    pub fn from_netlist(netlist: &Netlist) -> Self {
        Self {
            left: netlist.cells.iter().map(|c| c.left).collect(),
            bottom: netlist.cells.iter().map(|c| c.bottom).collect(),
            width: netlist.cells.iter().map(|c| c.width).collect(),
            height: netlist.cells.iter().map(|c| c.height).collect(),
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns `true` if there are no cells.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Left edge.
    pub fn left(&self, cell: CellId) -> i64 {
        self.left[cell.index()]
    }

    /// Bottom edge.
    pub fn bottom(&self, cell: CellId) -> i64 {
        self.bottom[cell.index()]
    }

    /// Width.
    pub fn width(&self, cell: CellId) -> i64 {
        self.width[cell.index()]
    }

    /// Height.
    pub fn height(&self, cell: CellId) -> i64 {
        self.height[cell.index()]
    }

    /// Right edge.
    pub fn right(&self, cell: CellId) -> i64 {
        self.left(cell) + self.width(cell)
    }

    /// Top edge.
    pub fn top(&self, cell: CellId) -> i64 {
        self.bottom(cell) + self.height(cell)
    }

    /// Horizontal center, rounded down.
    pub fn center_x(&self, cell: CellId) -> i64 {
        self.left(cell) + self.width(cell) / 2
    }

    /// Vertical center, rounded down.
    pub fn center_y(&self, cell: CellId) -> i64 {
        self.bottom(cell) + self.height(cell) / 2
    }

    /// Moves a cell's lower-left corner.
    pub fn set(&mut self, cell: CellId, left: i64, bottom: i64) {
        self.left[cell.index()] = left;
        self.bottom[cell.index()] = bottom;
    }
}
