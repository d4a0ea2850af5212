//! Cell, net, and pin database.
//!
//! Defines the netlist consumed by the placement engine: cells (with their
//! input placement, padding, region, and power rails), nets, and pins
//! (cell connections to nets with offsets from the cell center). Placement
//! blockages are carried alongside the cells.

use crate::db::arch::PowerRail;
use crate::ids::{CellId, NetId, PinId, RegionId};
use dpo_common::Rect;
use serde::{Deserialize, Serialize};

/// A rectangular standard cell or macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The cell's ID; assigned by [`Netlist::add_cell`].
    pub id: CellId,
    /// Instance name.
    pub name: String,
    /// Left edge.
    pub left: i64,
    /// Bottom edge.
    pub bottom: i64,
    /// Width.
    pub width: i64,
    /// Height.
    pub height: i64,
    /// Fixed cells never move and act as blockages.
    pub fixed: bool,
    /// Fence region the cell belongs to.
    pub region: RegionId,
    /// Keep-out added to the left of the cell.
    pub left_padding: i64,
    /// Keep-out added to the right of the cell.
    pub right_padding: i64,
    /// Rail along the bottom edge as drawn.
    pub bottom_power: PowerRail,
    /// Rail along the top edge as drawn.
    pub top_power: PowerRail,
    /// Pins on this cell.
    pub pins: Vec<PinId>,
}

impl Cell {
    /// Creates a movable cell at the origin in the default region.
    pub fn new(name: impl Into<String>, width: i64, height: i64) -> Self {
        Self {
            id: CellId::from_raw(0),
            name: name.into(),
            left: 0,
            bottom: 0,
            width,
            height,
            fixed: false,
            region: RegionId::DEFAULT,
            left_padding: 0,
            right_padding: 0,
            bottom_power: PowerRail::Unknown,
            top_power: PowerRail::Unknown,
            pins: Vec::new(),
        }
    }

    /// Sets the lower-left corner.
    pub fn at(mut self, left: i64, bottom: i64) -> Self {
        self.left = left;
        self.bottom = bottom;
        self
    }

    /// Marks the cell as fixed.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Sets the left and right padding.
    pub fn with_padding(mut self, left: i64, right: i64) -> Self {
        self.left_padding = left;
        self.right_padding = right;
        self
    }

    /// Assigns the cell to a fence region.
    pub fn in_region(mut self, region: RegionId) -> Self {
        self.region = region;
        self
    }

    /// Sets the bottom and top rails.
    pub fn with_power(mut self, bottom: PowerRail, top: PowerRail) -> Self {
        self.bottom_power = bottom;
        self.top_power = top;
        self
    }

    /// Right edge.
    pub fn right(&self) -> i64 {
        self.left + self.width
    }

    /// Top edge.
    pub fn top(&self) -> i64 {
        self.bottom + self.height
    }
}

/// A net connecting two or more pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    /// The net's ID; assigned by [`Netlist::add_net`].
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Pins on this net.
    pub pins: Vec<PinId>,
}

/// A connection point between a cell and a net.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// The pin's ID; assigned by [`Netlist::connect`].
    pub id: PinId,
    /// Owning cell.
    pub cell: CellId,
    /// Connected net.
    pub net: NetId,
    /// Horizontal offset from the cell center.
    pub offset_x: i64,
    /// Vertical offset from the cell center.
    pub offset_y: i64,
}

/// The placement netlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Netlist {
    /// All cells.
    pub cells: Vec<Cell>,
    /// All nets.
    pub nets: Vec<Net>,
    /// All pins.
    pub pins: Vec<Pin>,
    /// Placement blockages: areas where no movable cell may be placed.
    pub blockages: Vec<Rect>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell and returns its ID.
    pub fn add_cell(&mut self, mut cell: Cell) -> CellId {
        let id = CellId::from_index(self.cells.len());
        cell.id = id;
        cell.pins.clear();
        self.cells.push(cell);
        id
    }

    /// Adds an empty net and returns its ID.
    pub fn add_net(&mut self, name: impl Into<String>) -> NetId {
        let id = NetId::from_index(self.nets.len());
        self.nets.push(Net {
            id,
            name: name.into(),
            pins: Vec::new(),
        });
        id
    }

    /// Connects a cell to a net through a new pin at the given offset from
    /// the cell center.
    pub fn connect(&mut self, cell: CellId, net: NetId, offset_x: i64, offset_y: i64) -> PinId {
        let id = PinId::from_index(self.pins.len());
        self.pins.push(Pin {
            id,
            cell,
            net,
            offset_x,
            offset_y,
        });
        self.cells[cell.index()].pins.push(id);
        self.nets[net.index()].pins.push(id);
        id
    }

    /// Adds a placement blockage.
    pub fn add_blockage(&mut self, rect: Rect) {
        self.blockages.push(rect);
    }

    /// Returns the cell with the given ID.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    /// Returns a mutable reference to the cell with the given ID.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.index()]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.index()]
    }

    /// Returns the number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Returns the IDs of all cells.
    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.cells.len()).map(CellId::from_index)
    }

    /// Returns the distinct nets touching a cell, in pin order.
    pub fn nets_of(&self, cell: CellId) -> Vec<NetId> {
        let mut nets: Vec<NetId> = Vec::new();
        for &pin in &self.cell(cell).pins {
            let net = self.pin(pin).net;
            if !nets.contains(&net) {
                nets.push(net);
            }
        }
        nets
    }
}
