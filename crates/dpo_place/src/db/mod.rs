//! Static design database consumed by the placement engine.
//!
//! The [`Architecture`] describes rows, sites, and fence regions; the
//! [`Netlist`] describes cells and their connectivity. Both are read-only
//! while an engine is running. Final positions are written back with
//! [`Design::apply_placement`].

pub mod arch;
pub mod netlist;

pub use arch::{Architecture, PowerRail, Region, Row};
pub use netlist::{Cell, Net, Netlist, Pin};

use crate::placement::Placement;
use dpo_common::{DpoResult, InternalError};
use serde::{Deserialize, Serialize};

/// An architecture paired with the netlist placed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// Rows, sites, and regions.
    pub arch: Architecture,
    /// Cells, nets, and pins.
    pub netlist: Netlist,
}

impl Design {
    /// Pairs an architecture with a netlist.
    pub fn new(arch: Architecture, netlist: Netlist) -> Self {
        Self { arch, netlist }
    }

    /// Checks cross-references between the netlist and the architecture.
    ///
    /// A cell referring to a region that does not exist is an internal error.
    pub fn validate(&self) -> DpoResult<()> {
        for cell in &self.netlist.cells {
            if cell.region.index() >= self.arch.regions.len() {
                return Err(InternalError::new(format!(
                    "cell '{}' refers to region {} but only {} regions exist",
                    cell.name,
                    cell.region,
                    self.arch.regions.len()
                )));
            }
            if cell.width <= 0 || cell.height <= 0 {
                return Err(InternalError::new(format!(
                    "cell '{}' has degenerate size {}x{}",
                    cell.name, cell.width, cell.height
                )));
            }
        }
        for pin in &self.netlist.pins {
            if pin.cell.index() >= self.netlist.cells.len()
                || pin.net.index() >= self.netlist.nets.len()
            {
                return Err(InternalError::new(format!(
                    "pin {} refers to a missing cell or net",
                    pin.id
                )));
            }
        }
        Ok(())
    }

    /// Copies the positions held by a placement back into the netlist.
    pub fn apply_placement(&mut self, placement: &Placement) {
        for cell in &mut self.netlist.cells {
            cell.left = placement.left(cell.id);
            cell.bottom = placement.bottom(cell.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CellId, RegionId};

    #[test]
    fn validate_accepts_default_region() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("a", 10, 100));
        let design = Design::new(Architecture::uniform(1, 100, 10, 10), nl);
        assert!(design.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_region() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("a", 10, 100).in_region(RegionId::from_raw(3)));
        let design = Design::new(Architecture::uniform(1, 100, 10, 10), nl);
        let err = design.validate().unwrap_err();
        assert!(err.message.contains("region 3"));
    }

    #[test]
    fn apply_placement_writes_back() {
        let mut nl = Netlist::new();
        let a = nl.add_cell(Cell::new("a", 10, 100).at(0, 0));
        let mut design = Design::new(Architecture::uniform(1, 100, 10, 10), nl);
        let mut placement = Placement::from_netlist(&design.netlist);
        placement.set(a, 40, 0);
        design.apply_placement(&placement);
        assert_eq!(design.netlist.cell(CellId::from_raw(0)).left, 40);
    }
}
