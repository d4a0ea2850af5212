//! Placement objective functions.
//!
//! Half-perimeter wire length (HPWL) is measured on pin positions, where a
//! pin sits at its cell's center plus the pin offset. Displacement is the
//! L1 distance of each movable cell from where the run started.

use crate::db::Netlist;
use crate::ids::{CellId, NetId, PinId};
use crate::journal::Journal;
use crate::placement::Placement;

/// Running bounding box of a net's pins.
#[derive(Debug, Clone, Copy)]
struct NetBox {
    min_x: i64,
    max_x: i64,
    min_y: i64,
    max_y: i64,
    pins: usize,
}

impl NetBox {
    fn empty() -> Self {
        Self {
            min_x: i64::MAX,
            max_x: i64::MIN,
            min_y: i64::MAX,
            max_y: i64::MIN,
            pins: 0,
        }
    }

    fn add(&mut self, x: i64, y: i64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.pins += 1;
    }

    fn hpwl(&self) -> i64 {
        if self.pins < 2 {
            return 0;
        }
        (self.max_x - self.min_x) + (self.max_y - self.min_y)
    }
}

/// HPWL of one net, with each cell's lower-left corner supplied by `corner`.
fn net_hpwl_by<F>(netlist: &Netlist, placement: &Placement, net: NetId, corner: F) -> i64
where
    F: Fn(CellId) -> (i64, i64),
{
    let mut bbox = NetBox::empty();
    for &pin_id in &netlist.net(net).pins {
        let pin = netlist.pin(pin_id);
        let (left, bottom) = corner(pin.cell);
        let x = left + placement.width(pin.cell) / 2 + pin.offset_x;
        let y = bottom + placement.height(pin.cell) / 2 + pin.offset_y;
        bbox.add(x, y);
    }
    bbox.hpwl()
}

/// Returns the absolute position of a pin.
pub fn pin_position(netlist: &Netlist, placement: &Placement, pin: PinId) -> (i64, i64) {
    let pin = netlist.pin(pin);
    (
        placement.center_x(pin.cell) + pin.offset_x,
        placement.center_y(pin.cell) + pin.offset_y,
    )
}

/// Computes the HPWL of a single net. Nets with fewer than two pins contribute zero.
pub fn net_hpwl(netlist: &Netlist, placement: &Placement, net: NetId) -> i64 {
    net_hpwl_by(netlist, placement, net, |c| {
        (placement.left(c), placement.bottom(c))
    })
}

/// Computes the total HPWL across all nets.
pub fn total_hpwl(netlist: &Netlist, placement: &Placement) -> i64 {
    (0..netlist.net_count())
        .map(|n| net_hpwl(netlist, placement, NetId::from_index(n)))
        .sum()
}

/// Sum of the HPWL of every net touching `cell`.
pub fn cell_hpwl(netlist: &Netlist, placement: &Placement, cell: CellId) -> i64 {
    netlist
        .nets_of(cell)
        .into_iter()
        .map(|n| net_hpwl(netlist, placement, n))
        .sum()
}

/// Sum of the HPWL of every net touching `cell`, as if its lower-left
/// corner were at `(x, y)`.
pub fn cell_hpwl_at(netlist: &Netlist, placement: &Placement, cell: CellId, x: i64, y: i64) -> i64 {
    netlist
        .nets_of(cell)
        .into_iter()
        .map(|n| {
            net_hpwl_by(netlist, placement, n, |c| {
                if c == cell {
                    (x, y)
                } else {
                    (placement.left(c), placement.bottom(c))
                }
            })
        })
        .sum()
}

/// Total HPWL of `nets`, with the cells listed in `overrides` moved to the
/// given lower-left corners.
pub fn nets_hpwl_with(
    netlist: &Netlist,
    placement: &Placement,
    nets: &[NetId],
    overrides: &[(CellId, i64, i64)],
) -> i64 {
    nets.iter()
        .map(|&n| {
            net_hpwl_by(netlist, placement, n, |c| {
                overrides
                    .iter()
                    .find(|o| o.0 == c)
                    .map_or((placement.left(c), placement.bottom(c)), |o| (o.1, o.2))
            })
        })
        .sum()
}

/// Distinct nets touching any of `cells`, sorted.
pub fn nets_of_cells(netlist: &Netlist, cells: &[CellId]) -> Vec<NetId> {
    let mut nets: Vec<NetId> = cells.iter().flat_map(|&c| netlist.nets_of(c)).collect();
    nets.sort_unstable();
    nets.dedup();
    nets
}

/// Nets touched by any cell of the journal, deduplicated.
pub fn affected_nets(netlist: &Netlist, journal: &Journal) -> Vec<NetId> {
    nets_of_cells(netlist, &journal.affected_cells())
}

/// HPWL change caused by the staged journal, as `old - new`.
///
/// Positive values mean the staged actions shortened the wires. Only nets
/// touching a journaled cell are evaluated.
pub fn journal_hpwl_delta(netlist: &Netlist, placement: &Placement, journal: &Journal) -> i64 {
    let mut delta = 0;
    for net in affected_nets(netlist, journal) {
        let old = net_hpwl_by(netlist, placement, net, |c| {
            journal
                .position_before(c)
                .unwrap_or((placement.left(c), placement.bottom(c)))
        });
        let new = net_hpwl(netlist, placement, net);
        delta += old - new;
    }
    delta
}

/// Aggregate L1 displacement of movable cells.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplacementStats {
    /// Sum of per-cell displacement.
    pub total: i64,
    /// Largest per-cell displacement.
    pub max: i64,
    /// Mean per-cell displacement over movable cells.
    pub average: f64,
}

/// Measures how far movable cells have moved from `original`.
pub fn displacement(netlist: &Netlist, original: &Placement, current: &Placement) -> DisplacementStats {
    let mut stats = DisplacementStats::default();
    let mut movable = 0usize;
    for cell in netlist.cell_ids() {
        if netlist.cell(cell).fixed {
            continue;
        }
        movable += 1;
        let d = (current.left(cell) - original.left(cell)).abs()
            + (current.bottom(cell) - original.bottom(cell)).abs();
        stats.total += d;
        stats.max = stats.max.max(d);
    }
    if movable > 0 {
        stats.average = stats.total as f64 / movable as f64;
    }
    stats
}
