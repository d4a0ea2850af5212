//! Placement design-rule checking.
//!
//! The engine asks a [`PlacementChecker`] about every cell touched by a
//! proposal; any violation rolls the proposal back. [`EdgeSpacingChecker`]
//! is the default rule deck: segment containment, neighbor padding, and
//! optionally a ban on one-site gaps.

use crate::db::Design;
use crate::ids::CellId;
use crate::placement::Placement;
use crate::segment::{SegmentIndex, SegmentTable};

/// Read-only view of the engine state handed to a checker.
#[derive(Clone, Copy)]
pub struct PlacementView<'a> {
    /// The static design.
    pub design: &'a Design,
    /// Row segments.
    pub segments: &'a SegmentTable,
    /// Segment membership.
    pub index: &'a SegmentIndex,
    /// Current positions.
    pub placement: &'a Placement,
}

/// Decides whether a cell's current position breaks a placement rule.
pub trait PlacementChecker {
    /// Returns `true` if `cell` is illegal where it currently sits.
    fn has_violation(&self, view: &PlacementView<'_>, cell: CellId) -> bool;
}

/// Checks each occupied segment for containment and neighbor spacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeSpacingChecker {
    /// Also reject gaps of exactly one site between neighbors.
    pub disallow_one_site_gaps: bool,
}

impl EdgeSpacingChecker {
    /// Creates a checker.
    pub fn new(disallow_one_site_gaps: bool) -> Self {
        Self {
            disallow_one_site_gaps,
        }
    }

    fn gap_ok(&self, gap: i64, required: i64, site: i64) -> bool {
        gap >= required && !(self.disallow_one_site_gaps && gap == site)
    }
}

impl PlacementChecker for EdgeSpacingChecker {
    fn has_violation(&self, view: &PlacementView<'_>, cell: CellId) -> bool {
        let arch = &view.design.arch;
        let netlist = &view.design.netlist;
        let p = view.placement;
        let me = netlist.cell(cell);

        for &seg_id in view.index.segments_of(cell) {
            let seg = view.segments.get(seg_id);
            if p.left(cell) < seg.xmin || p.right(cell) > seg.xmax {
                return true;
            }
            let site = arch.row(seg.row).site_spacing;
            let list = view.index.cells(seg_id);
            let Some(pos) = list.iter().position(|&c| c == cell) else {
                return true;
            };
            if pos > 0 {
                let left = list[pos - 1];
                let gap = p.left(cell) - p.right(left);
                let required = arch.cell_spacing(Some(netlist.cell(left)), Some(me));
                if !self.gap_ok(gap, required, site) {
                    return true;
                }
            }
            if let Some(&right) = list.get(pos + 1) {
                let gap = p.left(right) - p.right(cell);
                let required = arch.cell_spacing(Some(me), Some(netlist.cell(right)));
                if !self.gap_ok(gap, required, site) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Architecture, Cell, Netlist};
    use crate::ids::SegmentId;
    use crate::segment::build_segments;

    struct Fixture {
        design: Design,
        segments: SegmentTable,
        index: SegmentIndex,
        placement: Placement,
    }

    fn make_fixture(cells: &[(i64, i64, i64, i64)]) -> Fixture {
        let mut nl = Netlist::new();
        for (i, &(left, width, pl, pr)) in cells.iter().enumerate() {
            nl.add_cell(Cell::new(format!("c{i}"), width, 100).at(left, 0).with_padding(pl, pr));
        }
        let design = Design::new(Architecture::uniform(1, 100, 50, 10), nl);
        let segments = build_segments(&design).unwrap();
        let placement = Placement::from_netlist(&design.netlist);
        let mut index = SegmentIndex::new(segments.len(), cells.len());
        for c in design.netlist.cell_ids() {
            index.insert(SegmentId::from_raw(0), c, &placement, 1).unwrap();
        }
        Fixture {
            design,
            segments,
            index,
            placement,
        }
    }

    fn violates(f: &Fixture, checker: EdgeSpacingChecker, cell: u32) -> bool {
        let view = PlacementView {
            design: &f.design,
            segments: &f.segments,
            index: &f.index,
            placement: &f.placement,
        };
        checker.has_violation(&view, CellId::from_raw(cell))
    }

    #[test]
    fn abutting_cells_are_legal() {
        let f = make_fixture(&[(0, 20, 0, 0), (20, 30, 0, 0)]);
        assert!(!violates(&f, EdgeSpacingChecker::default(), 0));
        assert!(!violates(&f, EdgeSpacingChecker::default(), 1));
    }

    #[test]
    fn overlap_is_a_violation() {
        let f = make_fixture(&[(0, 30, 0, 0), (20, 30, 0, 0)]);
        assert!(violates(&f, EdgeSpacingChecker::default(), 0));
    }

    #[test]
    fn padding_is_enforced() {
        let f = make_fixture(&[(0, 20, 0, 10), (30, 20, 10, 0)]);
        assert!(violates(&f, EdgeSpacingChecker::default(), 1));
        let ok = make_fixture(&[(0, 20, 0, 10), (40, 20, 10, 0)]);
        assert!(!violates(&ok, EdgeSpacingChecker::default(), 1));
    }

    #[test]
    fn one_site_gap_rule() {
        let f = make_fixture(&[(0, 20, 0, 0), (30, 20, 0, 0)]);
        assert!(!violates(&f, EdgeSpacingChecker::new(false), 1));
        assert!(violates(&f, EdgeSpacingChecker::new(true), 1));
    }

    #[test]
    fn outside_segment_is_a_violation() {
        let f = make_fixture(&[(490, 20, 0, 0)]);
        assert!(violates(&f, EdgeSpacingChecker::default(), 0));
    }
}
