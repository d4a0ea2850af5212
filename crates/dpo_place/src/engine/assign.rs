//! Initial assignment of cells to segments.

use super::MoveEngine;
use crate::ids::{CellId, RowId, SegmentId};
use dpo_common::{DpoResult, InternalError};
use tracing::{debug, info};

/// Summary of a segment assignment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignReport {
    /// Cells placed into segments.
    pub cells: usize,
    /// Cells whose position changed.
    pub moved: usize,
    /// Total horizontal displacement.
    pub total_dx: i64,
    /// Total vertical displacement.
    pub total_dy: i64,
}

/// Best candidate seen so far, with and without spare capacity.
struct Candidates<T> {
    closest: Option<(i64, T)>,
    closest_fitting: Option<(i64, T)>,
}

impl<T> Default for Candidates<T> {
    fn default() -> Self {
        Self {
            closest: None,
            closest_fitting: None,
        }
    }
}

impl<T: Clone> Candidates<T> {
    fn offer(&mut self, cost: i64, fits: bool, item: T) {
        if fits && self.closest_fitting.as_ref().map_or(true, |(c, _)| cost < *c) {
            self.closest_fitting = Some((cost, item.clone()));
        }
        if self.closest.as_ref().map_or(true, |(c, _)| cost < *c) {
            self.closest = Some((cost, item));
        }
    }

    fn fitting_cost(&self) -> Option<i64> {
        self.closest_fitting.as_ref().map(|(c, _)| *c)
    }

    fn into_best(self) -> Option<T> {
        self.closest_fitting.or(self.closest).map(|(_, t)| t)
    }
}

impl MoveEngine<'_> {
    /// Horizontal clamp of `left` into a `[lo, hi]` interval for a cell of width `w`.
    fn clamp_left(left: i64, w: i64, lo: i64, hi: i64) -> i64 {
        if hi - lo < w {
            lo
        } else {
            left.clamp(lo, hi - w)
        }
    }

    /// Finds the segment nearest to a single-height cell's current position.
    ///
    /// Rows are scanned outward from the closest row. A segment with room
    /// for the cell is preferred; failing that, the nearest segment of the
    /// cell's region is returned.
    pub fn find_closest_segment(&self, cell: CellId) -> Option<SegmentId> {
        let arch = &self.design.arch;
        let me = self.cell(cell);
        let left = self.placement.left(cell);
        let bottom = self.placement.bottom(cell);
        let w = self.placement.width(cell);
        let home = arch.closest_row(bottom)?.index();

        let mut found: Candidates<SegmentId> = Candidates::default();
        for offset in 0..arch.num_rows() {
            let mut rows = Vec::with_capacity(2);
            if let Some(r) = home.checked_sub(offset) {
                rows.push(r);
            }
            if offset > 0 && home + offset < arch.num_rows() {
                rows.push(home + offset);
            }
            if rows.is_empty() {
                break;
            }
            let mut nearest_dy = i64::MAX;
            for r in rows {
                let row = RowId::from_index(r);
                let dy = (arch.row(row).bottom - bottom).abs();
                nearest_dy = nearest_dy.min(dy);
                for &s in self.segments.in_row(row) {
                    let seg = self.segments.get(s);
                    if seg.region != me.region {
                        continue;
                    }
                    let x = Self::clamp_left(left, w, seg.xmin, seg.xmax);
                    let cost = (x - left).abs() + dy;
                    let fits = self.index.utilization(s) + w <= seg.width();
                    found.offer(cost, fits, s);
                }
            }
            if found.fitting_cost().is_some_and(|c| nearest_dy > c) {
                break;
            }
        }
        found.into_best()
    }

    /// Finds a stack of vertically consecutive segments able to hold a
    /// multi-height cell, nearest to its current position.
    ///
    /// Candidate stacks are enumerated by depth-first search from every
    /// rail-compatible base row; each level must overlap the running X
    /// intersection of the levels below. Returns `Ok(None)` for single-height
    /// cells or when no stack exists.
    pub fn find_closest_span(&self, cell: CellId) -> DpoResult<Option<Vec<SegmentId>>> {
        let span = self.span(cell);
        if span <= 1 {
            return Ok(None);
        }
        let arch = &self.design.arch;
        let me = self.cell(cell);
        let left = self.placement.left(cell);
        let bottom = self.placement.bottom(cell);
        let w = self.placement.width(cell);

        let mut found: Candidates<Vec<SegmentId>> = Candidates::default();
        for base in 0..arch.num_rows() {
            if base + span > arch.num_rows() {
                break;
            }
            let base_row = RowId::from_index(base);
            if !arch.power_compatible(me, base_row) {
                continue;
            }
            let dy = (arch.row(base_row).bottom - bottom).abs();

            for &s0 in self.segments.in_row(base_row) {
                let seg0 = self.segments.get(s0);
                if seg0.region != me.region {
                    continue;
                }
                let mut stack: Vec<(Vec<SegmentId>, i64, i64)> = vec![(vec![s0], seg0.xmin, seg0.xmax)];
                while let Some((path, lo, hi)) = stack.pop() {
                    let depth = path.len();
                    if depth > span {
                        return Err(InternalError::new(format!(
                            "segment stack for cell {cell} grew to {depth} levels for a {span}-row cell"
                        )));
                    }
                    if depth == span {
                        let x = Self::clamp_left(left, w, lo, hi);
                        let cost = (x - left).abs() + dy;
                        let fits = hi - lo >= w
                            && path
                                .iter()
                                .all(|&s| self.index.utilization(s) + w <= self.segments.get(s).width());
                        found.offer(cost, fits, path);
                        continue;
                    }
                    let next_row = RowId::from_index(base + depth);
                    for &s in self.segments.in_row(next_row) {
                        let seg = self.segments.get(s);
                        if seg.region != me.region {
                            continue;
                        }
                        let nlo = lo.max(seg.xmin);
                        let nhi = hi.min(seg.xmax);
                        if nhi > nlo {
                            let mut next = path.clone();
                            next.push(s);
                            stack.push((next, nlo, nhi));
                        }
                    }
                }
            }
        }
        Ok(found.into_best())
    }

    /// Snaps every movable cell into its nearest segment and rebuilds the
    /// membership index from scratch.
    ///
    /// Cells keep their current X when it is inside the segment and land on
    /// the row's bottom edge. Overlaps are not resolved here; they surface in
    /// the final violation report. A cell with no reachable segment is an
    /// internal error.
    pub fn assign_cells_to_segments(&mut self) -> DpoResult<AssignReport> {
        self.index.clear();
        let mut report = AssignReport::default();

        let singles = self.single_height.clone();
        for cell in singles {
            let Some(s) = self.find_closest_segment(cell) else {
                return Err(InternalError::new(format!(
                    "cell '{}' cannot be assigned to any segment",
                    self.cell(cell).name
                )));
            };
            let seg = *self.segments.get(s);
            let w = self.placement.width(cell);
            let x = self
                .align_pos(cell, self.placement.left(cell), seg.xmin, seg.xmax, seg.row)
                .unwrap_or(seg.xmin);
            let y = self.design.arch.row(seg.row).bottom;
            self.place_for_assignment(cell, x, y, &mut report);
            self.index.insert(s, cell, &self.placement, 1)?;
            debug!(cell = %cell, segment = %s, width = w, "assigned");
        }

        let multis: Vec<CellId> = self.multi_height_cells().copied().collect();
        for cell in multis {
            let Some(segs) = self.find_closest_span(cell)? else {
                return Err(InternalError::new(format!(
                    "multi-height cell '{}' cannot be assigned to any segment stack",
                    self.cell(cell).name
                )));
            };
            let lo = segs.iter().map(|&s| self.segments.get(s).xmin).max().unwrap_or(0);
            let hi = segs.iter().map(|&s| self.segments.get(s).xmax).min().unwrap_or(0);
            let base = self.segments.get(segs[0]).row;
            let x = self
                .align_pos(cell, self.placement.left(cell), lo, hi, base)
                .unwrap_or(lo);
            let y = self.design.arch.row(base).bottom;
            self.place_for_assignment(cell, x, y, &mut report);
            let span = self.span(cell);
            for &s in &segs {
                self.index.insert(s, cell, &self.placement, span)?;
            }
        }

        self.index.resort_all(&self.placement);
        info!(
            cells = report.cells,
            moved = report.moved,
            dx = report.total_dx,
            dy = report.total_dy,
            "assigned cells to segments"
        );
        Ok(report)
    }

    fn place_for_assignment(&mut self, cell: CellId, x: i64, y: i64, report: &mut AssignReport) {
        let dx = (x - self.placement.left(cell)).abs();
        let dy = (y - self.placement.bottom(cell)).abs();
        report.cells += 1;
        if dx != 0 || dy != 0 {
            report.moved += 1;
        }
        report.total_dx += dx;
        report.total_dy += dy;
        self.placement.set(cell, x, y);
    }

    /// Puts every cell back where it was when the engine was created, then
    /// reassigns segments.
    pub fn restore_original_positions(&mut self) -> DpoResult<AssignReport> {
        if !self.journal.is_empty() {
            return Err(InternalError::new(
                "cannot restore original positions while a proposal is staged",
            ));
        }
        self.placement = self.original.clone();
        self.assign_cells_to_segments()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::MoveEngine;
    use crate::context::LegalizationContext;
    use crate::db::{Architecture, Cell, Design, Netlist};
    use crate::drc::EdgeSpacingChecker;
    use crate::ids::SegmentId;
    use dpo_common::Rect;

    #[test]
    fn off_grid_cells_snap_into_nearest_row() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("a", 20, 100).at(123, 140));
        nl.add_cell(Cell::new("b", 20, 100).at(990, 0));
        let design = Design::new(Architecture::uniform(3, 100, 50, 10), nl);
        let mut engine = MoveEngine::new(&design, Box::new(EdgeSpacingChecker::default())).unwrap();
        let report = engine.assign_cells_to_segments().unwrap();
        assert_eq!(report.cells, 2);
        assert_eq!(report.moved, 2);
        let p = engine.placement();
        assert_eq!((p.left(id(0)), p.bottom(id(0))), (120, 100));
        assert_eq!((p.left(id(1)), p.bottom(id(1))), (480, 0));
        engine.check_consistency().unwrap();
    }

    #[test]
    fn full_segment_is_skipped_for_one_with_room() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("wall", 100, 100).at(0, 0));
        nl.add_cell(Cell::new("late", 20, 100).at(40, 0));
        let design = Design::new(Architecture::uniform(2, 100, 10, 10), nl);
        let engine = make_engine(&design);
        assert_eq!(engine.segment_of(id(1)), Some(SegmentId::from_raw(1)));
        assert_eq!(engine.placement().bottom(id(1)), 100);
    }

    #[test]
    fn region_cells_go_to_region_segments() {
        let mut arch = Architecture::uniform(2, 100, 50, 10);
        let fence = arch.add_region("fence", vec![Rect::new(0, 100, 500, 200)]);
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("r", 20, 100).at(100, 0).in_region(fence));
        let design = Design::new(arch, nl);
        let engine = make_engine(&design);
        assert_eq!(engine.placement().bottom(id(0)), 100);
    }

    #[test]
    fn tall_cell_gets_a_stack() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("tall", 20, 200).at(100, 90));
        let design = Design::new(Architecture::uniform(3, 100, 50, 10), nl);
        let engine = make_engine(&design);
        let segs = engine.index().segments_of(id(0));
        assert_eq!(segs.len(), 2);
        assert_eq!(engine.placement().bottom(id(0)), 100);
    }

    #[test]
    fn restore_returns_to_creation_positions() {
        let design = one_row_design(100, &[(100, 20)]);
        let mut engine = make_engine(&design);
        let ctx = LegalizationContext::new(1, &design.arch);
        let seg = engine.segment_of(id(0)).unwrap();
        assert!(engine.propose_move(&ctx, id(0), 600, 0, seg).unwrap());
        engine.commit();
        engine.restore_original_positions().unwrap();
        assert_eq!(engine.placement().left(id(0)), 100);
        engine.check_consistency().unwrap();
    }
}
