//! Pairwise swaps of single-height cells.

use super::MoveEngine;
use crate::context::LegalizationContext;
use crate::ids::{CellId, SegmentId};
use dpo_common::DpoResult;

impl MoveEngine<'_> {
    /// Swaps `cell` with the cell of `sj` nearest to `xj`.
    ///
    /// Adjacent cells of one segment are repacked inside their combined
    /// window by [`shift`](Self::shift). Otherwise each cell must fit in the
    /// gap the other leaves behind.
    pub(super) fn try_swap(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        xj: i64,
        _yj: i64,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        if self.span(cell) != 1 {
            return Ok(false);
        }
        let Some(si) = self.segment_of(cell) else {
            return Ok(false);
        };
        let list_j = self.index.cells(sj);
        if list_j.is_empty() {
            return Ok(false);
        }
        let pos = list_j.partition_point(|&c| self.placement.center_x(c) < xj);
        let other = list_j[pos.min(list_j.len() - 1)];
        if other == cell || self.span(other) != 1 {
            return Ok(false);
        }

        let seg_i = *self.segments.get(si);
        let seg_j = *self.segments.get(sj);
        if self.cell(cell).region != seg_j.region || self.cell(other).region != seg_i.region {
            return Ok(false);
        }

        let (Some(ix_i), Some(ix_j)) = (self.index.position(si, cell), self.index.position(sj, other))
        else {
            return Ok(false);
        };
        let xi = self.placement.left(cell);
        let yi = self.placement.bottom(cell);
        let y2 = self.placement.bottom(other);

        let adjacent = si == sj && (ix_i + 1 == ix_j || ix_j + 1 == ix_i);
        if !adjacent {
            // `other` into the hole left by `cell`.
            let Some(new_other) = self.fit_into_hole(other, cell, si, ix_i, xi) else {
                return Ok(false);
            };
            // `cell` into the hole left by `other`, as close to `xj` as possible.
            let Some(new_cell) = self.fit_into_hole(cell, other, sj, ix_j, xj) else {
                return Ok(false);
            };
            if !self.stage_move(ctx, cell, new_cell, y2, &[sj])? {
                return Ok(false);
            }
            return self.stage_move(ctx, other, new_other, yi, &[si]);
        }

        // Adjacent in one segment: order the pair left to right.
        let list = self.index.cells(si);
        let (first, last, first_ix) = if ix_i < ix_j {
            (cell, other, ix_i)
        } else {
            (other, cell, ix_j)
        };
        let prev = first_ix.checked_sub(1).map(|k| list[k]);
        let next = list.get(first_ix + 2).copied();
        // After the swap `last` sits on the left and `first` on the right.
        let lx = prev.map_or(seg_i.xmin, |p| self.placement.right(p)) + self.spacing(prev, Some(last));
        let rx = next.map_or(seg_i.xmax, |n| self.placement.left(n)) - self.spacing(Some(first), next);
        let need = self.placement.width(first)
            + self.placement.width(last)
            + self.spacing(Some(last), Some(first));
        if need > rx - lx {
            return Ok(false);
        }
        // Each cell aims for where its partner was.
        let targets = if last == other { [xi, xj] } else { [xj, xi] };
        let Some(placed) = self.shift(&[last, first], &targets, lx, rx, seg_i.row) else {
            return Ok(false);
        };
        if !self.stage_move(ctx, last, placed[0], yi, &[si])? {
            return Ok(false);
        }
        self.stage_move(ctx, first, placed[1], yi, &[si])
    }

    /// Site-aligned left edge for `mover` in the gap around `vacating`, which
    /// sits at position `at` of segment `seg`. Returns `None` if it does not fit.
    fn fit_into_hole(
        &self,
        mover: CellId,
        vacating: CellId,
        seg: SegmentId,
        at: usize,
        target: i64,
    ) -> Option<i64> {
        let s = self.segments.get(seg);
        let list = self.index.cells(seg);
        let prev = at.checked_sub(1).map(|k| list[k]).filter(|&c| c != mover);
        let next = list.get(at + 1).copied().filter(|&c| c != mover);
        debug_assert_eq!(list.get(at), Some(&vacating));
        let lx = prev.map_or(s.xmin, |p| self.placement.right(p)) + self.spacing(prev, Some(mover));
        let rx = next.map_or(s.xmax, |n| self.placement.left(n)) - self.spacing(Some(mover), next);
        if self.placement.width(mover) > rx - lx {
            return None;
        }
        self.align_pos(mover, target, lx, rx, s.row)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::context::LegalizationContext;
    use crate::db::{Architecture, Cell, Design, Netlist};

    #[test]
    fn adjacent_swap_exchanges_order() {
        let design = one_row_design(100, &[(100, 20), (120, 40)]);
        let mut engine = make_engine(&design);
        let ctx = LegalizationContext::new(1, &design.arch);
        let seg = engine.segment_of(id(0)).unwrap();
        assert!(engine.propose_swap(&ctx, id(0), 130, 0, seg).unwrap());
        let p = engine.placement();
        assert!(p.left(id(1)) < p.left(id(0)));
        assert!(p.right(id(1)) <= p.left(id(0)));
        assert_eq!(engine.index().cells(seg), &[id(1), id(0)]);
    }

    #[test]
    fn swap_with_self_or_tall_cell_is_rejected() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("a", 20, 100).at(100, 0));
        nl.add_cell(Cell::new("tall", 20, 200).at(300, 0));
        let design = Design::new(Architecture::uniform(2, 100, 50, 10), nl);
        let mut engine = make_engine(&design);
        let ctx = LegalizationContext::new(1, &design.arch);
        let seg = engine.segment_of(id(0)).unwrap();
        let before = engine.placement().clone();
        assert!(!engine.propose_swap(&ctx, id(0), 300, 0, seg).unwrap());
        assert!(!engine.propose_swap(&ctx, id(0), 100, 0, seg).unwrap());
        assert_eq!(engine.placement(), &before);
        assert!(engine.journal().is_empty());
    }

    #[test]
    fn distant_swap_trades_holes() {
        let mut nl = Netlist::new();
        nl.add_cell(Cell::new("a", 20, 100).at(100, 0));
        nl.add_cell(Cell::new("b", 20, 100).at(300, 100));
        let design = Design::new(Architecture::uniform(2, 100, 50, 10), nl);
        let mut engine = make_engine(&design);
        let ctx = LegalizationContext::new(1, &design.arch);
        let target = engine.segment_of(id(1)).unwrap();
        assert!(engine.propose_swap(&ctx, id(0), 300, 100, target).unwrap());
        let p = engine.placement();
        assert_eq!((p.left(id(0)), p.bottom(id(0))), (300, 100));
        assert_eq!((p.left(id(1)), p.bottom(id(1))), (100, 0));
        engine.commit();
        engine.check_consistency().unwrap();
    }
}
