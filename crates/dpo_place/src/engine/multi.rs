//! Multi-height cell moves.

use super::MoveEngine;
use crate::context::LegalizationContext;
use crate::ids::{CellId, RowId, SegmentId};
use dpo_common::DpoResult;

impl MoveEngine<'_> {
    /// Moves a cell spanning several rows to `xj`, with its bottom row
    /// derived from segment `sj`.
    ///
    /// The bottom row is lowered until the whole span fits on the chip. The
    /// move needs a free gap around `xj` in every spanned row, and the rails
    /// of the bottom and top rows must agree with the cell. Neighbors are
    /// never shifted.
    pub(super) fn try_move_multi_row(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        xj: i64,
        _yj: i64,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        let span = self.span(cell);
        if span <= 1 || self.index.segments_of(cell).len() != span {
            return Ok(false);
        }
        let design = self.design;
        let num_rows = design.arch.num_rows();
        if span > num_rows {
            return Ok(false);
        }
        let mut rb = self.segments.get(sj).row.index();
        while rb + span > num_rows {
            rb -= 1;
        }
        let base = RowId::from_index(rb);
        let me = self.cell(cell);
        if !design.arch.power_compatible(me, base) {
            return Ok(false);
        }

        let w = self.placement.width(cell);
        let mut segs: Vec<SegmentId> = Vec::with_capacity(span);
        let mut xmin = i64::MIN;
        let mut xmax = i64::MAX;
        for r in rb..rb + span {
            let Some(s) = self.segments.find(RowId::from_index(r), xj, me.region) else {
                return Ok(false);
            };
            let seg = self.segments.get(s);
            let others: Vec<CellId> = self
                .index
                .cells(s)
                .iter()
                .copied()
                .filter(|&c| c != cell)
                .collect();
            let pos = others.partition_point(|&c| self.placement.center_x(c) < xj);
            let left = pos.checked_sub(1).map(|k| others[k]);
            let right = others.get(pos).copied();

            let lx = left.map_or(seg.xmin, |l| self.placement.right(l)) + self.spacing(left, Some(cell));
            let rx = right.map_or(seg.xmax, |r| self.placement.left(r)) - self.spacing(Some(cell), right);
            if w > rx - lx {
                return Ok(false);
            }
            xmin = xmin.max(lx);
            xmax = xmax.min(rx);
            segs.push(s);
        }
        if w > xmax - xmin {
            return Ok(false);
        }
        let Some(x) = self.align_pos(cell, xj, xmin, xmax, base) else {
            return Ok(false);
        };
        let y = design.arch.row(base).bottom;
        self.stage_move(ctx, cell, x, y, &segs)
    }
}
