//! Single-height cell moves.

use super::MoveEngine;
use crate::context::LegalizationContext;
use crate::ids::{CellId, SegmentId};
use dpo_common::DpoResult;

impl MoveEngine<'_> {
    /// Moves a single-height cell into the free gap nearest `xj` within the
    /// segment it already occupies. Neighbors are never disturbed.
    pub(super) fn try_move_same_segment(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        xj: i64,
        _yj: i64,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        let seg = *self.segments.get(sj);
        let w = self.placement.width(cell);
        let others: Vec<CellId> = self
            .index
            .cells(sj)
            .iter()
            .copied()
            .filter(|&c| c != cell)
            .collect();
        let y = self.design.arch.row(seg.row).bottom;

        // Bounds of the gap between `prev` and `next`.
        let gap = |prev: Option<CellId>, next: Option<CellId>| -> (i64, i64) {
            let lx = prev.map_or(seg.xmin, |p| self.placement.right(p)) + self.spacing(prev, Some(cell));
            let rx = next.map_or(seg.xmax, |n| self.placement.left(n)) - self.spacing(Some(cell), next);
            (lx, rx)
        };

        let mut candidates: Vec<(i64, i64)> = Vec::with_capacity(2);
        if others.is_empty() {
            candidates.push(gap(None, None));
        } else {
            let pos = others.partition_point(|&c| self.placement.center_x(c) < xj);
            let j = pos.min(others.len() - 1);
            let ndj = others[j];
            let prev = j.checked_sub(1).map(|k| others[k]);
            let next = others.get(j + 1).copied();
            // Left of the nearest neighbor first, then right of it.
            candidates.push(gap(prev, Some(ndj)));
            candidates.push(gap(Some(ndj), next));
        }

        for (lx, rx) in candidates {
            if w > rx - lx {
                continue;
            }
            let Some(x) = self.align_pos(cell, xj, lx, rx, seg.row) else {
                continue;
            };
            return self.stage_move(ctx, cell, x, y, &[sj]);
        }
        Ok(false)
    }

    /// Moves a single-height cell into a different segment at `xj`, pushing
    /// the cells on either side outward to make room.
    pub(super) fn try_move_other_segment(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        xj: i64,
        _yj: i64,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        let seg = *self.segments.get(sj);
        if seg.region != self.cell(cell).region || self.span(cell) != 1 {
            return Ok(false);
        }
        let y = self.design.arch.row(seg.row).bottom;
        let w = self.placement.width(cell);

        let list = self.index.cells(sj).to_vec();
        let pos = list.partition_point(|&c| self.placement.center_x(c) < xj);
        let ndl = pos.checked_sub(1).map(|k| list[k]);
        let ndr = list.get(pos).copied();

        let required = w + self.spacing(ndl, Some(cell)) + self.spacing(Some(cell), ndr);
        if self.index.utilization(sj) + required > seg.width() {
            return Ok(false);
        }

        // The cell may cover up to half of each neighbor; the rest is
        // recovered by shifting.
        let lx = match ndl {
            Some(l) => self.placement.center_x(l) + self.spacing(Some(l), Some(cell)),
            None => seg.xmin,
        };
        let rx = match ndr {
            Some(r) => self.placement.center_x(r) - self.spacing(Some(cell), Some(r)),
            None => seg.xmax,
        };
        let lx = lx.max(seg.xmin);
        let rx = rx.min(seg.xmax);
        if w > rx - lx {
            return Ok(false);
        }
        let Some(x) = self.align_pos(cell, xj, lx, rx, seg.row) else {
            return Ok(false);
        };

        if !self.stage_move(ctx, cell, x, y, &[sj])? {
            return Ok(false);
        }
        if let Some(r) = ndr {
            if !self.shift_right(ctx, cell, r, sj)? {
                return Ok(false);
            }
        }
        if let Some(l) = ndl {
            if !self.shift_left(ctx, cell, l, sj)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Pushes `start` and every cell after it to the right until the chain
    /// clears `anchor`. Multi-height cells in the chain stop the push.
    pub(super) fn shift_right(
        &mut self,
        ctx: &LegalizationContext,
        anchor: CellId,
        start: CellId,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        let seg = *self.segments.get(sj);
        let design = self.design;
        let row = design.arch.row(seg.row);
        let chain = self.index.cells(sj).to_vec();
        let Some(from) = chain.iter().position(|&c| c == start) else {
            return Ok(false);
        };

        let mut prev = anchor;
        for &c in &chain[from..] {
            if c == anchor {
                continue;
            }
            let need = self.placement.right(prev) + self.spacing(Some(prev), Some(c));
            if self.placement.left(c) >= need {
                break;
            }
            if self.span(c) != 1 {
                return Ok(false);
            }
            let nx = row.snap_up(need);
            if nx + self.placement.width(c) + self.spacing(Some(c), None) > seg.xmax {
                return Ok(false);
            }
            if !self.stage_move(ctx, c, nx, self.placement.bottom(c), &[sj])? {
                return Ok(false);
            }
            prev = c;
        }
        Ok(true)
    }

    /// Pushes `start` and every cell before it to the left until the chain
    /// clears `anchor`.
    pub(super) fn shift_left(
        &mut self,
        ctx: &LegalizationContext,
        anchor: CellId,
        start: CellId,
        sj: SegmentId,
    ) -> DpoResult<bool> {
        let seg = *self.segments.get(sj);
        let design = self.design;
        let row = design.arch.row(seg.row);
        let chain = self.index.cells(sj).to_vec();
        let Some(from) = chain.iter().position(|&c| c == start) else {
            return Ok(false);
        };

        let mut next = anchor;
        for &c in chain[..=from].iter().rev() {
            if c == anchor {
                continue;
            }
            let limit = self.placement.left(next) - self.spacing(Some(c), Some(next));
            if self.placement.right(c) <= limit {
                break;
            }
            if self.span(c) != 1 {
                return Ok(false);
            }
            let nx = row.snap_down(limit - self.placement.width(c));
            if nx - self.spacing(None, Some(c)) < seg.xmin {
                return Ok(false);
            }
            if !self.stage_move(ctx, c, nx, self.placement.bottom(c), &[sj])? {
                return Ok(false);
            }
            next = c;
        }
        Ok(true)
    }
}
