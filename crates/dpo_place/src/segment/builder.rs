//! Segment construction from rows, blockages, and fence regions.
//!
//! For every row:
//! 1. collect padded blockages from fixed cells and placement blockages,
//! 2. merge them left to right,
//! 3. take the free intervals between them,
//! 4. split the intervals at fence-region boundaries,
//! 5. snap both ends inward to the site grid and drop empty intervals.

use crate::db::{Architecture, Design};
use crate::ids::{RegionId, RowId};
use crate::segment::SegmentTable;
use dpo_common::{DpoResult, InternalError, Rect};
use tracing::debug;

/// Where a blockage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockageKind {
    /// A fixed cell.
    FixedInstance,
    /// An explicit placement blockage.
    Placement,
}

/// An obstructed X-interval within one row, with keep-out padding on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blockage {
    /// Left edge of the obstruction.
    pub xmin: i64,
    /// Right edge of the obstruction.
    pub xmax: i64,
    /// Keep-out to the left.
    pub pad_left: i64,
    /// Keep-out to the right.
    pub pad_right: i64,
    /// Origin of the blockage.
    pub kind: BlockageKind,
}

impl Blockage {
    fn padded_left(&self) -> i64 {
        self.xmin - self.pad_left
    }

    fn padded_right(&self) -> i64 {
        self.xmax + self.pad_right
    }
}

fn push_rect_blockage(
    arch: &Architecture,
    rows: &mut [Vec<Blockage>],
    rect: &Rect,
    pad_left: i64,
    pad_right: i64,
    kind: BlockageKind,
) {
    let xmin = rect.xmin.max(arch.bounds.xmin);
    let xmax = rect.xmax.min(arch.bounds.xmax);
    if xmax <= xmin {
        return;
    }
    for (r, row) in arch.rows.iter().enumerate() {
        if row.bottom < rect.ymax && row.top() > rect.ymin {
            rows[r].push(Blockage {
                xmin,
                xmax,
                pad_left,
                pad_right,
                kind,
            });
        }
    }
}

/// Returns the merged, X-sorted blockages of every row.
///
/// Fixed cells are padded with their own keep-outs; placement blockages are
/// unpadded. Blockages whose padded extents overlap are merged, keeping the
/// padding of whichever piece reaches furthest right.
pub fn find_blockages(design: &Design) -> Vec<Vec<Blockage>> {
    let arch = &design.arch;
    let mut rows: Vec<Vec<Blockage>> = vec![Vec::new(); arch.num_rows()];

    for cell in design.netlist.cells.iter().filter(|c| c.fixed) {
        let rect = Rect::new(cell.left, cell.bottom, cell.right(), cell.top());
        push_rect_blockage(
            arch,
            &mut rows,
            &rect,
            arch.cell_spacing(None, Some(cell)),
            arch.cell_spacing(Some(cell), None),
            BlockageKind::FixedInstance,
        );
    }
    for rect in &design.netlist.blockages {
        push_rect_blockage(arch, &mut rows, rect, 0, 0, BlockageKind::Placement);
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by_key(|b| (b.padded_left(), b.xmin));
            let mut merged: Vec<Blockage> = Vec::with_capacity(row.len());
            for b in row {
                match merged.last_mut() {
                    Some(top) if b.padded_left() < top.padded_right() => {
                        if b.padded_right() > top.padded_right() {
                            top.xmax = b.xmax;
                            top.pad_right = b.pad_right;
                        }
                    }
                    _ => merged.push(b),
                }
            }
            merged
        })
        .collect()
}

/// Returns the merged X-intervals of `region` in `row`.
///
/// Only rectangles covering the full row height count. Interval ends are
/// widened outward to the site grid.
pub fn region_intervals(arch: &Architecture, row: RowId, region: RegionId) -> Vec<(i64, i64)> {
    let Some(reg) = arch.regions.get(region.index()) else {
        return Vec::new();
    };
    let r = arch.row(row);
    let mut intervals: Vec<(i64, i64)> = reg
        .rects
        .iter()
        .filter(|rect| rect.covers_band(r.bottom, r.top()))
        .map(|rect| {
            (
                r.snap_down(rect.xmin).max(r.origin_x),
                r.snap_up(rect.xmax).min(r.right()),
            )
        })
        .filter(|(lo, hi)| hi > lo)
        .collect();
    intervals.sort_unstable();

    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(intervals.len());
    for (lo, hi) in intervals {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Splits free intervals against one region interval `[il, ir]`.
fn split_by_region(
    intervals: Vec<(i64, i64, RegionId)>,
    il: i64,
    ir: i64,
    region: RegionId,
    row: RowId,
) -> DpoResult<Vec<(i64, i64, RegionId)>> {
    let mut out = Vec::with_capacity(intervals.len() + 2);
    for (sl, sr, reg) in intervals {
        if ir <= sl || il >= sr {
            out.push((sl, sr, reg));
            continue;
        }
        if reg != RegionId::DEFAULT {
            return Err(InternalError::new(format!(
                "regions {reg} and {region} overlap in row {row}"
            )));
        }
        if il <= sl && ir >= sr {
            out.push((sl, sr, region));
        } else if il > sl && ir >= sr {
            out.push((sl, il, reg));
            out.push((il, sr, region));
        } else if il <= sl && ir < sr {
            out.push((sl, ir, region));
            out.push((ir, sr, reg));
        } else {
            out.push((sl, il, reg));
            out.push((il, ir, region));
            out.push((ir, sr, reg));
        }
    }
    Ok(out)
}

/// Builds the segment table of a design.
///
/// Must run before any cell is assigned; rebuilding invalidates every
/// existing segment membership. Overlapping fence regions are an internal
/// error.
pub fn build_segments(design: &Design) -> DpoResult<SegmentTable> {
    let arch = &design.arch;
    let blockages = find_blockages(design);
    let mut rows = Vec::with_capacity(arch.num_rows());

    for (r, row_blockages) in blockages.iter().enumerate() {
        let row_id = RowId::from_index(r);
        let row = arch.row(row_id);
        let start = row.origin_x.max(arch.bounds.xmin);
        let end = row.right().min(arch.bounds.xmax);

        let mut free: Vec<(i64, i64, RegionId)> = Vec::new();
        let mut x = start;
        for b in row_blockages {
            let lx = b.padded_left().min(end);
            if lx > x {
                free.push((x, lx, RegionId::DEFAULT));
            }
            x = x.max(b.padded_right());
        }
        if x < end {
            free.push((x, end, RegionId::DEFAULT));
        }

        for region in arch.regions.iter().skip(1) {
            for (il, ir) in region_intervals(arch, row_id, region.id) {
                free = split_by_region(free, il, ir, region.id, row_id)?;
            }
        }

        let mut snapped: Vec<(i64, i64, RegionId)> = free
            .into_iter()
            .map(|(lo, hi, reg)| (row.snap_up(lo), row.snap_down(hi), reg))
            .filter(|(lo, hi, _)| hi > lo)
            .collect();
        snapped.sort_by_key(|s| s.0);
        rows.push(snapped);
    }

    let table = SegmentTable::from_rows(rows);
    debug!(
        segments = table.len(),
        rows = arch.num_rows(),
        "built row segments"
    );
    Ok(table)
}
