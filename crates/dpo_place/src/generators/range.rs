//! Wirelength-optimal target regions.

use crate::context::LegalizationContext;
use crate::db::{Architecture, Netlist};
use crate::engine::MoveEngine;
use crate::ids::{CellId, SegmentId};
use crate::placement::Placement;
use dpo_common::Rect;

/// Nets with more pins than this are ignored when locating a cell's
/// optimal region.
pub const MAX_REGION_NET_PINS: usize = 100;

/// Returns the box of cell-center positions that minimizes the HPWL of the
/// nets of `cell`, with every other cell held still.
///
/// Each net contributes the bounding box of its other pins, shifted by the
/// offset of the pin on `cell` and clamped to the chip. The result spans the
/// two median coordinates on each axis. Returns `None` if no net has another
/// pin.
pub fn optimal_region(
    netlist: &Netlist,
    arch: &Architecture,
    placement: &Placement,
    cell: CellId,
    skip_nets_larger_than: usize,
) -> Option<Rect> {
    let chip = arch.bounds;
    let mut xs: Vec<i64> = Vec::new();
    let mut ys: Vec<i64> = Vec::new();
    for &pin_id in &netlist.cell(cell).pins {
        let pin = netlist.pin(pin_id);
        let net = netlist.net(pin.net);
        if net.pins.len() <= 1 || net.pins.len() > skip_nets_larger_than {
            continue;
        }
        let mut bbox: Option<Rect> = None;
        for &other_id in &net.pins {
            let other = netlist.pin(other_id);
            if other.cell == cell {
                continue;
            }
            let x = placement.center_x(other.cell) + other.offset_x;
            let y = placement.center_y(other.cell) + other.offset_y;
            bbox = Some(match bbox {
                None => Rect::new(x, y, x, y),
                Some(b) => Rect::new(b.xmin.min(x), b.ymin.min(y), b.xmax.max(x), b.ymax.max(y)),
            });
        }
        let Some(b) = bbox else {
            continue;
        };
        xs.push((b.xmin - pin.offset_x).clamp(chip.xmin, chip.xmax));
        xs.push((b.xmax - pin.offset_x).clamp(chip.xmin, chip.xmax));
        ys.push((b.ymin - pin.offset_y).clamp(chip.ymin, chip.ymax));
        ys.push((b.ymax - pin.offset_y).clamp(chip.ymin, chip.ymax));
    }
    if xs.len() < 2 {
        return None;
    }
    xs.sort_unstable();
    ys.sort_unstable();
    let mid = xs.len() / 2;
    Some(Rect::new(xs[mid - 1], ys[mid - 1], xs[mid], ys[mid]))
}

/// Closest row to `y` and the segment of that row containing `x` for the
/// cell's region, as `(row bottom, segment)`.
pub(crate) fn segment_at(engine: &MoveEngine<'_>, cell: CellId, x: i64, y: i64) -> Option<(i64, SegmentId)> {
    let arch = engine.arch();
    let row = arch.closest_row(y)?;
    let seg = engine.segments().find(row, x, engine.cell(cell).region)?;
    Some((arch.row(row).bottom, seg))
}

/// Target lower-left corner and segment that move `cell` toward its optimal
/// region without leaving its displacement box.
///
/// Returns `None` if the cell already sits inside its optimal region, has
/// no connected pins, or the target is off every segment of its region.
pub(crate) fn wirelength_target(
    engine: &MoveEngine<'_>,
    ctx: &LegalizationContext,
    cell: CellId,
) -> Option<(i64, i64, SegmentId)> {
    let p = engine.placement();
    let bbox = optimal_region(engine.netlist(), engine.arch(), p, cell, MAX_REGION_NET_PINS)?;
    let (cx, cy) = (p.center_x(cell), p.center_y(cell));
    if bbox.contains_point(cx, cy) {
        return None;
    }

    // Displacement box around the original center.
    let orig = engine.original_placement();
    let limits = ctx.limits();
    let (ox, oy) = (orig.center_x(cell), orig.center_y(cell));
    let (xmin, xmax) = clip_axis(bbox.xmin, bbox.xmax, ox - limits.max_x, ox + limits.max_x, cx);
    let (ymin, ymax) = clip_axis(bbox.ymin, bbox.ymax, oy - limits.max_y, oy + limits.max_y, cy);

    let x = (xmin + xmax).div_euclid(2) - p.width(cell) / 2;
    let y = (ymin + ymax).div_euclid(2) - p.height(cell) / 2;
    let (bottom, seg) = segment_at(engine, cell, x, y)?;
    Some((x, bottom, seg))
}

/// Clips the interval `[lo, hi]` to the limit interval `[llo, lhi]`. If the
/// two are disjoint, the result runs from `cur` to the nearest limit edge.
fn clip_axis(lo: i64, hi: i64, llo: i64, lhi: i64, cur: i64) -> (i64, i64) {
    if lhi <= lo {
        (cur.min(lhi), lhi)
    } else if llo >= hi {
        (llo, cur.max(llo))
    } else {
        (lo.max(llo), hi.min(lhi))
    }
}
