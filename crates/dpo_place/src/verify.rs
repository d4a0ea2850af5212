//! Post-pass legality checks.
//!
//! After the optimization script finishes, every segment and every movable
//! cell is checked once more, independent of the rule checker the engine
//! used while moving. Each class of violation is counted and reported as a
//! warning diagnostic; a clean placement produces a single summary note.

use crate::engine::MoveEngine;
use crate::ids::{CellId, SegmentId};
use dpo_common::{DpoResult, InternalError};
use dpo_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Severity, Subject};
use std::fmt;
use tracing::{debug, info};

/// Violation counts by class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViolationCounts {
    /// Neighbors that overlap, or cells sticking out of their segment.
    pub overlap: usize,
    /// Neighbor gaps narrower than the required edge spacing and padding.
    pub spacing: usize,
    /// Neighbor gaps of exactly one site, when those are disallowed.
    pub one_site_gap: usize,
    /// Cells sitting in a segment of another region.
    pub region: usize,
    /// Cells whose left edge is off the site grid.
    pub site_alignment: usize,
    /// Cells whose bottom edge is not on their row.
    pub row_alignment: usize,
}

impl ViolationCounts {
    /// Sum over all classes.
    pub fn total(&self) -> usize {
        self.overlap
            + self.spacing
            + self.one_site_gap
            + self.region
            + self.site_alignment
            + self.row_alignment
    }

    /// Returns `true` if no violation of any class was found.
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    fn classes(&self) -> [(u16, usize, &'static str); 6] {
        [
            (101, self.overlap, "overlapping or out-of-segment placements"),
            (102, self.spacing, "edge spacing or padding violations"),
            (103, self.one_site_gap, "one-site gaps between neighbors"),
            (104, self.region, "cells placed outside their region"),
            (105, self.site_alignment, "cells off the site grid"),
            (106, self.row_alignment, "cells not aligned to a row"),
        ]
    }
}

impl fmt::Display for ViolationCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "overlap {}, spacing {}, one-site gaps {}, region {}, site {}, row {}",
            self.overlap,
            self.spacing,
            self.one_site_gap,
            self.region,
            self.site_alignment,
            self.row_alignment
        )
    }
}

/// Counts the violations of the engine's current placement.
///
/// Fails only if a cell's segment membership disagrees with its height.
pub fn check_placement(engine: &MoveEngine<'_>, disallow_one_site_gaps: bool) -> DpoResult<ViolationCounts> {
    let mut counts = ViolationCounts::default();
    for s in 0..engine.segments().len() {
        check_segment(engine, SegmentId::from_index(s), disallow_one_site_gaps, &mut counts);
    }
    let cells = engine
        .single_height_cells()
        .iter()
        .chain(engine.multi_height_cells())
        .copied();
    for cell in cells {
        check_cell(engine, cell, &mut counts)?;
    }
    Ok(counts)
}

fn check_segment(engine: &MoveEngine<'_>, seg: SegmentId, disallow_one_site_gaps: bool, counts: &mut ViolationCounts) {
    let s = engine.segments().get(seg);
    let site = engine.arch().row(s.row).site_spacing;
    let p = engine.placement();
    let mut cells = engine.index().cells(seg).to_vec();
    cells.sort_by_key(|&c| (p.left(c), c));

    for &c in &cells {
        if p.left(c) < s.xmin || p.right(c) > s.xmax {
            counts.overlap += 1;
        }
        if engine.cell(c).region != s.region {
            counts.region += 1;
        }
    }
    for pair in cells.windows(2) {
        let (l, r) = (pair[0], pair[1]);
        let gap = p.left(r) - p.right(l);
        if gap < 0 {
            counts.overlap += 1;
        } else if gap < engine.spacing(Some(l), Some(r)) {
            counts.spacing += 1;
        } else if disallow_one_site_gaps && gap == site {
            counts.one_site_gap += 1;
        }
    }
}

fn check_cell(engine: &MoveEngine<'_>, cell: CellId, counts: &mut ViolationCounts) -> DpoResult<()> {
    let segs = engine.index().segments_of(cell);
    if segs.len() != engine.span(cell) {
        return Err(InternalError::new(format!(
            "cell '{}' spans {} rows but belongs to {} segments",
            engine.cell(cell).name,
            engine.span(cell),
            segs.len()
        )));
    }

    let arch = engine.arch();
    let p = engine.placement();
    let mut rows: Vec<usize> = segs.iter().map(|&s| engine.segments().get(s).row.index()).collect();
    rows.sort_unstable();

    if rows
        .iter()
        .any(|&r| !arch.rows[r].is_site_aligned(p.left(cell)))
    {
        counts.site_alignment += 1;
    }

    let contiguous = rows.windows(2).all(|w| w[1] == w[0] + 1);
    let on_base = arch
        .row_at_bottom(p.bottom(cell))
        .is_some_and(|r| rows.first() == Some(&r.index()));
    if !(contiguous && on_base) {
        counts.row_alignment += 1;
    }
    Ok(())
}

/// Runs [`check_placement`] and reports the outcome into `sink`.
pub fn verify_placement(
    engine: &MoveEngine<'_>,
    disallow_one_site_gaps: bool,
    sink: &DiagnosticSink,
) -> DpoResult<ViolationCounts> {
    let counts = check_placement(engine, disallow_one_site_gaps)?;
    for (number, count, what) in counts.classes() {
        if count == 0 {
            continue;
        }
        debug!(code = number, count, "placement violation class");
        sink.emit(Diagnostic::new(
            Severity::for_violations(count),
            DiagnosticCode::new(Category::Placement, number),
            format!("{count} {what}"),
            Subject::Design,
        ));
    }
    if counts.is_clean() {
        sink.emit(Diagnostic::note(
            DiagnosticCode::new(Category::Placement, 100),
            "placement passed all legality checks",
            Subject::Design,
        ));
    }
    info!(total = counts.total(), counts = %counts, "post-pass verification");
    Ok(counts)
}
