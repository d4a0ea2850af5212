//! Bidirectional segment membership index.
//!
//! Maps each segment to its resident cells ordered by center X (ties by
//! cell ID), and each
//! cell to the segments it occupies. This module is the only place either
//! side is mutated, so the two directions and the per-segment utilization
//! always agree.

use crate::ids::{CellId, SegmentId};
use crate::placement::Placement;
use dpo_common::{DpoResult, InternalError};

/// Segment ⇄ cell membership with per-segment utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentIndex {
    cells_in_seg: Vec<Vec<CellId>>,
    segs_of_cell: Vec<Vec<SegmentId>>,
    util: Vec<i64>,
}

impl SegmentIndex {
    /// Creates an empty index.
    pub fn new(num_segments: usize, num_cells: usize) -> Self {
        Self {
            cells_in_seg: vec![Vec::new(); num_segments],
            segs_of_cell: vec![Vec::new(); num_cells],
            util: vec![0; num_segments],
        }
    }

    /// Cells resident in a segment, ordered by center X.
    pub fn cells(&self, seg: SegmentId) -> &[CellId] {
        &self.cells_in_seg[seg.index()]
    }

    /// Segments a cell occupies.
    pub fn segments_of(&self, cell: CellId) -> &[SegmentId] {
        &self.segs_of_cell[cell.index()]
    }

    /// Sum of resident cell widths.
    pub fn utilization(&self, seg: SegmentId) -> i64 {
        self.util[seg.index()]
    }

    /// Position of a cell within a segment's ordered list.
    pub fn position(&self, seg: SegmentId, cell: CellId) -> Option<usize> {
        self.cells(seg).iter().position(|&c| c == cell)
    }

    /// Number of segments tracked.
    pub fn num_segments(&self) -> usize {
        self.cells_in_seg.len()
    }

    /// Inserts a cell into a segment at its center-X position.
    ///
    /// Inserting a cell twice into the same segment, or into more segments
    /// than the rows it spans, is an internal error.
    pub(crate) fn insert(
        &mut self,
        seg: SegmentId,
        cell: CellId,
        placement: &Placement,
        span: usize,
    ) -> DpoResult<()> {
        let reverse = &mut self.segs_of_cell[cell.index()];
        if reverse.contains(&seg) {
            return Err(InternalError::new(format!(
                "cell {cell} is already a member of segment {seg}"
            )));
        }
        if reverse.len() >= span {
            return Err(InternalError::new(format!(
                "cell {cell} spans {span} rows but already occupies {} segments",
                reverse.len()
            )));
        }
        reverse.push(seg);

        let key = (placement.center_x(cell), cell);
        let list = &mut self.cells_in_seg[seg.index()];
        let at = list.partition_point(|&c| (placement.center_x(c), c) < key);
        list.insert(at, cell);
        self.util[seg.index()] += placement.width(cell);
        Ok(())
    }

    /// Removes a cell from a segment.
    ///
    /// Removing a cell that is missing from either direction of the index
    /// is an internal error.
    pub(crate) fn remove(
        &mut self,
        seg: SegmentId,
        cell: CellId,
        placement: &Placement,
    ) -> DpoResult<()> {
        let list = &mut self.cells_in_seg[seg.index()];
        let Some(at) = list.iter().position(|&c| c == cell) else {
            return Err(InternalError::new(format!(
                "cell {cell} not found in segment {seg}"
            )));
        };
        list.remove(at);

        let reverse = &mut self.segs_of_cell[cell.index()];
        let Some(rat) = reverse.iter().position(|&s| s == seg) else {
            return Err(InternalError::new(format!(
                "segment {seg} not found in reverse map of cell {cell}"
            )));
        };
        reverse.remove(rat);
        self.util[seg.index()] -= placement.width(cell);
        Ok(())
    }

    /// Re-sorts one segment by center X and recomputes its utilization.
    ///
    /// Ties are broken by cell ID so the order is a function of positions alone.
    pub(crate) fn resort(&mut self, seg: SegmentId, placement: &Placement) {
        let list = &mut self.cells_in_seg[seg.index()];
        list.sort_by_key(|&c| (placement.center_x(c), c));
        self.util[seg.index()] = list.iter().map(|&c| placement.width(c)).sum();
    }

    /// Re-sorts every segment.
    pub(crate) fn resort_all(&mut self, placement: &Placement) {
        for s in 0..self.cells_in_seg.len() {
            self.resort(SegmentId::from_index(s), placement);
        }
    }

    /// Empties every segment.
    pub(crate) fn clear(&mut self) {
        for list in &mut self.cells_in_seg {
            list.clear();
        }
        for list in &mut self.segs_of_cell {
            list.clear();
        }
        self.util.iter_mut().for_each(|u| *u = 0);
    }

    /// Verifies that both directions agree and utilizations match.
    pub fn check_consistency(&self, placement: &Placement) -> DpoResult<()> {
        for (s, list) in self.cells_in_seg.iter().enumerate() {
            let seg = SegmentId::from_index(s);
            for &cell in list {
                if !self.segs_of_cell[cell.index()].contains(&seg) {
                    return Err(InternalError::new(format!(
                        "segment {seg} lists cell {cell} but the cell does not list the segment"
                    )));
                }
            }
            let util: i64 = list.iter().map(|&c| placement.width(c)).sum();
            if util != self.util[s] {
                return Err(InternalError::new(format!(
                    "segment {seg} utilization {} disagrees with resident widths {util}",
                    self.util[s]
                )));
            }
        }
        for (c, segs) in self.segs_of_cell.iter().enumerate() {
            let cell = CellId::from_index(c);
            for &seg in segs {
                if !self.cells_in_seg[seg.index()].contains(&cell) {
                    return Err(InternalError::new(format!(
                        "cell {cell} lists segment {seg} but the segment does not list the cell"
                    )));
                }
            }
        }
        Ok(())
    }
}
