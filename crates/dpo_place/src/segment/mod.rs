//! Row segments: the legal free intervals of each row.
//!
//! A segment is a contiguous, blockage-free, region-homogeneous run of sites
//! within a single row. Segments in a row are disjoint and ordered by X.
//! [`build_segments`] derives them from the architecture and the fixed
//! cells; [`SegmentIndex`] tracks which movable cells live in each one.

mod builder;
mod index;

pub use builder::{build_segments, find_blockages, region_intervals, Blockage, BlockageKind};
pub use index::SegmentIndex;

use crate::ids::{RegionId, RowId, SegmentId};
use serde::{Deserialize, Serialize};

/// A legal placement interval `[xmin, xmax]` within one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// The segment's ID.
    pub id: SegmentId,
    /// The row containing the segment.
    pub row: RowId,
    /// Left edge, on the site grid.
    pub xmin: i64,
    /// Right edge, on the site grid.
    pub xmax: i64,
    /// Fence region every cell in the segment must belong to.
    pub region: RegionId,
}

impl Segment {
    /// Horizontal extent.
    pub fn width(&self) -> i64 {
        self.xmax - self.xmin
    }

    /// Returns `true` if `x` lies within the closed interval.
    pub fn contains(&self, x: i64) -> bool {
        x >= self.xmin && x <= self.xmax
    }
}

/// All segments of a design, with a per-row lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    by_row: Vec<Vec<SegmentId>>,
}

impl SegmentTable {
    /// Builds a table from segments already sorted by row, then by `xmin`.
    pub(crate) fn from_rows(rows: Vec<Vec<(i64, i64, RegionId)>>) -> Self {
        let mut segments = Vec::new();
        let mut by_row = Vec::with_capacity(rows.len());
        for (r, intervals) in rows.into_iter().enumerate() {
            let mut ids = Vec::with_capacity(intervals.len());
            for (xmin, xmax, region) in intervals {
                let id = SegmentId::from_index(segments.len());
                segments.push(Segment {
                    id,
                    row: RowId::from_index(r),
                    xmin,
                    xmax,
                    region,
                });
                ids.push(id);
            }
            by_row.push(ids);
        }
        Self { segments, by_row }
    }

    /// Returns the segment with the given ID.
    pub fn get(&self, id: SegmentId) -> &Segment {
        &self.segments[id.index()]
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// The segments of a row, ordered by X.
    pub fn in_row(&self, row: RowId) -> &[SegmentId] {
        self.by_row.get(row.index()).map_or(&[], |v| v.as_slice())
    }

    /// Number of rows covered by the table.
    pub fn num_rows(&self) -> usize {
        self.by_row.len()
    }

    /// Finds the segment of `row` in `region` whose closed interval contains `x`.
    pub fn find(&self, row: RowId, x: i64, region: RegionId) -> Option<SegmentId> {
        self.in_row(row)
            .iter()
            .copied()
            .find(|&s| {
                let seg = self.get(s);
                seg.region == region && seg.contains(x)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table() -> SegmentTable {
        SegmentTable::from_rows(vec![
            vec![(0, 100, RegionId::DEFAULT), (200, 300, RegionId::DEFAULT)],
            vec![(0, 300, RegionId::from_raw(1))],
        ])
    }

    #[test]
    fn ids_are_sequential_across_rows() {
        let t = make_table();
        assert_eq!(t.len(), 3);
        assert_eq!(t.in_row(RowId::from_raw(1)), &[SegmentId::from_raw(2)]);
        assert_eq!(t.get(SegmentId::from_raw(2)).row, RowId::from_raw(1));
        assert!(t.in_row(RowId::from_raw(9)).is_empty());
    }

    #[test]
    fn find_checks_region_and_bounds() {
        let t = make_table();
        let r0 = RowId::from_raw(0);
        assert_eq!(t.find(r0, 250, RegionId::DEFAULT), Some(SegmentId::from_raw(1)));
        assert_eq!(t.find(r0, 150, RegionId::DEFAULT), None);
        assert_eq!(t.find(RowId::from_raw(1), 10, RegionId::DEFAULT), None);
    }
}
