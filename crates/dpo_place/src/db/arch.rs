//! Row, site, and fence-region architecture of the placement area.

use crate::db::netlist::Cell;
use crate::ids::{RegionId, RowId};
use dpo_common::Rect;
use serde::{Deserialize, Serialize};

/// The supply rail running along the edge of a row or a cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum PowerRail {
    /// Rail is not specified; compatible with anything.
    #[default]
    Unknown,
    /// Positive supply.
    Vdd,
    /// Ground.
    Vss,
}

impl PowerRail {
    /// Returns `true` if two rails may abut.
    pub fn matches(self, other: PowerRail) -> bool {
        self == PowerRail::Unknown || other == PowerRail::Unknown || self == other
    }
}

/// A horizontal placement row made of equally spaced sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Bottom edge of the row.
    pub bottom: i64,
    /// Height of the row.
    pub height: i64,
    /// X coordinate of the first site.
    pub origin_x: i64,
    /// Pitch between consecutive sites.
    pub site_spacing: i64,
    /// Width of a single site.
    pub site_width: i64,
    /// Number of sites in the row.
    pub num_sites: i64,
    /// Rail along the bottom edge.
    pub bottom_power: PowerRail,
    /// Rail along the top edge.
    pub top_power: PowerRail,
}

impl Row {
    /// Creates a row with unknown power rails.
    pub fn new(bottom: i64, height: i64, origin_x: i64, site_width: i64, num_sites: i64) -> Self {
        Self {
            bottom,
            height,
            origin_x,
            site_spacing: site_width,
            site_width,
            num_sites,
            bottom_power: PowerRail::Unknown,
            top_power: PowerRail::Unknown,
        }
    }

    /// Sets the rails along the bottom and top edges.
    pub fn with_power(mut self, bottom: PowerRail, top: PowerRail) -> Self {
        self.bottom_power = bottom;
        self.top_power = top;
        self
    }

    /// Top edge of the row.
    pub fn top(&self) -> i64 {
        self.bottom + self.height
    }

    /// Right edge of the last site.
    pub fn right(&self) -> i64 {
        if self.num_sites <= 0 {
            return self.origin_x;
        }
        self.origin_x + (self.num_sites - 1) * self.site_spacing + self.site_width
    }

    /// Rounds `x` up to the next site boundary.
    pub fn snap_up(&self, x: i64) -> i64 {
        let k = (x - self.origin_x + self.site_spacing - 1).div_euclid(self.site_spacing);
        self.origin_x + k * self.site_spacing
    }

    /// Rounds `x` down to the previous site boundary.
    pub fn snap_down(&self, x: i64) -> i64 {
        let k = (x - self.origin_x).div_euclid(self.site_spacing);
        self.origin_x + k * self.site_spacing
    }

    /// Returns `true` if `x` lies on a site boundary.
    pub fn is_site_aligned(&self, x: i64) -> bool {
        (x - self.origin_x).rem_euclid(self.site_spacing) == 0
    }
}

/// A fence region: cells assigned to it must stay inside its rectangles, and
/// cells outside it must stay out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// The region's ID.
    pub id: RegionId,
    /// Human-readable region name.
    pub name: String,
    /// Rectangles making up the region.
    pub rects: Vec<Rect>,
}

/// The physical placement area: rows bottom to top, fence regions, and the
/// chip outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    /// Rows sorted by bottom edge.
    pub rows: Vec<Row>,
    /// Fence regions; entry 0 is the default region and has no rectangles.
    pub regions: Vec<Region>,
    /// The chip outline.
    pub bounds: Rect,
}

impl Architecture {
    /// Builds an architecture from a set of rows. The chip outline is the
    /// bounding box of the rows.
    pub fn new(mut rows: Vec<Row>) -> Self {
        rows.sort_by_key(|r| r.bottom);
        let bounds = if rows.is_empty() {
            Rect::new(0, 0, 0, 0)
        } else {
            let xmin = rows.iter().map(|r| r.origin_x).min().unwrap_or(0);
            let xmax = rows.iter().map(|r| r.right()).max().unwrap_or(0);
            let ymin = rows.iter().map(|r| r.bottom).min().unwrap_or(0);
            let ymax = rows.iter().map(|r| r.top()).max().unwrap_or(0);
            Rect::new(xmin, ymin, xmax, ymax)
        };
        Self {
            rows,
            regions: vec![Region {
                id: RegionId::DEFAULT,
                name: "default".to_string(),
                rects: Vec::new(),
            }],
            bounds,
        }
    }

    /// Builds `num_rows` identical rows of `num_sites` sites starting at the origin.
    pub fn uniform(num_rows: usize, row_height: i64, num_sites: i64, site_width: i64) -> Self {
        let rows = (0..num_rows)
            .map(|r| Row::new(r as i64 * row_height, row_height, 0, site_width, num_sites))
            .collect();
        Self::new(rows)
    }

    /// Adds a fence region and returns its ID.
    pub fn add_region(&mut self, name: impl Into<String>, rects: Vec<Rect>) -> RegionId {
        let id = RegionId::from_index(self.regions.len());
        self.regions.push(Region {
            id,
            name: name.into(),
            rects,
        });
        id
    }

    /// Returns the row with the given ID.
    pub fn row(&self, id: RowId) -> &Row {
        &self.rows[id.index()]
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the height of a single row.
    pub fn row_height(&self) -> i64 {
        self.rows.first().map_or(1, |r| r.height.max(1))
    }

    /// Returns the site width of the first row.
    pub fn site_width(&self) -> i64 {
        self.rows.first().map_or(1, |r| r.site_width.max(1))
    }

    /// Returns the chip width.
    pub fn chip_width(&self) -> i64 {
        self.bounds.width()
    }

    /// Returns the chip height.
    pub fn chip_height(&self) -> i64 {
        self.bounds.height()
    }

    /// Returns the row whose bottom edge is closest to `y`.
    pub fn closest_row(&self, y: i64) -> Option<RowId> {
        if self.rows.is_empty() {
            return None;
        }
        let pos = self.rows.partition_point(|r| r.bottom < y);
        let best = if pos == 0 {
            0
        } else if pos == self.rows.len() {
            pos - 1
        } else if (self.rows[pos].bottom - y) < (y - self.rows[pos - 1].bottom) {
            pos
        } else {
            pos - 1
        };
        Some(RowId::from_index(best))
    }

    /// Returns the row whose bottom edge is exactly `y`.
    pub fn row_at_bottom(&self, y: i64) -> Option<RowId> {
        self.rows
            .binary_search_by_key(&y, |r| r.bottom)
            .ok()
            .map(RowId::from_index)
    }

    /// Returns the number of rows a cell of the given height occupies.
    pub fn span_in_rows(&self, height: i64) -> usize {
        let rh = self.row_height();
        (((height + rh / 2) / rh).max(1)) as usize
    }

    /// Returns the required spacing between two horizontally adjacent cells.
    ///
    /// A `None` side stands for a segment edge and contributes no padding.
    pub fn cell_spacing(&self, left: Option<&Cell>, right: Option<&Cell>) -> i64 {
        left.map_or(0, |c| c.right_padding) + right.map_or(0, |c| c.left_padding)
    }

    /// Returns `true` if the cell's rails agree with the rows it would occupy
    /// when its bottom edge sits on row `base`.
    ///
    /// Odd-height cells may be flipped about the X axis; even-height cells
    /// carry the same rail on both edges and must match as drawn.
    pub fn power_compatible(&self, cell: &Cell, base: RowId) -> bool {
        let span = self.span_in_rows(cell.height);
        let top_index = base.index() + span - 1;
        if top_index >= self.rows.len() {
            return false;
        }
        let rb = self.rows[base.index()].bottom_power;
        let rt = self.rows[top_index].top_power;
        let direct = cell.bottom_power.matches(rb) && cell.top_power.matches(rt);
        let flipped = cell.bottom_power.matches(rt) && cell.top_power.matches(rb);
        if span % 2 == 1 {
            direct || flipped
        } else {
            direct
        }
    }

    /// Returns `true` if `(x, y)` is a legal lower-left corner for the cell:
    /// `y` is a row bottom, `x` is on that row's site grid, every spanned row
    /// exists, and the rails agree.
    pub fn is_valid_site(&self, cell: &Cell, x: i64, y: i64) -> bool {
        let Some(base) = self.row_at_bottom(y) else {
            return false;
        };
        if !self.row(base).is_site_aligned(x) {
            return false;
        }
        self.power_compatible(cell, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cell(height: i64) -> Cell {
        Cell::new("c", 20, height)
    }

    #[test]
    fn row_geometry() {
        let row = Row::new(100, 50, 10, 5, 20);
        assert_eq!(row.top(), 150);
        assert_eq!(row.right(), 110);
        assert_eq!(row.snap_up(12), 15);
        assert_eq!(row.snap_up(15), 15);
        assert_eq!(row.snap_down(14), 10);
        assert!(row.is_site_aligned(25));
        assert!(!row.is_site_aligned(26));
    }

    #[test]
    fn snap_below_origin() {
        let row = Row::new(0, 10, 10, 5, 20);
        assert_eq!(row.snap_down(7), 5);
        assert_eq!(row.snap_up(7), 10);
    }

    #[test]
    fn uniform_bounds() {
        let arch = Architecture::uniform(4, 100, 50, 10);
        assert_eq!(arch.bounds, Rect::new(0, 0, 500, 400));
        assert_eq!(arch.row_height(), 100);
        assert_eq!(arch.regions.len(), 1);
    }

    #[test]
    fn closest_row_lookup() {
        let arch = Architecture::uniform(4, 100, 50, 10);
        assert_eq!(arch.closest_row(-30), Some(RowId::from_raw(0)));
        assert_eq!(arch.closest_row(140), Some(RowId::from_raw(1)));
        assert_eq!(arch.closest_row(160), Some(RowId::from_raw(2)));
        assert_eq!(arch.closest_row(9999), Some(RowId::from_raw(3)));
        assert_eq!(arch.row_at_bottom(200), Some(RowId::from_raw(2)));
        assert_eq!(arch.row_at_bottom(210), None);
    }

    #[test]
    fn spacing_uses_facing_paddings() {
        let arch = Architecture::uniform(1, 100, 50, 10);
        let left = make_cell(100).with_padding(3, 7);
        let right = make_cell(100).with_padding(11, 13);
        assert_eq!(arch.cell_spacing(Some(&left), Some(&right)), 18);
        assert_eq!(arch.cell_spacing(None, Some(&right)), 11);
        assert_eq!(arch.cell_spacing(Some(&left), None), 7);
        assert_eq!(arch.cell_spacing(None, None), 0);
    }

    #[test]
    fn power_compatibility() {
        let rows = (0..3)
            .map(|r| {
                let (b, t) = if r % 2 == 0 {
                    (PowerRail::Vss, PowerRail::Vdd)
                } else {
                    (PowerRail::Vdd, PowerRail::Vss)
                };
                Row::new(r * 100, 100, 0, 10, 50).with_power(b, t)
            })
            .collect();
        let arch = Architecture::new(rows);
        let double = make_cell(200).with_power(PowerRail::Vss, PowerRail::Vss);
        assert!(arch.power_compatible(&double, RowId::from_raw(0)));
        assert!(!arch.power_compatible(&double, RowId::from_raw(1)));
        assert!(!arch.power_compatible(&double, RowId::from_raw(2)));

        let single = make_cell(100).with_power(PowerRail::Vss, PowerRail::Vdd);
        assert!(arch.power_compatible(&single, RowId::from_raw(1)));
    }

    #[test]
    fn valid_site() {
        let arch = Architecture::uniform(2, 100, 50, 10);
        let cell = make_cell(100);
        assert!(arch.is_valid_site(&cell, 30, 100));
        assert!(!arch.is_valid_site(&cell, 35, 100));
        assert!(!arch.is_valid_site(&cell, 30, 150));
    }
}
