//! Utilization density map.
//!
//! The chip is divided into pixels one site wide and one row tall. Each
//! movable cell spreads its area and pin count evenly over the pixels it
//! covers. The density of a pixel is a weighted blend of its normalized
//! area and pin load, scaled so the densest pixel reads 1.0.
//!
//! Incremental updates leave the map dirty. Reads on a dirty map reuse the
//! maxima from the last full normalization, so they are approximate until
//! [`DensityMap::normalize`] runs again.

use crate::db::{Architecture, Cell, Netlist};
use crate::placement::Placement;

/// A per-pixel density estimate consulted by wirelength/density trade-offs.
pub trait DensityMap {
    /// Rebuilds the map from scratch for the given positions.
    fn compute(&mut self, netlist: &Netlist, placement: &Placement);

    /// Pixel containing the point, if it lies on the chip.
    fn pixel_at(&self, x: i64, y: i64) -> Option<usize>;

    /// Density of a pixel in `[0, 1]`; off-chip pixels read zero.
    fn density_at(&self, pixel: usize) -> f64;

    /// Adds or removes a cell's contribution with its lower-left corner at
    /// `(left, bottom)`.
    fn update(&mut self, cell: &Cell, left: i64, bottom: i64, add: bool);

    /// Recomputes every pixel's density from the raw accumulators.
    fn normalize(&mut self);
}

/// Site-by-row utilization grid.
#[derive(Debug, Clone)]
pub struct UtilizationGrid {
    origin_x: i64,
    site: i64,
    cols: usize,
    row_bottoms: Vec<i64>,
    area_weight: f64,
    pin_weight: f64,
    area: Vec<f64>,
    pins: Vec<f64>,
    density: Vec<f64>,
    last_max_area: f64,
    last_max_pins: f64,
    last_max_density: f64,
    dirty: bool,
}

impl UtilizationGrid {
    /// Creates an empty grid covering the architecture.
    pub fn new(arch: &Architecture, area_weight: f64, pin_weight: f64) -> Self {
        let site = arch.rows.first().map_or(1, |r| r.site_spacing.max(1));
        let cols = ((arch.chip_width() + site - 1) / site).max(0) as usize;
        let row_bottoms: Vec<i64> = arch.rows.iter().map(|r| r.bottom).collect();
        let size = cols * row_bottoms.len();
        Self {
            origin_x: arch.bounds.xmin,
            site,
            cols,
            row_bottoms,
            area_weight,
            pin_weight,
            area: vec![0.0; size],
            pins: vec![0.0; size],
            density: vec![0.0; size],
            last_max_area: 0.0,
            last_max_pins: 0.0,
            last_max_density: 0.0,
            dirty: false,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.area.len()
    }

    /// Returns `true` if the grid has no pixels.
    pub fn is_empty(&self) -> bool {
        self.area.is_empty()
    }

    /// Raw accumulated area of a pixel.
    pub fn raw_area(&self, pixel: usize) -> f64 {
        self.area.get(pixel).copied().unwrap_or(0.0)
    }

    fn col_of(&self, x: i64) -> i64 {
        (x - self.origin_x).div_euclid(self.site)
    }

    fn row_of(&self, y: i64) -> i64 {
        self.row_bottoms.partition_point(|&b| b <= y) as i64 - 1
    }

    fn index(&self, col: i64, row: i64) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.row_bottoms.len() {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }

    /// Pixels covered by a cell at `(left, bottom)`, clipped to the chip.
    fn covered(&self, cell: &Cell, left: i64, bottom: i64) -> Vec<usize> {
        let x0 = self.col_of(left);
        let x1 = x0 + (cell.width + self.site - 1) / self.site;
        let y0 = self.row_of(bottom);
        let y1 = self.row_of(bottom + cell.height - 1) + 1;
        let mut out = Vec::new();
        for row in y0..y1 {
            for col in x0..x1 {
                if let Some(i) = self.index(col, row) {
                    out.push(i);
                }
            }
        }
        out
    }

    fn apply(&mut self, cell: &Cell, left: i64, bottom: i64, scale: f64) {
        let pixels = self.covered(cell, left, bottom);
        if pixels.is_empty() {
            return;
        }
        let n = pixels.len() as f64;
        let area = (cell.width * cell.height) as f64 / n * scale;
        let pins = cell.pins.len() as f64 / n * scale;
        for i in pixels {
            self.area[i] = (self.area[i] + area).max(0.0);
            self.pins[i] = (self.pins[i] + pins).max(0.0);
        }
    }

    fn blend(&self, area: f64, pins: f64, max_area: f64, max_pins: f64) -> f64 {
        let na = if max_area > 0.0 { area / max_area } else { 0.0 };
        let np = if max_pins > 0.0 { pins / max_pins } else { 0.0 };
        self.area_weight * na + self.pin_weight * np
    }
}

impl DensityMap for UtilizationGrid {
    fn compute(&mut self, netlist: &Netlist, placement: &Placement) {
        self.area.iter_mut().for_each(|v| *v = 0.0);
        self.pins.iter_mut().for_each(|v| *v = 0.0);
        for cell in &netlist.cells {
            if cell.fixed {
                continue;
            }
            self.apply(cell, placement.left(cell.id), placement.bottom(cell.id), 1.0);
        }
        self.normalize();
    }

    fn pixel_at(&self, x: i64, y: i64) -> Option<usize> {
        self.index(self.col_of(x), self.row_of(y))
    }

    fn density_at(&self, pixel: usize) -> f64 {
        let Some(&cached) = self.density.get(pixel) else {
            return 0.0;
        };
        if !self.dirty || self.last_max_density <= 0.0 {
            return cached;
        }
        let val = self.blend(
            self.area[pixel],
            self.pins[pixel],
            self.last_max_area,
            self.last_max_pins,
        );
        (val / self.last_max_density).min(1.0)
    }

    fn update(&mut self, cell: &Cell, left: i64, bottom: i64, add: bool) {
        if cell.fixed {
            return;
        }
        self.apply(cell, left, bottom, if add { 1.0 } else { -1.0 });
        self.dirty = true;
    }

    fn normalize(&mut self) {
        let max_area = self.area.iter().copied().fold(0.0, f64::max);
        let max_pins = self.pins.iter().copied().fold(0.0, f64::max);
        self.last_max_area = max_area;
        self.last_max_pins = max_pins;

        let mut max_density: f64 = 0.0;
        for i in 0..self.density.len() {
            let val = self.blend(self.area[i], self.pins[i], max_area, max_pins);
            self.density[i] = val;
            max_density = max_density.max(val);
        }
        if max_density > 0.0 {
            self.density.iter_mut().for_each(|d| *d /= max_density);
        }
        self.last_max_density = if max_density > 0.0 { max_density } else { 1.0 };
        self.dirty = false;
    }
}
