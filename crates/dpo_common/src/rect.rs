//! Axis-aligned rectangles in database units.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle with inclusive-exclusive semantics `[min, max)`
/// on both axes, in database units.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub xmin: i64,
    /// Bottom edge.
    pub ymin: i64,
    /// Right edge.
    pub xmax: i64,
    /// Top edge.
    pub ymax: i64,
}

impl Rect {
    /// Creates a rectangle from its four edges.
    pub fn new(xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Returns the horizontal extent.
    pub fn width(&self) -> i64 {
        self.xmax - self.xmin
    }

    /// Returns the vertical extent.
    pub fn height(&self) -> i64 {
        self.ymax - self.ymin
    }

    /// Returns `true` if the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    /// Returns the center point, rounded toward negative infinity.
    pub fn center(&self) -> (i64, i64) {
        (
            (self.xmin + self.xmax).div_euclid(2),
            (self.ymin + self.ymax).div_euclid(2),
        )
    }

    /// Returns `true` if the point lies within the closed rectangle.
    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Returns the overlapping area of two rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Returns `true` if this rectangle spans the whole vertical band `[ylo, yhi]`.
    pub fn covers_band(&self, ylo: i64, yhi: i64) -> bool {
        self.ymin <= ylo && self.ymax >= yhi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions() {
        let r = Rect::new(10, 20, 50, 80);
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 60);
        assert_eq!(r.center(), (30, 50));
        assert!(!r.is_empty());
    }

    #[test]
    fn intersection_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 60, 150, 160);
        assert_eq!(a.intersection(&b), Some(Rect::new(50, 60, 100, 100)));
    }

    #[test]
    fn intersection_touching_is_none() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(100, 0, 200, 100);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn band_coverage() {
        let r = Rect::new(0, 0, 10, 200);
        assert!(r.covers_band(0, 100));
        assert!(!r.covers_band(150, 250));
    }

    #[test]
    fn serde_roundtrip() {
        let r = Rect::new(-5, 0, 5, 10);
        let json = serde_json::to_string(&r).unwrap();
        let back: Rect = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
