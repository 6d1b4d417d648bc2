//! Screen-space geometry shared by the locator, capture, and calibration code.

use serde::{Deserialize, Serialize};

/// A point in screen coordinates (pixels, origin at the primary monitor's top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in screen coordinates.
///
/// `right` and `bottom` are exclusive, matching Win32 `RECT`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True if the rectangle has no area.
    pub fn is_degenerate(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    /// Returns the overlap of two rectangles, or `None` if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let clipped = Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if clipped.is_degenerate() {
            None
        } else {
            Some(clipped)
        }
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {}) [{}x{}]",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// A floating-point bounding box, used for calibrated icon areas after tolerance expansion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Area {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Area {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive containment check.
    pub fn contains(&self, point: Point) -> bool {
        let (x, y) = (point.x as f64, point.y as f64);
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grows the area by `fraction` of its own width/height on every side.
    pub fn expanded(&self, fraction: f64) -> Area {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        Area {
            min_x: self.min_x - dx,
            min_y: self.min_y - dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 200, 200);
        assert_eq!(a.intersect(&b), Some(Rect::new(50, 50, 100, 100)));

        let c = Rect::new(100, 0, 200, 100);
        assert_eq!(a.intersect(&c), None, "touching edges do not overlap");
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let r = Rect::new(10, 10, 20, 20);
        assert!(r.contains(Point::new(10, 10)));
        assert!(!r.contains(Point::new(20, 15)));
    }

    #[test]
    fn test_area_expanded() {
        let area = Area {
            min_x: 100.0,
            min_y: 100.0,
            max_x: 200.0,
            max_y: 150.0,
        };
        let grown = area.expanded(0.2);
        assert_eq!(grown.min_x, 80.0);
        assert_eq!(grown.max_y, 160.0);
        assert!(grown.contains(Point::new(85, 95)));
        assert!(!area.contains(Point::new(85, 95)));
    }
}
