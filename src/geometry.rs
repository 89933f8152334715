//! Position Model - canonical placement rectangles
//!
//! Every value lives in the coordinate space of the unscaled frame template.
//! This is the contract between the interaction engine and the compositor.

use serde::{Deserialize, Serialize};

/// A resize must leave a dimension strictly above this to be accepted.
pub const MIN_DIMENSION: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pixel dimensions of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// width / height, or `None` for a degenerate raster
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }
}

/// Integer placement handed to raster backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// One of the eight resize grips around a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::NorthWest,
        Handle::North,
        Handle::NorthEast,
        Handle::East,
        Handle::SouthEast,
        Handle::South,
        Handle::SouthWest,
        Handle::West,
    ];

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Handle::NorthEast | Handle::SouthEast | Handle::SouthWest | Handle::NorthWest
        )
    }

    fn moves_left(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::West | Handle::SouthWest)
    }

    fn moves_right(self) -> bool {
        matches!(self, Handle::NorthEast | Handle::East | Handle::SouthEast)
    }

    fn moves_top(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::North | Handle::NorthEast)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Handle::SouthWest | Handle::South | Handle::SouthEast)
    }

    /// Where this grip sits on the outline of `position`.
    pub fn location(self, position: &Position) -> Point {
        let x = if self.moves_left() {
            position.x
        } else if self.moves_right() {
            position.right()
        } else {
            position.x + position.width / 2.0
        };
        let y = if self.moves_top() {
            position.y
        } else if self.moves_bottom() {
            position.bottom()
        } else {
            position.y + position.height / 2.0
        };
        Point::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Like `new`, but refuses non-finite values and non-positive sizes.
    pub fn checked(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let candidate = Self::new(x, y, width, height);
        candidate.is_valid().then_some(candidate)
    }

    /// Rectangle of `width` centred on `center`, height taken from `aspect_ratio`.
    pub fn centered_at(center: Point, width: f64, aspect_ratio: f64) -> Self {
        let height = width / aspect_ratio;
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Inclusive bounds test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Resize by dragging `handle` to `pointer`, keeping `aspect_ratio`.
    ///
    /// The side or corner opposite the handle stays where it is. Edge grips
    /// derive the free dimension from the dragged one; corner grips project
    /// the candidate onto the ratio (too wide -> width from height, else
    /// height from width). An axis whose result is not above
    /// [`MIN_DIMENSION`] keeps its previous size and offset.
    pub fn resize(&mut self, handle: Handle, pointer: Point, aspect_ratio: f64) {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return;
        }

        let right = self.right();
        let bottom = self.bottom();
        let mut width = self.width;
        let mut height = self.height;

        if handle.moves_right() {
            width = pointer.x - self.x;
        }
        if handle.moves_left() {
            width = right - pointer.x;
        }
        if handle.moves_bottom() {
            height = pointer.y - self.y;
        }
        if handle.moves_top() {
            height = bottom - pointer.y;
        }

        match handle {
            Handle::North | Handle::South => width = height * aspect_ratio,
            Handle::East | Handle::West => height = width / aspect_ratio,
            _ => {
                if width / height > aspect_ratio {
                    width = height * aspect_ratio;
                } else {
                    height = width / aspect_ratio;
                }
            }
        }

        if width.is_finite() && width > MIN_DIMENSION {
            self.width = width;
            if handle.moves_left() {
                self.x = right - width;
            }
        }
        if height.is_finite() && height > MIN_DIMENSION {
            self.height = height;
            if handle.moves_top() {
                self.y = bottom - height;
            }
        }
    }

    /// Nearest-integer placement; sizes never round below one pixel.
    pub fn pixel_rect(&self) -> PixelRect {
        PixelRect {
            x: self.x.round() as i64,
            y: self.y.round() as i64,
            width: self.width.round().max(1.0) as u32,
            height: self.height.round().max(1.0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_east_handle_derives_height() {
        let mut pos = Position::new(10.0, 10.0, 100.0, 50.0);
        pos.resize(Handle::East, Point::new(210.0, 999.0), 2.0);
        assert!(close(pos.width, 200.0));
        assert!(close(pos.height, 100.0));
        assert!(close(pos.x, 10.0));
        assert!(close(pos.y, 10.0));
    }

    #[test]
    fn test_north_handle_keeps_bottom_edge() {
        let mut pos = Position::new(0.0, 100.0, 100.0, 100.0);
        pos.resize(Handle::North, Point::new(-500.0, 50.0), 1.5);
        assert!(close(pos.height, 150.0));
        assert!(close(pos.width, 225.0));
        assert!(close(pos.bottom(), 200.0));
        assert!(close(pos.x, 0.0));
    }

    #[test]
    fn test_corner_too_wide_uses_height() {
        let mut pos = Position::new(0.0, 0.0, 100.0, 100.0);
        pos.resize(Handle::SouthEast, Point::new(400.0, 150.0), 1.0);
        assert!(close(pos.width, 150.0));
        assert!(close(pos.height, 150.0));
    }

    #[test]
    fn test_corner_too_tall_uses_width() {
        let mut pos = Position::new(0.0, 0.0, 100.0, 100.0);
        pos.resize(Handle::SouthEast, Point::new(120.0, 400.0), 1.0);
        assert!(close(pos.width, 120.0));
        assert!(close(pos.height, 120.0));
    }

    #[test]
    fn test_north_west_keeps_opposite_corner() {
        let mut pos = Position::new(100.0, 100.0, 200.0, 100.0);
        pos.resize(Handle::NorthWest, Point::new(0.0, 80.0), 2.0);
        assert!(close(pos.right(), 300.0));
        assert!(close(pos.bottom(), 200.0));
        assert!(close(pos.aspect_ratio(), 2.0));
    }

    #[test]
    fn test_undersized_axis_is_rejected() {
        let mut pos = Position::new(50.0, 50.0, 100.0, 100.0);
        pos.resize(Handle::West, Point::new(140.0, 0.0), 1.0);
        assert_eq!(pos, Position::new(50.0, 50.0, 100.0, 100.0));
    }

    #[test]
    fn test_pixel_rect_rounds() {
        let pos = Position::new(-49.6, 0.4, 199.5, 0.2);
        let rect = pos.pixel_rect();
        assert_eq!(rect, PixelRect { x: -50, y: 0, width: 200, height: 1 });
    }

    #[test]
    fn test_handle_locations() {
        let pos = Position::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(Handle::SouthEast.location(&pos), Point::new(100.0, 50.0));
        assert_eq!(Handle::North.location(&pos), Point::new(50.0, 0.0));
        assert_eq!(Handle::West.location(&pos), Point::new(0.0, 25.0));
    }
}
