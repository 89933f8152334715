//! Viewport transform - zoom and scroll around the canvas
//!
//! Coordinate spaces, outer to inner: viewport pixels -> zoom/pan -> canvas
//! (frame-template pixels). The canvas is scaled uniformly by `zoom`; when
//! the scaled canvas overflows the viewport the scroll fractions pick the
//! visible window, otherwise the canvas is centred.

use crate::geometry::{Point, Size};

pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
pub const DEFAULT_MAX_ZOOM: f64 = 4.0;
pub const WHEEL_ZOOM_FACTOR: f64 = 1.1;
pub const BUTTON_ZOOM_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    viewport: Size,
    canvas: Size,
    zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
    h_scroll: f64,
    v_scroll: f64,
}

impl Viewport {
    pub fn new(viewport: Size, canvas: Size) -> Self {
        Self {
            viewport,
            canvas,
            zoom: 1.0,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            h_scroll: 0.5,
            v_scroll: 0.5,
        }
    }

    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.max(min_zoom);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn zoom_limits(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    /// Horizontal and vertical scroll fractions, each in `0.0..=1.0`.
    pub fn scroll(&self) -> (f64, f64) {
        (self.h_scroll, self.v_scroll)
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    pub fn set_canvas_size(&mut self, canvas: Size) {
        self.canvas = canvas;
    }

    pub fn set_viewport_size(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Clamped to the zoom limits; scroll fractions are kept as they were.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.set_zoom(self.zoom * factor);
    }

    /// Mouse-wheel zoom: one notch scales by [`WHEEL_ZOOM_FACTOR`].
    pub fn wheel_zoom(&mut self, delta_y: f64) {
        if delta_y > 0.0 {
            self.zoom_by(WHEEL_ZOOM_FACTOR);
        } else if delta_y < 0.0 {
            self.zoom_by(1.0 / WHEEL_ZOOM_FACTOR);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + BUTTON_ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - BUTTON_ZOOM_STEP);
    }

    pub fn set_scroll(&mut self, h: f64, v: f64) {
        if h.is_finite() {
            self.h_scroll = h.clamp(0.0, 1.0);
        }
        if v.is_finite() {
            self.v_scroll = v.clamp(0.0, 1.0);
        }
    }

    pub fn center(&mut self) {
        self.set_scroll(0.5, 0.5);
    }

    /// Grab-and-drag panning by a pointer delta in viewport pixels.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (overflow_x, overflow_y) = self.overflow();
        let mut h = self.h_scroll;
        let mut v = self.v_scroll;
        if overflow_x > 0.0 {
            h -= dx / overflow_x;
        }
        if overflow_y > 0.0 {
            v -= dy / overflow_y;
        }
        self.set_scroll(h, v);
    }

    /// Viewport coordinates of canvas point (0, 0).
    pub fn origin(&self) -> Point {
        let (overflow_x, overflow_y) = self.overflow();
        Point::new(
            axis_origin(overflow_x, self.h_scroll),
            axis_origin(overflow_y, self.v_scroll),
        )
    }

    pub fn to_canvas(&self, point: Point) -> Point {
        let origin = self.origin();
        Point::new(
            (point.x - origin.x) / self.zoom,
            (point.y - origin.y) / self.zoom,
        )
    }

    pub fn to_viewport(&self, point: Point) -> Point {
        let origin = self.origin();
        Point::new(
            point.x * self.zoom + origin.x,
            point.y * self.zoom + origin.y,
        )
    }

    fn overflow(&self) -> (f64, f64) {
        (
            self.canvas.width * self.zoom - self.viewport.width,
            self.canvas.height * self.zoom - self.viewport.height,
        )
    }
}

fn axis_origin(overflow: f64, scroll: f64) -> f64 {
    if overflow > 0.0 {
        -scroll * overflow
    } else {
        -overflow / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_small_canvas_is_centered() {
        let mut vp = Viewport::new(Size::new(1000.0, 800.0), Size::new(800.0, 600.0));
        vp.set_zoom(0.5);
        // 400x300 centred in 1000x800
        assert!(close(vp.origin(), Point::new(300.0, 250.0)));
        assert!(close(vp.to_canvas(Point::new(300.0, 250.0)), Point::new(0.0, 0.0)));
        assert!(close(vp.to_canvas(Point::new(700.0, 550.0)), Point::new(800.0, 600.0)));
    }

    #[test]
    fn test_overflowing_canvas_follows_scroll() {
        let mut vp = Viewport::new(Size::new(400.0, 300.0), Size::new(800.0, 600.0));
        vp.set_zoom(1.0);
        vp.set_scroll(0.0, 1.0);
        assert!(close(vp.origin(), Point::new(0.0, -300.0)));
        assert!(close(vp.to_canvas(Point::new(10.0, 10.0)), Point::new(10.0, 310.0)));
    }

    #[test]
    fn test_round_trip() {
        let mut vp = Viewport::new(Size::new(640.0, 480.0), Size::new(1800.0, 1200.0));
        vp.set_zoom(1.7);
        vp.set_scroll(0.3, 0.8);
        let p = Point::new(123.0, 456.0);
        assert!(close(vp.to_canvas(vp.to_viewport(p)), p));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut vp = Viewport::new(Size::new(100.0, 100.0), Size::new(100.0, 100.0));
        vp.set_zoom(100.0);
        assert_eq!(vp.zoom(), DEFAULT_MAX_ZOOM);
        vp.set_zoom(0.0);
        assert_eq!(vp.zoom(), DEFAULT_MIN_ZOOM);
    }

    #[test]
    fn test_pan_moves_content_with_pointer() {
        let mut vp = Viewport::new(Size::new(400.0, 300.0), Size::new(800.0, 600.0));
        vp.set_scroll(0.5, 0.5);
        vp.pan_by(40.0, 0.0);
        let (h, v) = vp.scroll();
        assert!((h - 0.4).abs() < 1e-9);
        assert!((v - 0.5).abs() < 1e-9);
    }
}
