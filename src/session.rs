//! Canvas Session - one editing session over a loaded frame
//!
//! Owns the interaction engine, the empty slots from a loaded layout and the
//! canvas panning flag. Panning is suspended for exactly as long as a drag
//! or resize gesture is running.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::{ImageSize, Point, Position, Size};
use crate::interaction::{EngineEvent, InteractionEngine, PlacementId, PointerTarget};
use crate::layouts::TemplateLayout;
use crate::pipeline::{CompositionJob, JobLayer};
use crate::viewport::{Viewport, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No frame loaded")]
    NoFrame,

    #[error("Nothing placed on the canvas")]
    NothingPlaced,

    #[error("Cannot read image {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image has no usable size: {}", .0.display())]
    InvalidImageSize(PathBuf),

    #[error("Unknown placement {0:?}")]
    UnknownPlacement(PlacementId),

    #[error("Layout name must not be empty")]
    EmptyLayoutName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl FrameAsset {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }

    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let (width, height) = image::image_dimensions(path).map_err(|source| SessionError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if width == 0 || height == 0 {
            return Err(SessionError::InvalidImageSize(path.to_path_buf()));
        }
        Ok(Self::new(path, width, height))
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Width of a freely dropped image as a fraction of the frame width.
    pub default_width_fraction: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub initial_zoom: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_width_fraction: 0.25,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            initial_zoom: 0.5,
        }
    }
}

pub struct CanvasSession {
    frame: Option<FrameAsset>,
    engine: InteractionEngine,
    placeholders: Vec<Position>,
    panning_enabled: bool,
    options: SessionOptions,
    events: Vec<EngineEvent>,
}

impl CanvasSession {
    pub fn new(viewport_size: Size, options: SessionOptions) -> Self {
        let mut viewport = Viewport::new(viewport_size, Size::default())
            .with_zoom_limits(options.min_zoom, options.max_zoom);
        viewport.set_zoom(options.initial_zoom);
        Self {
            frame: None,
            engine: InteractionEngine::new(viewport),
            placeholders: vec![],
            panning_enabled: true,
            options,
            events: vec![],
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn frame(&self) -> Option<&FrameAsset> {
        self.frame.as_ref()
    }

    pub fn load_frame(&mut self, path: &Path) -> Result<&FrameAsset, SessionError> {
        let frame = FrameAsset::open(path)?;
        Ok(self.set_frame(frame))
    }

    pub fn set_frame(&mut self, frame: FrameAsset) -> &FrameAsset {
        log::info!("Frame {} ({}x{})", frame.path.display(), frame.width, frame.height);
        let viewport = self.engine.viewport_mut();
        viewport.set_canvas_size(frame.size());
        viewport.center();
        self.frame.insert(frame)
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    pub fn viewport(&self) -> &Viewport {
        self.engine.viewport()
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.engine.viewport_mut().set_viewport_size(size);
    }

    pub fn placeholders(&self) -> &[Position] {
        &self.placeholders
    }

    pub fn is_panning_enabled(&self) -> bool {
        self.panning_enabled
    }

    /// Everything the engine reported since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.absorb_events();
        std::mem::take(&mut self.events)
    }

    // --- Drop and placement ---

    /// Drop `source` at a point in viewport space.
    pub fn drop_image(&mut self, source: &Path, at: Point) -> Result<PlacementId, SessionError> {
        let (width, height) = image::image_dimensions(source).map_err(|e| SessionError::Unreadable {
            path: source.to_path_buf(),
            source: e,
        })?;
        let canvas = self.engine.viewport().to_canvas(at);
        self.drop_image_at(source.to_path_buf(), ImageSize::new(width, height), canvas)
    }

    /// Drop at a point already in canvas space. An empty slot under the
    /// point wins over free placement and is used up. A file already on the
    /// canvas is moved instead of added twice.
    pub fn drop_image_at(
        &mut self,
        source: PathBuf,
        native_size: ImageSize,
        at: Point,
    ) -> Result<PlacementId, SessionError> {
        let ratio = native_size
            .aspect_ratio()
            .ok_or_else(|| SessionError::InvalidImageSize(source.clone()))?;
        let frame_width = self.frame.as_ref().ok_or(SessionError::NoFrame)?.width as f64;

        let existing = source
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| self.engine.find_by_name(name));

        let position = match self.placeholders.iter().position(|slot| slot.contains(at)) {
            Some(slot) => self.placeholders.remove(slot),
            None => {
                let width = existing
                    .and_then(|id| self.engine.placement(id))
                    .map_or(frame_width * self.options.default_width_fraction, |p| {
                        p.position.width
                    });
                Position::centered_at(at, width, ratio)
            }
        };

        let id = match existing {
            Some(id) => {
                self.engine.rebind(id, source, native_size);
                self.engine.relocate(id, position);
                id
            }
            None => self.engine.insert(source, native_size, position),
        };
        log::debug!("placed {id:?} at {position:?}");
        self.engine.select(id);
        self.absorb_events();
        Ok(id)
    }

    pub fn remove_placement(&mut self, id: PlacementId) -> Result<(), SessionError> {
        self.engine
            .remove(id)
            .ok_or(SessionError::UnknownPlacement(id))?;
        self.absorb_events();
        Ok(())
    }

    /// Absolute move from numeric controls.
    pub fn set_position(&mut self, id: PlacementId, x: f64, y: f64) -> Result<Position, SessionError> {
        if !(x.is_finite() && y.is_finite()) || !self.engine.move_to(id, x, y) {
            return Err(SessionError::UnknownPlacement(id));
        }
        self.engine
            .placement(id)
            .map(|p| p.position)
            .ok_or(SessionError::UnknownPlacement(id))
    }

    /// Remove every placement and every empty slot.
    pub fn clear(&mut self) {
        self.engine.clear();
        self.placeholders.clear();
        self.absorb_events();
    }

    // --- Pointer and selection ---

    pub fn select(&mut self, id: PlacementId) -> bool {
        let selected = self.engine.select(id);
        self.absorb_events();
        selected
    }

    pub fn deselect_all(&mut self) {
        self.engine.deselect_all();
        self.absorb_events();
    }

    pub fn pointer_down(&mut self, at: Point) -> PointerTarget {
        let target = self.engine.pointer_down(at);
        self.absorb_events();
        target
    }

    pub fn pointer_move(&mut self, at: Point) -> Option<Position> {
        let moved = self.engine.pointer_move(at);
        self.absorb_events();
        moved
    }

    pub fn pointer_up(&mut self) {
        self.engine.pointer_up();
        self.absorb_events();
    }

    // --- Viewport ---

    /// Returns `false` when panning is suspended by a running gesture.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        if !self.panning_enabled {
            return false;
        }
        self.engine.viewport_mut().pan_by(dx, dy);
        true
    }

    pub fn wheel_zoom(&mut self, delta_y: f64) {
        self.engine.viewport_mut().wheel_zoom(delta_y);
    }

    pub fn zoom_in(&mut self) {
        self.engine.viewport_mut().zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.engine.viewport_mut().zoom_out();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.engine.viewport_mut().set_zoom(zoom);
    }

    // --- Layouts and jobs ---

    pub fn current_layout(&self, name: &str) -> Result<TemplateLayout, SessionError> {
        if name.is_empty() {
            return Err(SessionError::EmptyLayoutName);
        }
        let placements = self.engine.placements();
        if placements.is_empty() {
            return Err(SessionError::NothingPlaced);
        }
        Ok(TemplateLayout::new(
            name,
            placements.iter().map(|p| p.position).collect(),
        ))
    }

    /// Clear the canvas and install the layout's rectangles as empty slots.
    pub fn apply_layout(&mut self, layout: &TemplateLayout) {
        self.clear();
        self.placeholders = layout
            .positions
            .iter()
            .copied()
            .filter(Position::is_valid)
            .collect();
        log::info!(
            "Applied layout '{}' ({} slot(s))",
            layout.name,
            self.placeholders.len()
        );
    }

    /// Copy of the current state for the compositor, bottom layer first.
    pub fn snapshot_job(
        &self,
        preset: Option<PathBuf>,
        export_dir: impl Into<PathBuf>,
    ) -> Result<CompositionJob, SessionError> {
        let frame = self.frame.as_ref().ok_or(SessionError::NoFrame)?;
        let placements = self.engine.placements();
        if placements.is_empty() {
            return Err(SessionError::NothingPlaced);
        }
        Ok(CompositionJob {
            layers: placements
                .iter()
                .map(|p| JobLayer::new(p.source.clone(), p.position))
                .collect(),
            preset,
            frame: frame.path.clone(),
            frame_width: frame.width,
            frame_height: frame.height,
            export_dir: export_dir.into(),
        })
    }

    fn absorb_events(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::DragBegan(_) | EngineEvent::ResizeBegan(..) => {
                    self.panning_enabled = false
                }
                EngineEvent::DragEnded(_) | EngineEvent::ResizeEnded(_) => {
                    self.panning_enabled = true
                }
                EngineEvent::Selected(_) | EngineEvent::SelectionCleared => {}
            }
            self.events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CanvasSession {
        let mut s = CanvasSession::new(Size::new(800.0, 600.0), SessionOptions::default());
        s.set_frame(FrameAsset::new("frame.png", 800, 600));
        s
    }

    #[test]
    fn test_drop_without_frame_fails() {
        let mut s = CanvasSession::new(Size::new(800.0, 600.0), SessionOptions::default());
        let err = s
            .drop_image_at(PathBuf::from("a.png"), ImageSize::new(400, 200), Point::new(1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, SessionError::NoFrame));
    }

    #[test]
    fn test_drop_selects_new_image() {
        let mut s = session();
        let a = s
            .drop_image_at(PathBuf::from("a.png"), ImageSize::new(400, 200), Point::new(100.0, 100.0))
            .unwrap();
        assert_eq!(s.engine().selected(), Some(a));
        assert_eq!(s.drain_events(), vec![EngineEvent::Selected(a)]);
    }

    #[test]
    fn test_redrop_from_other_dir_rebinds_source() {
        let mut s = session();
        let a = s
            .drop_image_at(PathBuf::from("one/a.png"), ImageSize::new(400, 200), Point::new(100.0, 100.0))
            .unwrap();
        let again = s
            .drop_image_at(PathBuf::from("two/a.png"), ImageSize::new(300, 300), Point::new(400.0, 400.0))
            .unwrap();
        assert_eq!(again, a);
        assert_eq!(s.engine().placements().len(), 1);
        let placed = s.engine().placement(a).unwrap();
        assert_eq!(placed.source, PathBuf::from("two/a.png"));
        assert_eq!(placed.native_size, ImageSize::new(300, 300));
        assert_eq!(placed.position.width, placed.position.height);
    }

    #[test]
    fn test_redrop_keeps_width_and_stack_index() {
        let mut s = session();
        let a = s
            .drop_image_at(PathBuf::from("a.png"), ImageSize::new(400, 200), Point::new(100.0, 100.0))
            .unwrap();
        s.drop_image_at(PathBuf::from("b.png"), ImageSize::new(200, 200), Point::new(300.0, 300.0))
            .unwrap();
        let again = s
            .drop_image_at(PathBuf::from("a.png"), ImageSize::new(400, 200), Point::new(400.0, 400.0))
            .unwrap();
        assert_eq!(again, a);
        let placements = s.engine().placements();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].id, a);
        assert_eq!(placements[0].position, Position::new(300.0, 350.0, 200.0, 100.0));
    }

    #[test]
    fn test_current_layout_requires_placements() {
        let s = session();
        assert!(matches!(s.current_layout("x"), Err(SessionError::NothingPlaced)));
        assert!(matches!(s.current_layout(""), Err(SessionError::EmptyLayoutName)));
    }

    #[test]
    fn test_set_position_unknown_placement() {
        let mut s = session();
        assert!(s.set_position(PlacementId(99), 0.0, 0.0).is_err());
    }
}
