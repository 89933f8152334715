//! Interaction Engine - live editing of placed images
//!
//! Turns pointer events given in viewport space into Position Model updates.
//! Everything here is pure state manipulation: no I/O, nothing blocks.
//!
//! Per-rectangle lifecycle:
//! `Idle -> Selected -> (Dragging | Resizing) -> Selected -> Idle`.
//! Selection is exclusive and only the selected rectangle can enter a
//! gesture. The engine reports what happened as [`EngineEvent`]s; the
//! owning session decides what those mean for canvas panning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::geometry::{Handle, ImageSize, Point, Position};
use crate::viewport::Viewport;

/// On-screen handle radius, in viewport pixels, at any zoom.
pub const HANDLE_RADIUS: f64 = 6.0;
/// On-screen handle outline width, in viewport pixels, at any zoom.
pub const HANDLE_STROKE_WIDTH: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlacementId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedImage {
    pub id: PlacementId,
    pub source: PathBuf,
    pub native_size: ImageSize,
    pub position: Position,
}

impl PlacedImage {
    /// File name used as the placement's identity on the canvas.
    pub fn name(&self) -> Option<&str> {
        self.source.file_name().and_then(|n| n.to_str())
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.native_size.aspect_ratio().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectState {
    Idle,
    Selected,
    Dragging,
    Resizing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Selected(PlacementId),
    SelectionCleared,
    DragBegan(PlacementId),
    DragEnded(PlacementId),
    ResizeBegan(PlacementId, Handle),
    ResizeEnded(PlacementId),
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Handle(PlacementId, Handle),
    Body(PlacementId),
    Empty,
}

/// Render and hit-test geometry of one grip, in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleGeometry {
    pub handle: Handle,
    pub center: Point,
    pub radius: f64,
    pub stroke_width: f64,
}

impl HandleGeometry {
    pub fn contains(&self, point: Point) -> bool {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Grip geometry for `position` at `zoom`; sizes shrink as zoom grows so the
/// grips keep a constant size on screen.
pub fn derive_handle_geometry(position: &Position, zoom: f64) -> [HandleGeometry; 8] {
    let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
    Handle::ALL.map(|handle| HandleGeometry {
        handle,
        center: handle.location(position),
        radius: HANDLE_RADIUS / zoom,
        stroke_width: HANDLE_STROKE_WIDTH / zoom,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Drag { id: PlacementId, offset: Point },
    Resize { id: PlacementId, handle: Handle },
}

impl Gesture {
    fn id(&self) -> PlacementId {
        match *self {
            Gesture::Drag { id, .. } | Gesture::Resize { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionEngine {
    placements: Vec<PlacedImage>,
    next_id: u64,
    viewport: Viewport,
    selected: Option<PlacementId>,
    gesture: Option<Gesture>,
    events: Vec<EngineEvent>,
}

impl InteractionEngine {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            placements: vec![],
            next_id: 1,
            viewport,
            selected: None,
            gesture: None,
            events: vec![],
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.zoom()
    }

    /// Placements in stacking order, bottom first.
    pub fn placements(&self) -> &[PlacedImage] {
        &self.placements
    }

    pub fn placement(&self, id: PlacementId) -> Option<&PlacedImage> {
        self.placements.iter().find(|p| p.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<PlacementId> {
        self.placements
            .iter()
            .find(|p| p.name() == Some(name))
            .map(|p| p.id)
    }

    pub fn find_by_source(&self, source: &Path) -> Option<PlacementId> {
        self.placements
            .iter()
            .find(|p| p.source == source)
            .map(|p| p.id)
    }

    /// Add on top of the stack.
    pub fn insert(&mut self, source: PathBuf, native_size: ImageSize, position: Position) -> PlacementId {
        let id = PlacementId(self.next_id);
        self.next_id += 1;
        self.placements.push(PlacedImage {
            id,
            source,
            native_size,
            position,
        });
        id
    }

    /// Replace a placement's rectangle without touching its stacking index.
    pub fn relocate(&mut self, id: PlacementId, position: Position) -> bool {
        match self.placement_mut(id) {
            Some(p) => {
                p.position = position;
                true
            }
            None => false,
        }
    }

    /// Point a placement at a different file of the same name.
    pub fn rebind(&mut self, id: PlacementId, source: PathBuf, native_size: ImageSize) -> bool {
        match self.placement_mut(id) {
            Some(p) => {
                p.source = source;
                p.native_size = native_size;
                true
            }
            None => false,
        }
    }

    pub fn move_to(&mut self, id: PlacementId, x: f64, y: f64) -> bool {
        match self.placement_mut(id) {
            Some(p) => {
                p.position.move_to(x, y);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PlacementId) -> Option<PlacedImage> {
        let idx = self.placements.iter().position(|p| p.id == id)?;
        if self.gesture.map(|g| g.id()) == Some(id) {
            self.finish_gesture();
        }
        if self.selected == Some(id) {
            self.deselect_all();
        }
        Some(self.placements.remove(idx))
    }

    pub fn clear(&mut self) {
        self.finish_gesture();
        self.deselect_all();
        self.placements.clear();
    }

    pub fn selected(&self) -> Option<PlacementId> {
        self.selected
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn state_of(&self, id: PlacementId) -> RectState {
        match self.gesture {
            Some(Gesture::Drag { id: g, .. }) if g == id => RectState::Dragging,
            Some(Gesture::Resize { id: g, .. }) if g == id => RectState::Resizing,
            _ if self.selected == Some(id) => RectState::Selected,
            _ => RectState::Idle,
        }
    }

    /// Exclusive selection. Refused while a gesture is running on another
    /// rectangle.
    pub fn select(&mut self, id: PlacementId) -> bool {
        if self.placement(id).is_none() {
            return false;
        }
        if let Some(g) = self.gesture {
            return g.id() == id;
        }
        if self.selected != Some(id) {
            self.selected = Some(id);
            self.events.push(EngineEvent::Selected(id));
        }
        true
    }

    pub fn deselect_all(&mut self) {
        if self.gesture.is_some() {
            return;
        }
        if self.selected.take().is_some() {
            self.events.push(EngineEvent::SelectionCleared);
        }
    }

    /// Grips of the selected rectangle; `None` means every grip is hidden.
    pub fn handle_geometry(&self) -> Option<[HandleGeometry; 8]> {
        let placement = self.placement(self.selected?)?;
        Some(derive_handle_geometry(&placement.position, self.zoom()))
    }

    /// Grips of the selected rectangle win, then bodies from the top down.
    pub fn hit_test(&self, pointer: Point) -> PointerTarget {
        let canvas = self.viewport.to_canvas(pointer);
        if let (Some(id), Some(handles)) = (self.selected, self.handle_geometry()) {
            if let Some(h) = handles.iter().find(|h| h.contains(canvas)) {
                return PointerTarget::Handle(id, h.handle);
            }
        }
        self.placements
            .iter()
            .rev()
            .find(|p| p.position.contains(canvas))
            .map_or(PointerTarget::Empty, |p| PointerTarget::Body(p.id))
    }

    /// Pointer pressed: select what is under it and arm the gesture in one
    /// step, or clear the selection on empty canvas.
    pub fn pointer_down(&mut self, pointer: Point) -> PointerTarget {
        if self.gesture.is_some() {
            return PointerTarget::Empty;
        }
        let target = self.hit_test(pointer);
        match target {
            PointerTarget::Handle(id, handle) => {
                self.begin_resize(id, handle);
            }
            PointerTarget::Body(id) => {
                self.select(id);
                self.begin_drag(id, pointer);
            }
            PointerTarget::Empty => self.deselect_all(),
        }
        target
    }

    pub fn pointer_move(&mut self, pointer: Point) -> Option<Position> {
        match self.gesture? {
            Gesture::Drag { .. } => self.update_drag(pointer),
            Gesture::Resize { handle, .. } => self.update_resize(handle, pointer),
        }
    }

    pub fn pointer_up(&mut self) {
        match self.gesture {
            Some(Gesture::Drag { .. }) => self.end_drag(),
            Some(Gesture::Resize { .. }) => self.end_resize(),
            None => {}
        }
    }

    /// Record where inside the rectangle the pointer grabbed it.
    pub fn begin_drag(&mut self, id: PlacementId, pointer: Point) -> bool {
        if self.gesture.is_some() || self.selected != Some(id) {
            return false;
        }
        let Some(top_left) = self.placement(id).map(|p| p.position.top_left()) else {
            return false;
        };
        let canvas = self.viewport.to_canvas(pointer);
        let offset = Point::new(canvas.x - top_left.x, canvas.y - top_left.y);
        self.gesture = Some(Gesture::Drag { id, offset });
        self.events.push(EngineEvent::DragBegan(id));
        true
    }

    /// Absolute move to `pointer - offset`, so replayed samples converge.
    pub fn update_drag(&mut self, pointer: Point) -> Option<Position> {
        let Some(Gesture::Drag { id, offset }) = self.gesture else {
            return None;
        };
        let canvas = self.viewport.to_canvas(pointer);
        let placement = self.placement_mut(id)?;
        placement
            .position
            .move_to(canvas.x - offset.x, canvas.y - offset.y);
        Some(placement.position)
    }

    pub fn end_drag(&mut self) {
        if let Some(Gesture::Drag { id, .. }) = self.gesture.take() {
            self.events.push(EngineEvent::DragEnded(id));
        }
    }

    pub fn begin_resize(&mut self, id: PlacementId, handle: Handle) -> bool {
        if self.gesture.is_some() || self.selected != Some(id) || self.placement(id).is_none() {
            return false;
        }
        self.gesture = Some(Gesture::Resize { id, handle });
        self.events.push(EngineEvent::ResizeBegan(id, handle));
        true
    }

    pub fn update_resize(&mut self, handle: Handle, pointer: Point) -> Option<Position> {
        let Some(Gesture::Resize { id, handle: armed }) = self.gesture else {
            return None;
        };
        if armed != handle {
            return None;
        }
        let canvas = self.viewport.to_canvas(pointer);
        let placement = self.placement_mut(id)?;
        let ratio = placement.aspect_ratio();
        placement.position.resize(handle, canvas, ratio);
        Some(placement.position)
    }

    pub fn end_resize(&mut self) {
        if let Some(Gesture::Resize { id, .. }) = self.gesture.take() {
            self.events.push(EngineEvent::ResizeEnded(id));
        }
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn finish_gesture(&mut self) {
        match self.gesture {
            Some(Gesture::Drag { .. }) => self.end_drag(),
            Some(Gesture::Resize { .. }) => self.end_resize(),
            None => {}
        }
    }

    fn placement_mut(&mut self, id: PlacementId) -> Option<&mut PlacedImage> {
        self.placements.iter_mut().find(|p| p.id == id)
    }
}
