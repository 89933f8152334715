//! PhotoBooth Core - Frame Compositor
//!
//! # The Contracts (Non-Negotiable)
//! 1. Positions Live in Frame Space
//! 2. Aspect Ratio Survives Every Resize
//! 3. One Selection, One Gesture
//! 4. Preconditions Before Side Effects
//! 5. Later Layers Win, the Frame Wins Last
//! 6. No Temporary Outlives Its Job

pub mod geometry;
pub mod viewport;
pub mod interaction;
pub mod session;
pub mod library;
pub mod layouts;
pub mod hashing;
pub mod watcher;
pub mod config;
pub mod backend;
pub mod tool;
pub mod magick;
pub mod native;
pub mod lut;
pub mod preflight;
pub mod pipeline;
pub mod worker;

pub use geometry::{Handle, ImageSize, PixelRect, Point, Position, Size, MIN_DIMENSION};
pub use viewport::Viewport;
pub use interaction::{EngineEvent, InteractionEngine, PlacedImage, PlacementId, PointerTarget, RectState};
pub use session::{CanvasSession, FrameAsset, SessionError, SessionOptions};
pub use library::ImageLibrary;
pub use layouts::{LayoutError, LayoutStore, TemplateLayout};
pub use watcher::{FolderWatcher, NewImage, WatchError, WatchRegistry, WatchState};
pub use config::{BackendKind, ConfigError, StudioConfig};
pub use backend::RasterBackend;
pub use magick::MagickBackend;
pub use native::NativeBackend;
pub use pipeline::{CompositionJob, CompositionOutput, Compositor, CompositorOptions, JobLayer, PipelineError, Stage};
pub use worker::{JobHandle, PipelineWorker};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
