//! Raster backends - the seam between the pipeline and pixel work
//!
//! The pipeline decides *what* happens and in which order; a backend only
//! knows how to carry out one stage at a time.

use std::path::{Path, PathBuf};

use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    /// Hald CLUT image (`.png`).
    HaldClut,
    /// Adobe/Resolve `.cube` table.
    Cube,
}

impl PresetKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::HaldClut),
            "cube" => Some(Self::Cube),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub path: PathBuf,
    pub kind: PresetKind,
}

impl Preset {
    pub fn from_path(path: &Path) -> Option<Self> {
        PresetKind::from_path(path).map(|kind| Self {
            path: path.to_path_buf(),
            kind,
        })
    }
}

/// Stage 1 for a single image: fill-resize, strip, optional colour grade.
#[derive(Debug, Clone)]
pub struct PreprocessStep {
    pub index: usize,
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub preset: Option<Preset>,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CompositeLayer {
    pub path: PathBuf,
    pub x: i64,
    pub y: i64,
}

/// Stages 2-4 plus the write: transparent base, layers in order, frame on top.
#[derive(Debug, Clone)]
pub struct CompositePlan {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<CompositeLayer>,
    pub frame: PathBuf,
    pub output: PathBuf,
}

pub trait RasterBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    fn preprocess(&self, step: &PreprocessStep) -> Result<(), PipelineError>;

    fn compose(&self, plan: &CompositePlan) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_kind_by_extension() {
        assert_eq!(PresetKind::from_path(Path::new("warm.PNG")), Some(PresetKind::HaldClut));
        assert_eq!(PresetKind::from_path(Path::new("film.cube")), Some(PresetKind::Cube));
        assert_eq!(PresetKind::from_path(Path::new("film.3dl")), None);
        assert_eq!(PresetKind::from_path(Path::new("noext")), None);
    }
}
