//! Studio settings - one JSON file, every field optional

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::backend::RasterBackend;
use crate::magick::{MagickBackend, DEFAULT_PROGRAM};
use crate::native::NativeBackend;
use crate::pipeline::{Compositor, CompositorOptions};
use crate::session::SessionOptions;
use crate::viewport::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};

pub const LAYOUTS_DIR_NAME: &str = "PhotoBoothConfigs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Magick,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudioConfig {
    pub import_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub frame: Option<PathBuf>,
    pub preset: Option<PathBuf>,
    pub layouts_dir: PathBuf,
    pub backend: BackendKind,
    pub tool_program: String,
    pub default_width_fraction: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub initial_zoom: f64,
    pub parallel_preprocess: bool,
    pub temp_root: Option<PathBuf>,
    pub worker_threads: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            import_dir: None,
            export_dir: None,
            frame: None,
            preset: None,
            layouts_dir: default_layouts_dir(),
            backend: BackendKind::default(),
            tool_program: DEFAULT_PROGRAM.to_string(),
            default_width_fraction: 0.25,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            initial_zoom: 0.5,
            parallel_preprocess: true,
            temp_root: None,
            worker_threads: 2,
        }
    }
}

/// `~/PhotoBoothConfigs`, or `./PhotoBoothConfigs` without a home directory.
pub fn default_layouts_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LAYOUTS_DIR_NAME)
}

impl StudioConfig {
    /// Defaults when `path` does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_width_fraction > 0.0 && self.default_width_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "defaultWidthFraction must be in (0, 1], got {}",
                self.default_width_fraction
            )));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(ConfigError::Invalid(format!(
                "zoom limits must satisfy 0 < minZoom <= maxZoom, got {} / {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.tool_program.is_empty() {
            return Err(ConfigError::Invalid("toolProgram must not be empty".into()));
        }
        Ok(())
    }

    pub fn backend(&self) -> Arc<dyn RasterBackend> {
        match self.backend {
            BackendKind::Magick => Arc::new(MagickBackend::with_program(&self.tool_program)),
            BackendKind::Native => Arc::new(NativeBackend::new()),
        }
    }

    pub fn compositor(&self) -> Compositor {
        Compositor::with_options(
            self.backend(),
            CompositorOptions {
                temp_root: self.temp_root.clone(),
                parallel_preprocess: self.parallel_preprocess,
            },
        )
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            default_width_fraction: self.default_width_fraction,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            initial_zoom: self.initial_zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StudioConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.backend, BackendKind::Magick);
        assert_eq!(config.tool_program, "magick");
        assert_eq!(config.default_width_fraction, 0.25);
        assert!(config.layouts_dir.ends_with(LAYOUTS_DIR_NAME));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        std::fs::write(&path, r#"{"backend": "native", "workerThreads": 4}"#).unwrap();
        let config = StudioConfig::load(&path).unwrap();
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.initial_zoom, 0.5);
        assert_eq!(config.backend().name(), "native");
    }

    #[test]
    fn test_malformed_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(StudioConfig::load(&path), Err(ConfigError::Parse { .. })));
        std::fs::write(&path, r#"{"defaultWidthFraction": 0}"#).unwrap();
        assert!(matches!(StudioConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
