//! Compositing Pipeline - Single Entry Point
//!
//! CRITICAL: `Compositor::run` checks every precondition before touching the
//! filesystem, and every temporary it creates is gone before it returns.
//!
//! Stages, strictly in order:
//! 1. preprocess each layer into the job's scratch directory
//! 2-4. transparent base, layers stacked by index, frame on top
//! 5. write `output_<millis>.png` and verify it is non-empty
//! 6. drop the scratch directory (success or failure)

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{CompositeLayer, CompositePlan, Preset, PreprocessStep, RasterBackend};
use crate::geometry::Position;
use crate::preflight::Preflight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess { index: usize },
    Compose,
    Output,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preprocess { index } => write!(f, "preprocess #{index}"),
            Stage::Compose => f.write_str("compose"),
            Stage::Output => f.write_str("output"),
            Stage::Cleanup => f.write_str("cleanup"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Raster tool not available: {0}")]
    ToolUnavailable(String),

    #[error("Frame file not found: {}", .0.display())]
    FrameNotFound(PathBuf),

    #[error("Image file not found: {}", .path.display())]
    SourceNotFound { index: usize, path: PathBuf },

    #[error("Preset file not found: {}", .0.display())]
    PresetNotFound(PathBuf),

    #[error("Unsupported preset format (expected .png or .cube): {}", .0.display())]
    UnsupportedPreset(PathBuf),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Step [{stage}] failed ({}):\n{output}", describe_exit(.code))]
    StageFailed {
        stage: Stage,
        code: Option<i32>,
        output: String,
    },

    #[error("Final output file was not created or is empty: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker error: {0}")]
    Worker(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

impl PipelineError {
    pub(crate) fn resource(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            context: context.into(),
            source,
        }
    }

    /// Failure raised inside a stage by something other than an exit code.
    pub(crate) fn stage(stage: Stage, message: impl fmt::Display) -> Self {
        Self::StageFailed {
            stage,
            code: None,
            output: message.to_string(),
        }
    }

    /// `true` for errors raised before any work started.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ToolUnavailable(_)
                | Self::FrameNotFound(_)
                | Self::SourceNotFound { .. }
                | Self::PresetNotFound(_)
                | Self::UnsupportedPreset(_)
                | Self::InvalidJob(_)
        )
    }
}

/// One photo and where it goes. A `None` source is an unfilled slot and is
/// skipped without disturbing the order of the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLayer {
    pub source: Option<PathBuf>,
    pub position: Position,
}

impl JobLayer {
    pub fn new(source: impl Into<PathBuf>, position: Position) -> Self {
        Self {
            source: Some(source.into()),
            position,
        }
    }
}

/// Immutable snapshot handed to the pipeline; `layers[i]` stacks above
/// `layers[i - 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionJob {
    pub layers: Vec<JobLayer>,
    #[serde(default)]
    pub preset: Option<PathBuf>,
    pub frame: PathBuf,
    #[serde(default)]
    pub frame_width: u32,
    #[serde(default)]
    pub frame_height: u32,
    pub export_dir: PathBuf,
}

impl CompositionJob {
    /// Fill in zero frame dimensions from the frame file itself.
    pub fn with_frame_dimensions(mut self) -> Result<Self, PipelineError> {
        if self.frame_width == 0 || self.frame_height == 0 {
            let (w, h) = image::image_dimensions(&self.frame).map_err(|e| {
                PipelineError::InvalidJob(format!(
                    "cannot read frame dimensions from {}: {e}",
                    self.frame.display()
                ))
            })?;
            self.frame_width = w;
            self.frame_height = h;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionOutput {
    pub job_id: Uuid,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub bytes: u64,
    pub layers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CompositorOptions {
    /// Where per-job scratch directories go; system temp dir when `None`.
    pub temp_root: Option<PathBuf>,
    pub parallel_preprocess: bool,
}

/// The compositing pipeline - single entry point for producing output files
pub struct Compositor {
    backend: Arc<dyn RasterBackend>,
    preflight: Preflight,
    options: CompositorOptions,
}

impl Compositor {
    pub fn new(backend: Arc<dyn RasterBackend>) -> Self {
        Self::with_options(backend, CompositorOptions::default())
    }

    pub fn with_options(backend: Arc<dyn RasterBackend>, options: CompositorOptions) -> Self {
        Self {
            backend,
            preflight: Preflight::new(),
            options,
        }
    }

    pub fn backend(&self) -> &dyn RasterBackend {
        self.backend.as_ref()
    }

    pub fn options(&self) -> &CompositorOptions {
        &self.options
    }

    /// Check preconditions without doing any work.
    pub fn check(&self, job: &CompositionJob) -> Result<(), PipelineError> {
        self.preflight.check(job, self.backend.as_ref())
    }

    /// Run all six stages for `job`.
    pub fn run(&self, job: &CompositionJob) -> Result<CompositionOutput, PipelineError> {
        self.check(job)?;

        let job_id = Uuid::new_v4();
        log::info!(
            "Job {job_id}: {} layer(s) onto {} ({}x{}) with {}",
            job.layers.len(),
            job.frame.display(),
            job.frame_width,
            job.frame_height,
            self.backend.name()
        );

        let temp_root = self
            .options
            .temp_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let scratch = tempfile::Builder::new()
            .prefix(&format!("photobooth-{job_id}-"))
            .tempdir_in(&temp_root)
            .map_err(|e| {
                PipelineError::resource(
                    format!("cannot create scratch directory in {}", temp_root.display()),
                    e,
                )
            })?;

        let result = self.run_stages(job_id, job, scratch.path());

        // stage 6
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!(
                "Job {job_id}: [{}] could not remove {}: {e}",
                Stage::Cleanup,
                scratch_path.display()
            );
        }

        match &result {
            Ok(out) => log::info!("Job {job_id}: wrote {} ({} bytes)", out.path.display(), out.bytes),
            Err(e) => log::error!("Job {job_id} failed: {e}"),
        }
        result
    }

    fn run_stages(
        &self,
        job_id: Uuid,
        job: &CompositionJob,
        scratch: &Path,
    ) -> Result<CompositionOutput, PipelineError> {
        let preset = job.preset.as_deref().and_then(Preset::from_path);

        let steps: Vec<PreprocessStep> = job
            .layers
            .iter()
            .enumerate()
            .filter_map(|(index, layer)| {
                let source = layer.source.clone()?;
                let rect = layer.position.pixel_rect();
                Some(PreprocessStep {
                    index,
                    source,
                    width: rect.width,
                    height: rect.height,
                    preset: preset.clone(),
                    output: scratch.join(format!("layer_{index:03}.png")),
                })
            })
            .collect();

        // stage 1
        if self.options.parallel_preprocess {
            steps
                .par_iter()
                .map(|step| self.preprocess_one(step))
                .collect::<Result<Vec<()>, PipelineError>>()?;
        } else {
            for step in &steps {
                self.preprocess_one(step)?;
            }
        }

        // stages 2-4, in placement order regardless of stage 1 completion order
        let layers: Vec<CompositeLayer> = steps
            .iter()
            .map(|step| {
                let rect = job.layers[step.index].position.pixel_rect();
                CompositeLayer {
                    path: step.output.clone(),
                    x: rect.x,
                    y: rect.y,
                }
            })
            .collect();

        // stage 5
        let created_at = Utc::now();
        let output = reserve_output(&job.export_dir, created_at.timestamp_millis())?;
        let plan = CompositePlan {
            width: job.frame_width,
            height: job.frame_height,
            layers,
            frame: job.frame.clone(),
            output: output.clone(),
        };

        let written = self
            .backend
            .compose(&plan)
            .and_then(|()| verify_output(&output));
        match written {
            Ok(bytes) => Ok(CompositionOutput {
                job_id,
                path: output,
                created_at,
                bytes,
                layers: steps.len(),
            }),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&output) {
                    if rm.kind() != ErrorKind::NotFound {
                        log::warn!("Job {job_id}: could not remove {}: {rm}", output.display());
                    }
                }
                Err(e)
            }
        }
    }

    fn preprocess_one(&self, step: &PreprocessStep) -> Result<(), PipelineError> {
        self.backend.preprocess(step)?;
        match fs::metadata(&step.output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(PipelineError::stage(
                Stage::Preprocess { index: step.index },
                format!("no output produced for {}", step.source.display()),
            )),
        }
    }
}

/// Claim `output_<millis>.png` in `dir`, moving forward a millisecond at a
/// time past names that already exist.
fn reserve_output(dir: &Path, millis: i64) -> Result<PathBuf, PipelineError> {
    let mut stamp = millis;
    loop {
        let candidate = dir.join(format!("output_{stamp}.png"));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
            Err(e) => {
                return Err(PipelineError::resource(
                    format!("cannot write to export directory {}", dir.display()),
                    e,
                ))
            }
        }
    }
}

fn verify_output(path: &Path) -> Result<u64, PipelineError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        _ => Err(PipelineError::EmptyOutput(path.to_path_buf())),
    }
}
