//! Preflight - Precondition Rules
//!
//! Each rule inspects a job and either passes or names the failure.
//! Rules run in a fixed order and the first failure wins; nothing here
//! creates files.

use serde::Serialize;

use crate::backend::{PresetKind, RasterBackend};
use crate::pipeline::{CompositionJob, PipelineError};

pub trait Precondition: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, job: &CompositionJob, backend: &dyn RasterBackend) -> Result<(), PipelineError>;
}

/// One rule's outcome, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightFinding {
    pub rule: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub ready: bool,
    pub backend: String,
    pub findings: Vec<PreflightFinding>,
}

// --- Concrete Rules ---

pub struct ToolAvailable;

impl Precondition for ToolAvailable {
    fn name(&self) -> &'static str { "tool_available" }

    fn check(&self, _job: &CompositionJob, backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        if backend.is_available() {
            Ok(())
        } else {
            Err(PipelineError::ToolUnavailable(backend.name().to_string()))
        }
    }
}

pub struct JobShape;

impl Precondition for JobShape {
    fn name(&self) -> &'static str { "job_shape" }

    fn check(&self, job: &CompositionJob, _backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        if job.frame_width == 0 || job.frame_height == 0 {
            return Err(PipelineError::InvalidJob(format!(
                "frame dimensions must be positive, got {}x{}",
                job.frame_width, job.frame_height
            )));
        }
        for (index, layer) in job.layers.iter().enumerate() {
            if layer.source.is_some() && !layer.position.is_valid() {
                return Err(PipelineError::InvalidJob(format!(
                    "layer {index} has an invalid position {:?}",
                    layer.position
                )));
            }
        }
        Ok(())
    }
}

pub struct FrameExists;

impl Precondition for FrameExists {
    fn name(&self) -> &'static str { "frame_exists" }

    fn check(&self, job: &CompositionJob, _backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        if job.frame.is_file() {
            Ok(())
        } else {
            Err(PipelineError::FrameNotFound(job.frame.clone()))
        }
    }
}

pub struct SourcesExist;

impl Precondition for SourcesExist {
    fn name(&self) -> &'static str { "sources_exist" }

    fn check(&self, job: &CompositionJob, _backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        for (index, layer) in job.layers.iter().enumerate() {
            if let Some(path) = &layer.source {
                if !path.is_file() {
                    return Err(PipelineError::SourceNotFound {
                        index,
                        path: path.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct PresetUsable;

impl Precondition for PresetUsable {
    fn name(&self) -> &'static str { "preset_usable" }

    fn check(&self, job: &CompositionJob, _backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        let Some(preset) = &job.preset else {
            return Ok(());
        };
        if !preset.is_file() {
            return Err(PipelineError::PresetNotFound(preset.clone()));
        }
        if PresetKind::from_path(preset).is_none() {
            return Err(PipelineError::UnsupportedPreset(preset.clone()));
        }
        Ok(())
    }
}

/// Ordered rule set run before every job
pub struct Preflight {
    rules: Vec<Box<dyn Precondition>>,
}

impl Preflight {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ToolAvailable),
                Box::new(JobShape),
                Box::new(FrameExists),
                Box::new(SourcesExist),
                Box::new(PresetUsable),
            ],
        }
    }

    pub fn check(&self, job: &CompositionJob, backend: &dyn RasterBackend) -> Result<(), PipelineError> {
        for rule in &self.rules {
            if let Err(e) = rule.check(job, backend) {
                log::warn!("Preflight rule '{}' failed: {e}", rule.name());
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run every rule and collect all outcomes.
    pub fn report(&self, job: &CompositionJob, backend: &dyn RasterBackend) -> PreflightReport {
        let findings: Vec<PreflightFinding> = self
            .rules
            .iter()
            .map(|rule| match rule.check(job, backend) {
                Ok(()) => PreflightFinding {
                    rule: rule.name().to_string(),
                    passed: true,
                    message: None,
                },
                Err(e) => PreflightFinding {
                    rule: rule.name().to_string(),
                    passed: false,
                    message: Some(e.to_string()),
                },
            })
            .collect();

        PreflightReport {
            ready: findings.iter().all(|f| f.passed),
            backend: backend.name().to_string(),
            findings,
        }
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompositePlan, PreprocessStep};
    use crate::geometry::Position;
    use crate::pipeline::JobLayer;
    use std::path::PathBuf;

    struct Offline;

    impl RasterBackend for Offline {
        fn name(&self) -> &'static str { "offline" }
        fn is_available(&self) -> bool { false }
        fn preprocess(&self, _step: &PreprocessStep) -> Result<(), PipelineError> { Ok(()) }
        fn compose(&self, _plan: &CompositePlan) -> Result<(), PipelineError> { Ok(()) }
    }

    fn job(frame: PathBuf) -> CompositionJob {
        CompositionJob {
            layers: vec![JobLayer::new("/nonexistent/a.png", Position::new(0.0, 0.0, 50.0, 50.0))],
            preset: None,
            frame,
            frame_width: 100,
            frame_height: 100,
            export_dir: PathBuf::from("/tmp"),
        }
    }

    #[test]
    fn test_tool_checked_first() {
        let err = Preflight::new()
            .check(&job(PathBuf::from("/nonexistent/frame.png")), &Offline)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolUnavailable(name) if name == "offline"));
    }

    #[test]
    fn test_report_lists_every_rule() {
        let report = Preflight::new().report(&job(PathBuf::from("/nonexistent/frame.png")), &Offline);
        assert!(!report.ready);
        let names: Vec<_> = report.findings.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(
            names,
            ["tool_available", "job_shape", "frame_exists", "sources_exist", "preset_usable"]
        );
        assert!(report.findings[1].passed);
        assert!(!report.findings[2].passed);
        assert!(report.findings[4].passed);
    }

    #[test]
    fn test_unfilled_slots_are_not_checked() {
        let mut j = job(PathBuf::from("/nonexistent/frame.png"));
        j.layers = vec![JobLayer {
            source: None,
            position: Position::new(0.0, 0.0, 0.0, 0.0),
        }];
        assert!(JobShape.check(&j, &Offline).is_ok());
        assert!(SourcesExist.check(&j, &Offline).is_ok());
    }

    #[test]
    fn test_zero_frame_is_invalid() {
        let mut j = job(PathBuf::from("/nonexistent/frame.png"));
        j.frame_width = 0;
        assert!(matches!(JobShape.check(&j, &Offline), Err(PipelineError::InvalidJob(_))));
    }
}
