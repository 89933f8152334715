//! In-process backend built on the `image` crate
//!
//! Same stages and layering as the ImageMagick backend, no external tool.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{CompositePlan, Preset, PreprocessStep, RasterBackend};
use crate::lut::Lut3d;
use crate::pipeline::{PipelineError, Stage};

#[derive(Debug, Default)]
pub struct NativeBackend {
    luts: Mutex<HashMap<PathBuf, Arc<Lut3d>>>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lut_for(&self, preset: &Preset, stage: Stage) -> Result<Arc<Lut3d>, PipelineError> {
        let mut cache = self.luts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lut) = cache.get(&preset.path) {
            return Ok(Arc::clone(lut));
        }
        let lut = Arc::new(Lut3d::load(preset).map_err(|e| PipelineError::stage(stage, e))?);
        log::debug!("loaded {}^3 LUT from {}", lut.size(), preset.path.display());
        cache.insert(preset.path.clone(), Arc::clone(&lut));
        Ok(lut)
    }
}

fn open(path: &Path, stage: Stage) -> Result<DynamicImage, PipelineError> {
    image::open(path).map_err(|e| PipelineError::stage(stage, format!("{}: {e}", path.display())))
}

fn save(image: &RgbaImage, path: &Path, stage: Stage) -> Result<(), PipelineError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| PipelineError::stage(stage, format!("{}: {e}", path.display())))
}

impl RasterBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn preprocess(&self, step: &PreprocessStep) -> Result<(), PipelineError> {
        let stage = Stage::Preprocess { index: step.index };
        log::info!(
            "Executing step [{stage}]: {} -> {}x{}",
            step.source.display(),
            step.width,
            step.height
        );

        // fill then centre-crop; decoding drops metadata
        let source = open(&step.source, stage)?;
        let mut filled = source
            .resize_to_fill(step.width, step.height, FilterType::Lanczos3)
            .into_rgba8();

        if let Some(preset) = &step.preset {
            self.lut_for(preset, stage)?.apply(&mut filled);
        }

        save(&filled, &step.output, stage)
    }

    fn compose(&self, plan: &CompositePlan) -> Result<(), PipelineError> {
        log::info!(
            "Executing step [{}]: {} layer(s) on {}x{}",
            Stage::Compose,
            plan.layers.len(),
            plan.width,
            plan.height
        );

        let mut canvas = RgbaImage::from_pixel(plan.width, plan.height, Rgba([0, 0, 0, 0]));
        for layer in &plan.layers {
            let tile = open(&layer.path, Stage::Compose)?.into_rgba8();
            imageops::overlay(&mut canvas, &tile, layer.x, layer.y);
        }

        let frame = open(&plan.frame, Stage::Compose)?.into_rgba8();
        imageops::overlay(&mut canvas, &frame, 0, 0);

        save(&canvas, &plan.output, Stage::Output)
    }
}
