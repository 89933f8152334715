//! ImageMagick backend
//!
//! One `magick` process per image for stage 1 and a single process for
//! stages 2-4 plus the write.

use std::ffi::{OsStr, OsString};

use crate::backend::{CompositePlan, PreprocessStep, PresetKind, RasterBackend};
use crate::pipeline::{PipelineError, Stage};
use crate::tool::{is_program_available, ToolInvocation};

pub const DEFAULT_PROGRAM: &str = "magick";

#[derive(Debug, Clone)]
pub struct MagickBackend {
    program: OsString,
}

impl MagickBackend {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// `src -resize WxH^ -gravity center -extent WxH -strip [lut -hald-clut] out`
    pub fn preprocess_invocation(&self, step: &PreprocessStep) -> ToolInvocation {
        let dims = format!("{}x{}", step.width, step.height);
        let mut inv = ToolInvocation::new(self.program.clone(), Stage::Preprocess { index: step.index })
            .arg(&step.source)
            .args(["-resize", &format!("{dims}^")])
            .args(["-gravity", "center"])
            .args(["-extent", &dims])
            .arg("-strip");

        if let Some(preset) = &step.preset {
            let lut: OsString = match preset.kind {
                PresetKind::HaldClut => preset.path.clone().into_os_string(),
                PresetKind::Cube => {
                    let mut prefixed = OsString::from("cube:");
                    prefixed.push(&preset.path);
                    prefixed
                }
            };
            inv = inv.arg(lut).arg("-hald-clut");
        }

        inv.arg(&step.output)
    }

    /// `-size WxH xc:transparent {layer -geometry +X+Y -composite}... +geometry frame -composite out`
    ///
    /// `-geometry` persists, so it is reset before the frame goes on at +0+0.
    pub fn compose_invocation(&self, plan: &CompositePlan) -> ToolInvocation {
        let mut inv = ToolInvocation::new(self.program.clone(), Stage::Compose)
            .args(["-size", &format!("{}x{}", plan.width, plan.height)])
            .arg("xc:transparent");

        for layer in &plan.layers {
            inv = inv
                .arg(&layer.path)
                .args(["-geometry", &format!("{:+}{:+}", layer.x, layer.y)])
                .arg("-composite");
        }

        inv.arg("+geometry")
            .arg(&plan.frame)
            .arg("-composite")
            .arg(&plan.output)
    }
}

impl Default for MagickBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterBackend for MagickBackend {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn is_available(&self) -> bool {
        is_program_available(&self.program)
    }

    fn preprocess(&self, step: &PreprocessStep) -> Result<(), PipelineError> {
        self.preprocess_invocation(step).run().map(|_| ())
    }

    fn compose(&self, plan: &CompositePlan) -> Result<(), PipelineError> {
        self.compose_invocation(plan).run().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompositeLayer, Preset};
    use std::path::{Path, PathBuf};

    fn step(preset: Option<&str>) -> PreprocessStep {
        PreprocessStep {
            index: 0,
            source: PathBuf::from("in/a.jpg"),
            width: 200,
            height: 100,
            preset: preset.and_then(|p| Preset::from_path(Path::new(p))),
            output: PathBuf::from("tmp/layer_000.png"),
        }
    }

    #[test]
    fn test_preprocess_arguments() {
        let inv = MagickBackend::new().preprocess_invocation(&step(None));
        assert_eq!(
            inv.display_args(),
            [
                "in/a.jpg", "-resize", "200x100^", "-gravity", "center", "-extent", "200x100",
                "-strip", "tmp/layer_000.png"
            ]
        );
    }

    #[test]
    fn test_preprocess_with_cube_preset() {
        let inv = MagickBackend::new().preprocess_invocation(&step(Some("luts/film.cube")));
        let args = inv.display_args();
        let n = args.len();
        assert_eq!(args[n - 3], "cube:luts/film.cube");
        assert_eq!(args[n - 2], "-hald-clut");
    }

    #[test]
    fn test_compose_arguments_keep_order_and_sign() {
        let plan = CompositePlan {
            width: 800,
            height: 600,
            layers: vec![
                CompositeLayer { path: PathBuf::from("l0.png"), x: -50, y: 0 },
                CompositeLayer { path: PathBuf::from("l1.png"), x: 100, y: 120 },
            ],
            frame: PathBuf::from("frame.png"),
            output: PathBuf::from("out/output_1.png"),
        };
        let inv = MagickBackend::with_program("convert").compose_invocation(&plan);
        assert_eq!(inv.program(), OsStr::new("convert"));
        assert_eq!(
            inv.display_args(),
            [
                "-size", "800x600", "xc:transparent",
                "l0.png", "-geometry", "-50+0", "-composite",
                "l1.png", "-geometry", "+100+120", "-composite",
                "+geometry", "frame.png", "-composite", "out/output_1.png"
            ]
        );
    }

    #[test]
    fn test_frame_is_composited_at_origin() {
        let plan = CompositePlan {
            width: 100,
            height: 120,
            layers: vec![CompositeLayer { path: PathBuf::from("l0.png"), x: 100, y: 120 }],
            frame: PathBuf::from("frame.png"),
            output: PathBuf::from("out.png"),
        };
        let args = MagickBackend::new().compose_invocation(&plan).display_args();
        let frame_at = args.iter().position(|a| a == "frame.png").unwrap();
        let last_geometry = args.iter().rposition(|a| a.ends_with("geometry")).unwrap();
        assert_eq!(args[last_geometry], "+geometry");
        assert_eq!(last_geometry + 1, frame_at);
    }
}
