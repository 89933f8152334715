//! 3D colour lookup tables (Hald CLUT images and `.cube` files)

use image::{RgbImage, RgbaImage};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backend::{Preset, PresetKind};

/// Largest cube edge accepted from a `.cube` file.
pub const MAX_CUBE_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum LutError {
    #[error("Failed to read LUT {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode Hald CLUT: {0}")]
    Image(#[from] image::ImageError),

    #[error("Not a Hald CLUT image: {width}x{height}")]
    NotHald { width: u32, height: u32 },

    #[error("Invalid .cube data at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Missing LUT_3D_SIZE in .cube data")]
    MissingSize,

    #[error("Expected {expected} LUT entries, found {found}")]
    WrongEntryCount { expected: usize, found: usize },
}

/// Cube of RGB samples, red varying fastest, values in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3d {
    size: usize,
    domain_min: [f32; 3],
    domain_max: [f32; 3],
    table: Vec<[f32; 3]>,
}

impl Lut3d {
    pub fn identity(size: usize) -> Self {
        let size = size.max(2);
        let max = (size - 1) as f32;
        let mut table = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    table.push([r as f32 / max, g as f32 / max, b as f32 / max]);
                }
            }
        }
        Self {
            size,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            table,
        }
    }

    pub fn load(preset: &Preset) -> Result<Self, LutError> {
        match preset.kind {
            PresetKind::HaldClut => Self::load_hald(&preset.path),
            PresetKind::Cube => Self::load_cube(&preset.path),
        }
    }

    pub fn load_hald(path: &Path) -> Result<Self, LutError> {
        let image = image::open(path)?.into_rgb8();
        Self::from_hald(&image)
    }

    /// A level-L Hald image is (L^3 x L^3) pixels holding an L^2 cube.
    pub fn from_hald(image: &RgbImage) -> Result<Self, LutError> {
        let (width, height) = image.dimensions();
        let level = (2..=16u32).find(|l| l * l * l == width);
        let Some(level) = level.filter(|_| width == height) else {
            return Err(LutError::NotHald { width, height });
        };

        let size = (level * level) as usize;
        let table = (0..size * size * size)
            .map(|i| {
                let x = (i % width as usize) as u32;
                let y = (i / width as usize) as u32;
                let px = image.get_pixel(x, y).0;
                [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]
            })
            .collect();

        Ok(Self {
            size,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            table,
        })
    }

    pub fn load_cube(path: &Path) -> Result<Self, LutError> {
        let text = std::fs::read_to_string(path).map_err(|source| LutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_cube(&text)
    }

    pub fn parse_cube(text: &str) -> Result<Self, LutError> {
        let mut size = None;
        let mut domain_min = [0.0f32; 3];
        let mut domain_max = [1.0f32; 3];
        let mut table = vec![];

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(keyword) = fields.next() else {
                continue;
            };
            match keyword {
                "TITLE" => {}
                "LUT_3D_SIZE" => {
                    let value = fields.next().unwrap_or_default();
                    let parsed: usize = value.parse().map_err(|_| LutError::Parse {
                        line: line_no,
                        message: format!("bad LUT_3D_SIZE '{value}'"),
                    })?;
                    if !(2..=MAX_CUBE_SIZE).contains(&parsed) {
                        return Err(LutError::Parse {
                            line: line_no,
                            message: format!("LUT_3D_SIZE must be in 2..={MAX_CUBE_SIZE}, got {parsed}"),
                        });
                    }
                    size = Some(parsed);
                }
                "LUT_1D_SIZE" => {
                    return Err(LutError::Parse {
                        line: line_no,
                        message: "1D tables are not supported".into(),
                    });
                }
                "DOMAIN_MIN" => domain_min = parse_triplet(fields, line_no)?,
                "DOMAIN_MAX" => domain_max = parse_triplet(fields, line_no)?,
                _ => {
                    let entry = parse_triplet(std::iter::once(keyword).chain(fields), line_no)?;
                    table.push(entry);
                }
            }
        }

        let size = size.ok_or(LutError::MissingSize)?;
        let expected = size
            .checked_mul(size)
            .and_then(|n| n.checked_mul(size))
            .ok_or(LutError::Parse {
                line: 0,
                message: format!("LUT_3D_SIZE {size} is too large"),
            })?;
        if table.len() != expected {
            return Err(LutError::WrongEntryCount {
                expected,
                found: table.len(),
            });
        }

        Ok(Self {
            size,
            domain_min,
            domain_max,
            table,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Trilinear sample; `rgb` is in the table's input domain.
    pub fn lookup(&self, rgb: [f32; 3]) -> [f32; 3] {
        let max = (self.size - 1) as f32;
        let mut base = [0usize; 3];
        let mut frac = [0f32; 3];
        for c in 0..3 {
            let span = self.domain_max[c] - self.domain_min[c];
            let t = if span > 0.0 {
                (rgb[c] - self.domain_min[c]) / span
            } else {
                0.0
            };
            let v = t.clamp(0.0, 1.0) * max;
            let i = (v.floor() as usize).min(self.size - 2);
            base[c] = i;
            frac[c] = v - i as f32;
        }

        let mut out = [0f32; 3];
        for corner in 0..8usize {
            let d = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let w = (0..3)
                .map(|c| if d[c] == 1 { frac[c] } else { 1.0 - frac[c] })
                .product::<f32>();
            if w == 0.0 {
                continue;
            }
            let entry = self.entry(base[0] + d[0], base[1] + d[1], base[2] + d[2]);
            for c in 0..3 {
                out[c] += w * entry[c];
            }
        }
        out
    }

    /// Grade every pixel in place; alpha is left alone.
    pub fn apply(&self, image: &mut RgbaImage) {
        let raw: &mut [u8] = image;
        raw.par_chunks_exact_mut(4).for_each(|px| {
            let graded = self.lookup([
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]);
            for c in 0..3 {
                px[c] = (graded[c].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        });
    }

    fn entry(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.table[r + g * self.size + b * self.size * self.size]
    }
}

fn parse_triplet<'a>(
    mut fields: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; 3], LutError> {
    let mut out = [0f32; 3];
    for slot in out.iter_mut() {
        let field = fields.next().ok_or_else(|| LutError::Parse {
            line,
            message: "expected three values".into(),
        })?;
        *slot = field.parse().map_err(|_| LutError::Parse {
            line,
            message: format!("not a number: '{field}'"),
        })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn identity_hald(level: u32) -> RgbImage {
        let side = level * level * level;
        let size = (level * level) as usize;
        let max = (size - 1) as f32;
        RgbImage::from_fn(side, side, |x, y| {
            let i = (y * side + x) as usize;
            let r = i % size;
            let g = (i / size) % size;
            let b = i / (size * size);
            let to_u8 = |v: usize| (v as f32 / max * 255.0).round() as u8;
            Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }

    #[test]
    fn test_identity_hald_preserves_colors() {
        let lut = Lut3d::from_hald(&identity_hald(2)).unwrap();
        assert_eq!(lut.size(), 4);
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([200, 17, 90, 128]));
        lut.apply(&mut img);
        for px in img.pixels() {
            assert!((px.0[0] as i32 - 200).abs() <= 1);
            assert!((px.0[1] as i32 - 17).abs() <= 1);
            assert!((px.0[2] as i32 - 90).abs() <= 1);
            assert_eq!(px.0[3], 128);
        }
    }

    #[test]
    fn test_non_square_hald_is_rejected() {
        let img = RgbImage::new(8, 4);
        assert!(matches!(Lut3d::from_hald(&img), Err(LutError::NotHald { .. })));
    }

    #[test]
    fn test_cube_inverting_table() {
        let mut text = String::from("TITLE \"invert\"\n# comment\nLUT_3D_SIZE 2\n");
        for b in 0..2 {
            for g in 0..2 {
                for r in 0..2 {
                    text.push_str(&format!("{} {} {}\n", 1 - r, 1 - g, 1 - b));
                }
            }
        }
        let lut = Lut3d::parse_cube(&text).unwrap();
        let out = lut.lookup([0.25, 1.0, 0.0]);
        assert!((out[0] - 0.75).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cube_entry_count_is_checked() {
        let text = "LUT_3D_SIZE 2\n0 0 0\n1 1 1\n";
        assert!(matches!(
            Lut3d::parse_cube(text),
            Err(LutError::WrongEntryCount { expected: 8, found: 2 })
        ));
    }

    #[test]
    fn test_cube_oversized_table_is_rejected() {
        for text in ["LUT_3D_SIZE 3000000\n0 0 0\n", "LUT_3D_SIZE 257\n", "LUT_3D_SIZE 1\n"] {
            assert!(matches!(
                Lut3d::parse_cube(text),
                Err(LutError::Parse { line: 1, .. })
            ));
        }
    }

    #[test]
    fn test_cube_without_size_is_rejected() {
        assert!(matches!(Lut3d::parse_cube("0 0 0\n"), Err(LutError::MissingSize)));
    }
}
