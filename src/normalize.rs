//! Square JPEG normalization of fetched images.
//!
//! Every image is flattened onto white, scaled to fit a `target × target` box
//! without changing its aspect ratio, and centered on a white square canvas.

use std::{
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use image::{
    DynamicImage, GenericImageView as _, ImageReader, Rgb, RgbImage, Rgba, RgbaImage,
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use tracing::{error, info, warn};

use crate::config::NormalizeSettings;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid normalizer settings: {0}")]
    InvalidSettings(String),
    #[error("images directory not found ({path:?})")]
    MissingImagesDir { path: PathBuf },
    #[error("invalid scan pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("no wine images found in {path:?}")]
    NoImages { path: PathBuf },
    #[error("failed to create output directory ({path:?}): {error}")]
    CreateDir {
        error: std::io::Error,
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to open image ({path:?}): {error}")]
    Open {
        error: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to decode image ({path:?}): {error}")]
    Decode {
        error: image::ImageError,
        path: PathBuf,
    },
    #[error("failed to encode JPEG ({path:?}): {error}")]
    Encode {
        error: image::ImageError,
        path: PathBuf,
    },
    #[error("failed to write image ({path:?}): {error}")]
    Write {
        error: std::io::Error,
        path: PathBuf,
    },
}

/// Size of the scaled image and its offset on the square canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl Placement {
    /// `scale = min(target / width, target / height)`, truncated, centered.
    /// A zero target places nothing.
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        if target == 0 {
            return Self {
                width: 0,
                height: 0,
                x: 0,
                y: 0,
            };
        }
        let target_f = f64::from(target);
        let scale = f64::min(target_f / f64::from(width), target_f / f64::from(height));
        let scaled = |side: u32| ((f64::from(side) * scale) as u32).clamp(1, target);
        let (width, height) = (scaled(width), scaled(height));
        Self {
            width,
            height,
            x: (target - width) / 2,
            y: (target - height) / 2,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    pub processed: usize,
    pub failed: usize,
}

impl NormalizeReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Output file name: the input stem with a `.jpg` extension.
pub fn output_name(input: &str) -> String {
    match input.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{input}.jpg"),
    }
}

/// Composites anything with an alpha channel onto opaque white.
fn flatten(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }
    let (width, height) = image.dimensions();
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &image.into_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).into_rgb8()
}

pub struct Normalizer {
    target_size: u32,
    quality: u8,
}

impl TryFrom<&NormalizeSettings> for Normalizer {
    type Error = Error;

    fn try_from(settings: &NormalizeSettings) -> Result<Self, Self::Error> {
        Self::new(settings.target_size, settings.quality)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            target_size: 600,
            quality: 85,
        }
    }
}

impl Normalizer {
    /// Target must be positive and quality within `1..=100`.
    pub fn new(target_size: u32, quality: u8) -> Result<Self, Error> {
        if target_size == 0 {
            return Err(Error::InvalidSettings(
                "target size must be positive".to_owned(),
            ));
        }
        if !(1..=100).contains(&quality) {
            return Err(Error::InvalidSettings(format!(
                "quality must be within 1..=100, got {quality}"
            )));
        }
        Ok(Self {
            target_size,
            quality,
        })
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Produces the square canvas for an already decoded image.
    pub fn square(&self, image: DynamicImage) -> (RgbImage, Placement) {
        let flat = flatten(image);
        let placement = Placement::fit(flat.width(), flat.height(), self.target_size);
        let scaled = if (placement.width, placement.height) == flat.dimensions() {
            flat
        } else {
            imageops::resize(
                &flat,
                placement.width,
                placement.height,
                FilterType::Lanczos3,
            )
        };
        let mut canvas = RgbImage::from_pixel(self.target_size, self.target_size, WHITE);
        imageops::replace(
            &mut canvas,
            &scaled,
            i64::from(placement.x),
            i64::from(placement.y),
        );
        (canvas, placement)
    }

    fn decode(&self, input: &Path) -> Result<DynamicImage, ImageError> {
        ImageReader::open(input)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|error| ImageError::Open {
                error,
                path: input.to_owned(),
            })?
            .decode()
            .map_err(|error| ImageError::Decode {
                error,
                path: input.to_owned(),
            })
    }

    fn encode(&self, canvas: &RgbImage, output: &Path) -> Result<(), ImageError> {
        let write_error = |error| ImageError::Write {
            error,
            path: output.to_owned(),
        };
        let file = std::fs::File::create(output).map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        canvas
            .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, self.quality))
            .map_err(|error| ImageError::Encode {
                error,
                path: output.to_owned(),
            })?;
        writer.flush().map_err(write_error)
    }

    /// Normalizes one file, overwriting `output` if it exists.
    pub fn normalize_file(&self, input: &Path, output: &Path) -> Result<Placement, ImageError> {
        let image = self.decode(input)?;
        let (width, height) = image.dimensions();
        info!(?input, width, height, "original size");
        let (canvas, placement) = self.square(image);
        self.encode(&canvas, output)?;
        Ok(placement)
    }

    /// Regular files named `wine_*` directly under `images_dir`, sorted.
    pub fn inputs(images_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let pattern = format!(
            "{}/wine_*",
            glob::Pattern::escape(&images_dir.to_string_lossy())
        );
        let mut inputs = glob::glob(&pattern)?
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| warn!(%e, "failed to read directory entry"))
                    .ok()
            })
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        inputs.sort();
        Ok(inputs)
    }

    /// Normalizes every fetched image into `output_dir`.
    pub fn run(&self, images_dir: &Path, output_dir: &Path) -> Result<NormalizeReport, Error> {
        if !images_dir.is_dir() {
            return Err(Error::MissingImagesDir {
                path: images_dir.to_owned(),
            });
        }
        let inputs = Self::inputs(images_dir)?;
        if inputs.is_empty() {
            return Err(Error::NoImages {
                path: images_dir.to_owned(),
            });
        }
        std::fs::create_dir_all(output_dir).map_err(|error| Error::CreateDir {
            error,
            path: output_dir.to_owned(),
        })?;
        info!(
            images = inputs.len(),
            target = self.target_size,
            output = ?output_dir,
            "normalizing images"
        );

        let mut report = NormalizeReport::default();
        for input in inputs {
            let Some(name) = input.file_name().map(|name| name.to_string_lossy()) else {
                continue;
            };
            let output = output_dir.join(output_name(&name));
            match self.normalize_file(&input, &output) {
                Ok(placement) => {
                    info!(
                        file = %name,
                        width = placement.width,
                        height = placement.height,
                        output = ?output,
                        "normalized"
                    );
                    report.processed += 1;
                }
                Err(error) => {
                    error!(file = %name, %error, "failed to normalize");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            failed = report.failed,
            output = ?output_dir,
            "normalization complete"
        );
        if report.processed > 0 && output_dir != images_dir {
            info!(
                images = ?images_dir,
                "review the normalized images and move them into the images directory before linking"
            );
        }
        Ok(report)
    }
}
