//! Image decoding and BLIP pixel preprocessing

use image::{imageops::FilterType, RgbImage};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Decode uploaded bytes into an RGB raster, guessing the container format
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)?;
    debug!("Decoded {}x{} image", img.width(), img.height());
    Ok(img.to_rgb8())
}

/// Pixel preprocessing parameters, as found in `preprocessor_config.json`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProcessorConfig {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub rescale_factor: f32,
    pub do_resize: bool,
    pub do_rescale: bool,
    pub do_normalize: bool,
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            size: 384,
            mean: CLIP_MEAN,
            std: CLIP_STD,
            rescale_factor: 1.0 / 255.0,
            do_resize: true,
            do_rescale: true,
            do_normalize: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSize {
    Square(u32),
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
}

#[derive(Debug, Deserialize)]
struct RawImageProcessorConfig {
    size: Option<RawSize>,
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
    rescale_factor: Option<f32>,
    do_resize: Option<bool>,
    do_rescale: Option<bool>,
    do_normalize: Option<bool>,
}

impl ImageProcessorConfig {
    /// Load from a model directory; a missing file yields the BLIP defaults
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join("preprocessor_config.json");
        if !path.exists() {
            debug!("No preprocessor_config.json in {:?}, using defaults", model_dir);
            return Ok(Self::default());
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawImageProcessorConfig = serde_json::from_str(json)?;
        let defaults = Self::default();

        let size = match raw.size {
            None => defaults.size,
            Some(RawSize::Square(s)) => s,
            Some(RawSize::ShortestEdge { shortest_edge }) => shortest_edge,
            Some(RawSize::HeightWidth { height, width }) => {
                if height != width {
                    return Err(Error::ConfigError(format!(
                        "Non-square image size {}x{} is not supported",
                        width, height
                    )));
                }
                height
            }
        };

        Ok(Self {
            size,
            mean: raw.image_mean.unwrap_or(defaults.mean),
            std: raw.image_std.unwrap_or(defaults.std),
            rescale_factor: raw.rescale_factor.unwrap_or(defaults.rescale_factor),
            do_resize: raw.do_resize.unwrap_or(defaults.do_resize),
            do_rescale: raw.do_rescale.unwrap_or(defaults.do_rescale),
            do_normalize: raw.do_normalize.unwrap_or(defaults.do_normalize),
        })
    }
}

/// Normalized CHW pixel tensor
#[derive(Debug, Clone)]
pub struct PixelValues {
    pub data: Vec<f32>,
    pub height: u32,
    pub width: u32,
}

/// Resizes, rescales and normalizes RGB images for the vision encoder
pub struct ImageProcessor {
    config: ImageProcessorConfig,
}

impl ImageProcessor {
    pub fn new(config: ImageProcessorConfig) -> Self {
        Self { config }
    }

    pub fn preprocess(&self, image: &RgbImage) -> PixelValues {
        let size = self.config.size;
        let resized;
        let img = if self.config.do_resize && image.dimensions() != (size, size) {
            // BLIP is trained with bicubic resampling
            resized = image::imageops::resize(image, size, size, FilterType::CatmullRom);
            &resized
        } else {
            image
        };

        let (width, height) = img.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; 3 * plane];

        for (idx, pixel) in img.pixels().enumerate() {
            for c in 0..3 {
                let mut v = pixel.0[c] as f32;
                if self.config.do_rescale {
                    v *= self.config.rescale_factor;
                }
                if self.config.do_normalize {
                    v = (v - self.config.mean[c]) / self.config.std[c];
                }
                data[c * plane + idx] = v;
            }
        }

        PixelValues {
            data,
            height,
            width,
        }
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ImageProcessorConfig::default())
    }
}
