//! BLIP input preparation: pixels from the image, token ids from the question

mod image_processor;

pub use image_processor::{
    decode_rgb, ImageProcessor, ImageProcessorConfig, PixelValues, CLIP_MEAN, CLIP_STD,
};

use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::tokenizer::Tokenizer;

/// Tensors handed to the model for one question
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// CHW f32 pixels, `3 * image_height * image_width` values
    pub pixel_values: Vec<f32>,
    pub image_height: u32,
    pub image_width: u32,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

pub struct BlipProcessor {
    image: ImageProcessor,
    tokenizer: Tokenizer,
}

impl BlipProcessor {
    pub fn new(image: ImageProcessor, tokenizer: Tokenizer) -> Self {
        Self { image, tokenizer }
    }

    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let config = ImageProcessorConfig::from_model_dir(model_dir)?;
        debug!("Image processor config: {:?}", config);
        let tokenizer = Tokenizer::from_path(model_dir)?;
        Ok(Self::new(ImageProcessor::new(config), tokenizer))
    }

    pub fn preprocess(&self, image: &RgbImage, question: &str) -> Result<ModelInputs> {
        let pixels = self.image.preprocess(image);
        let input_ids = self.tokenizer.encode(question)?;
        let attention_mask = vec![1; input_ids.len()];

        Ok(ModelInputs {
            pixel_values: pixels.data,
            image_height: pixels.height,
            image_width: pixels.width,
            input_ids,
            attention_mask,
        })
    }

    /// Token ids to answer text, special tokens skipped and whitespace trimmed
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(self.tokenizer.decode(ids)?.trim().to_string())
    }
}
