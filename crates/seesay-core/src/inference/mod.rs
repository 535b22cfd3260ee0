//! Answer generation with a pretrained vision-language model

mod blip_bridge;

pub use blip_bridge::{BlipBridge, DaemonRequest, DaemonResponse};

use image::RgbImage;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::ModelFiles;
use crate::processor::{BlipProcessor, ModelInputs};

/// The pretrained model as seen by the service: a preprocessor, a single
/// generate pass, and a token decoder.
pub trait VisionLanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    fn preprocess(&self, image: &RgbImage, question: &str) -> Result<ModelInputs>;

    fn generate(&self, inputs: &ModelInputs) -> Result<Vec<u32>>;

    fn decode(&self, token_ids: &[u32]) -> Result<String>;

    /// Release external resources held by the model
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// BLIP VQA: preprocessing in-process, generation in the Python daemon
pub struct BlipVqaModel {
    model_id: String,
    processor: BlipProcessor,
    bridge: BlipBridge,
    max_new_tokens: usize,
}

impl BlipVqaModel {
    /// Load the processor and start the daemon. Blocking.
    pub fn load(files: &ModelFiles, config: &EngineConfig) -> Result<Self> {
        let processor = BlipProcessor::from_model_dir(&files.dir)?;
        let bridge = BlipBridge::new(config.bridge.clone(), &files.dir);
        bridge.ensure_daemon_running()?;

        if let Ok(status) = bridge.status() {
            debug!("VQA daemon status: {:?} on {:?}", status.status, status.device);
        }

        Ok(Self {
            model_id: files.model_id.clone(),
            processor,
            bridge,
            max_new_tokens: config.max_new_tokens,
        })
    }
}

impl VisionLanguageModel for BlipVqaModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn preprocess(&self, image: &RgbImage, question: &str) -> Result<ModelInputs> {
        self.processor.preprocess(image, question)
    }

    fn generate(&self, inputs: &ModelInputs) -> Result<Vec<u32>> {
        self.bridge.generate(inputs, self.max_new_tokens)
    }

    fn decode(&self, token_ids: &[u32]) -> Result<String> {
        self.processor.decode(token_ids)
    }

    fn shutdown(&self) -> Result<()> {
        self.bridge.stop_daemon()
    }
}
