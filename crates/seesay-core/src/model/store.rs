//! Locating model files on disk, downloading them from the hub when needed

use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::weights::WeightsSummary;

/// Files the processor and the daemon need from a BLIP repository
pub const REQUIRED_FILES: &[&str] = &[
    "config.json",
    "preprocessor_config.json",
    "tokenizer.json",
    "model.safetensors",
];

const WEIGHTS_FILE: &str = "model.safetensors";

/// A model directory that holds every required file
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model_id: String,
    pub dir: PathBuf,
    pub weights: WeightsSummary,
}

pub struct ModelStore {
    model_id: String,
    model_dir: Option<PathBuf>,
    cache_dir: PathBuf,
}

impl ModelStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            model_dir: config.model_dir.clone(),
            cache_dir: config.models_dir.clone(),
        }
    }

    /// Resolve the model directory, downloading into the cache if no local
    /// directory is configured. Blocking.
    pub fn resolve(&self) -> Result<ModelFiles> {
        let dir = match &self.model_dir {
            Some(dir) => {
                Self::check_local(dir)?;
                dir.clone()
            }
            None => self.download()?,
        };

        let weights = WeightsSummary::inspect(&dir.join(WEIGHTS_FILE))?;

        Ok(ModelFiles {
            model_id: self.model_id.clone(),
            dir,
            weights,
        })
    }

    fn check_local(dir: &Path) -> Result<()> {
        for file in REQUIRED_FILES {
            if !dir.join(file).exists() {
                return Err(Error::ModelNotFound(format!("{} missing from {:?}", file, dir)));
            }
        }
        Ok(())
    }

    fn download(&self) -> Result<PathBuf> {
        info!("Fetching {} into {:?}", self.model_id, self.cache_dir);
        std::fs::create_dir_all(&self.cache_dir)?;

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(false)
            .build()?;
        let repo = api.model(self.model_id.clone());

        let mut snapshot_dir = None;
        for file in REQUIRED_FILES {
            let path = repo
                .get(file)
                .map_err(|e| Error::DownloadError(format!("{}/{}: {}", self.model_id, file, e)))?;
            if snapshot_dir.is_none() {
                snapshot_dir = path.parent().map(Path::to_path_buf);
            }
        }

        snapshot_dir
            .ok_or_else(|| Error::DownloadError(format!("No files fetched for {}", self.model_id)))
    }
}
