//! Question tokenization and answer decoding

use std::path::Path;
use tokenizers::Tokenizer as HfTokenizer;
use tracing::debug;

use crate::error::{Error, Result};

pub struct Tokenizer {
    inner: HfTokenizer,
}

impl Tokenizer {
    pub fn from_path(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(Error::TokenizationError(format!(
                "No tokenizer.json found in {:?}",
                model_dir
            )));
        }

        let inner = HfTokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        debug!("Loaded tokenizer from {:?}", tokenizer_path);
        Ok(Self::new(inner))
    }

    pub fn new(inner: HfTokenizer) -> Self {
        Self { inner }
    }

    /// Encode with the model's special tokens ([CLS] ... [SEP] for BERT vocabularies)
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode generated ids, dropping special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))
    }
}
