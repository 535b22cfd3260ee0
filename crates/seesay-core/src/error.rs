//! Error types for the SeeSay engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to decode image: {0}")]
    ImageDecodeError(String),

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Speech synthesis error: {0}")]
    SpeechError(String),

    #[error("Audio storage error: {0}")]
    AudioError(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HuggingFace Hub error: {0}")]
    HfHubError(String),

    #[error("Safetensors error: {0}")]
    SafetensorsError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hf_hub::api::sync::ApiError> for Error {
    fn from(e: hf_hub::api::sync::ApiError) -> Self {
        Error::HfHubError(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::ImageDecodeError(e.to_string())
    }
}
