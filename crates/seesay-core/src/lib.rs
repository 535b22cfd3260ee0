//! SeeSay Core - visual question answering with spoken answers
//!
//! Given an image and a question, a pretrained BLIP VQA model produces a short
//! text answer which is then synthesized to speech and stored as an MP3.
//!
//! # Architecture
//!
//! - [`processor`]: image decoding, pixel normalization and question tokenization
//! - [`inference`]: the [`VisionLanguageModel`] seam and the BLIP daemon bridge
//! - [`speech`]: the [`SpeechSynthesizer`] seam and Google Translate TTS
//! - [`audio`]: per-request answer files served as static assets
//! - [`service`]: the linear pipeline tying them together
//!
//! # Example
//!
//! ```ignore
//! use seesay_core::{decode_rgb, EngineConfig, VqaService};
//!
//! let service = VqaService::from_config(&EngineConfig::default())?;
//! let image = decode_rgb(&std::fs::read("cats.jpg")?)?;
//! let answer = service.answer(&image, "how many cats are there?")?;
//! println!("{} ({})", answer.text, answer.audio.url);
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod processor;
pub mod service;
pub mod speech;
pub mod tokenizer;

pub use audio::{AudioArtifact, AudioStore};
pub use config::{BridgeConfig, EngineConfig, ServerConfig, SpeechConfig};
pub use error::{Error, Result};
pub use inference::{BlipVqaModel, VisionLanguageModel};
pub use model::{ModelFiles, ModelStore};
pub use processor::{decode_rgb, BlipProcessor, ModelInputs};
pub use service::{Answer, VqaService, AUDIO_URL_PREFIX};
pub use speech::{GoogleTts, SpeechSynthesizer};
