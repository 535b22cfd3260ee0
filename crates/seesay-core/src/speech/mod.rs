//! Text-to-speech for spoken answers

mod google;
pub mod text;

pub use google::GoogleTts;

use crate::error::Result;

/// Turns answer text into MP3 bytes
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
