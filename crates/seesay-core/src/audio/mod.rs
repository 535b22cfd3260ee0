//! Storage of synthesized answer audio

mod store;

pub use store::{AudioArtifact, AudioStore};
