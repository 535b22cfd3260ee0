//! Model files for the VQA backend

mod store;
pub mod weights;

pub use store::{ModelFiles, ModelStore, REQUIRED_FILES};
pub use weights::WeightsSummary;
