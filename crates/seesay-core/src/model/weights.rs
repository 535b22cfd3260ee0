//! Safetensors header inspection
//!
//! The Python daemon owns the actual weights; we only read the header so a
//! truncated or corrupt download is caught before the daemon is started.

use safetensors::tensor::TensorInfo;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

const HEADER_LEN_BYTES: usize = 8;
const MAX_HEADER_BYTES: u64 = 100_000_000;

/// What the header of a safetensors file declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsSummary {
    pub tensor_count: usize,
    pub parameter_count: usize,
    /// Bytes the file must hold for every tensor to be present
    pub expected_file_bytes: u64,
}

impl WeightsSummary {
    /// Read only the header of the file at `path`. `SafeTensors::read_metadata`
    /// wants the whole file in memory, so the length prefix is read here and
    /// the crate is used for the per-tensor `TensorInfo` entries.
    pub fn inspect(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut len_buf = [0u8; HEADER_LEN_BYTES];
        file.read_exact(&mut len_buf)
            .map_err(|e| Error::SafetensorsError(format!("{:?}: header too small: {}", path, e)))?;
        let header_len = u64::from_le_bytes(len_buf);
        if header_len > MAX_HEADER_BYTES {
            return Err(Error::SafetensorsError(format!(
                "{:?}: header of {} bytes is too large",
                path, header_len
            )));
        }

        let mut header = vec![0u8; header_len as usize];
        file.read_exact(&mut header)
            .map_err(|e| Error::SafetensorsError(format!("{:?}: truncated header: {}", path, e)))?;

        let summary = Self::from_header(&header, header_len)?;
        if file_len < summary.expected_file_bytes {
            return Err(Error::SafetensorsError(format!(
                "{:?}: file is {} bytes but the header declares {}",
                path, file_len, summary.expected_file_bytes
            )));
        }

        debug!("Weights {:?}: {} bytes declared", path, summary.expected_file_bytes);
        Ok(summary)
    }

    fn from_header(header: &[u8], header_len: u64) -> Result<Self> {
        let mut entries: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(header)?;
        entries.remove("__metadata__");
        let tensors: HashMap<String, TensorInfo> =
            serde_json::from_value(serde_json::Value::Object(entries))?;

        let data_end = tensors
            .values()
            .map(|t| t.data_offsets.1)
            .max()
            .unwrap_or(0);
        let parameter_count = tensors
            .values()
            .map(|t| t.shape.iter().product::<usize>())
            .sum();

        Ok(Self {
            tensor_count: tensors.len(),
            parameter_count,
            expected_file_bytes: HEADER_LEN_BYTES as u64 + header_len + data_end as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_safetensors(dir: &Path, header: &str, data_len: usize) -> std::path::PathBuf {
        let path = dir.join("model.safetensors");
        let mut file = File::create(&path).unwrap();
        file.write_all(&(header.len() as u64).to_le_bytes()).unwrap();
        file.write_all(header.as_bytes()).unwrap();
        file.write_all(&vec![0u8; data_len]).unwrap();
        path
    }

    const HEADER: &str = r#"{"__metadata__":{"format":"pt"},"a":{"dtype":"F32","shape":[2,3],"data_offsets":[0,24]},"b":{"dtype":"F32","shape":[4],"data_offsets":[24,40]}}"#;

    #[test]
    fn counts_tensors_and_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_safetensors(dir.path(), HEADER, 40);

        let summary = WeightsSummary::inspect(&path).unwrap();
        assert_eq!(summary.tensor_count, 2);
        assert_eq!(summary.parameter_count, 10);
        assert_eq!(summary.expected_file_bytes, 8 + HEADER.len() as u64 + 40);
    }

    #[test]
    fn detects_truncated_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_safetensors(dir.path(), HEADER, 30);

        let err = WeightsSummary::inspect(&path).unwrap_err();
        assert!(matches!(err, Error::SafetensorsError(_)));
    }
}
