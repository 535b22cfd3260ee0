//! Answer audio files on disk

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

const FILE_PREFIX: &str = "answer-";
const FILE_EXTENSION: &str = "mp3";

/// A stored answer: where it lives and the URL it is served under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub url: String,
}

/// Writes each answer to its own uniquely named file and keeps the
/// directory bounded to the most recent `retain` answers.
pub struct AudioStore {
    dir: PathBuf,
    url_prefix: String,
    retain: usize,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>, retain: usize) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
            retain,
        }
    }

    pub fn save(&self, audio: &[u8]) -> Result<AudioArtifact> {
        if audio.is_empty() {
            return Err(Error::AudioError("Refusing to store empty audio".to_string()));
        }

        std::fs::create_dir_all(&self.dir)?;

        let file_name = format!("{}{}.{}", FILE_PREFIX, Uuid::new_v4(), FILE_EXTENSION);
        let path = self.dir.join(&file_name);

        // Readers only ever see complete files
        let tmp_path = self.dir.join(format!(".{}.part", file_name));
        write_via_temp(&tmp_path, &path, audio)?;
        debug!("Stored {} bytes of audio at {:?}", audio.len(), path);

        if self.retain > 0 {
            self.prune(&path);
        }

        Ok(AudioArtifact {
            url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name),
            path,
        })
    }

    /// Delete the oldest answer files so that at most `retain` remain,
    /// never touching `keep`.
    fn prune(&self, keep: &Path) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {:?} for pruning: {}", self.dir, e);
                return;
            }
        };

        let mut older: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path != keep && is_answer_file(path))
            .filter_map(|path| {
                let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((modified, path))
            })
            .collect();

        let allowed = self.retain.saturating_sub(1);
        if older.len() <= allowed {
            return;
        }

        // Newest first; everything past `allowed` goes
        older.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in older.into_iter().skip(allowed) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Pruned {:?}", path),
                Err(e) => warn!("Failed to prune {:?}: {}", path, e),
            }
        }
    }
}

/// Write `bytes` to `tmp_path` and move it to `path`, removing the temp file
/// if either step fails
fn write_via_temp(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let written = std::fs::write(tmp_path, bytes).and_then(|()| std::fs::rename(tmp_path, path));
    if written.is_err() {
        let _ = std::fs::remove_file(tmp_path);
    }
    written
}

fn is_answer_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(FILE_PREFIX));
    let ext_ok = path.extension().map_or(false, |e| e == FILE_EXTENSION);
    name_ok && ext_ok
}
