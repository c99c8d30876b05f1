//! Durable rotation state.
//!
//! A single JSON file. Saves go to a sibling temp file which is synced and
//! then renamed over the old one, so an interrupted save leaves the last
//! committed state intact. A missing file is a first run.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::rotation::RotationState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is not valid rotation state: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode rotation state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Load the committed state, or the zero state if none was ever saved.
    pub fn load(&self) -> Result<RotationState, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved rotation state, starting fresh");
                return Ok(RotationState::default());
            }
            Err(e) => return Err(self.io_err(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically replace the committed state.
    pub fn save(&self, state: &RotationState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(parent, e))?;
        }

        let mut file = std::fs::File::create(&tmp).map_err(|e| self.io_err(&tmp, e))?;
        file.write_all(&json).map_err(|e| self.io_err(&tmp, e))?;
        file.sync_all().map_err(|e| self.io_err(&tmp, e))?;
        drop(file);

        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(&self.path, e))?;
        tracing::debug!(
            path = %self.path.display(),
            period_counter = state.period_counter,
            tasks = state.tasks.len(),
            "Saved rotation state"
        );
        Ok(())
    }
}
