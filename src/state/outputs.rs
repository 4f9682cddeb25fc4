use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::RelayError;
use crate::util::unix_now_millis;

/// A file written to the output store and the URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOutput {
    pub file_name: String,
    pub url: String,
}

/// Directory of files produced from upstream responses (GLB models,
/// restored images). Files are only ever added; names never repeat within a
/// process because of the sequence suffix.
pub struct OutputStore {
    dir: PathBuf,
    url_prefix: String,
    seq: AtomicU64,
}

impl OutputStore {
    /// Open the store, creating the directory if needed.
    ///
    /// `url_prefix` is the public path files are served under, e.g.
    /// `/outputs` or `/relay/outputs`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Storage`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Result<Self, RelayError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            url_prefix: url_prefix.into(),
            seq: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_file_name(&self, prefix: &str, ext: &str) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{}-{seq}.{ext}", unix_now_millis())
    }

    /// Write `bytes` under a fresh `<prefix>_<millis>-<seq>.<ext>` name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Storage`] when the file cannot be written.
    pub async fn save(
        &self,
        prefix: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<StoredOutput, RelayError> {
        let file_name = self.next_file_name(prefix, ext);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(file = %file_name, size = bytes.len(), "stored output");
        Ok(StoredOutput {
            url: format!("{}/{file_name}", self.url_prefix),
            file_name,
        })
    }

    /// Map a requested file name to a path inside the store.
    ///
    /// Returns `None` for names that could escape the directory.
    #[must_use]
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        if !is_safe_file_name(file_name) {
            return None;
        }
        Some(self.dir.join(file_name))
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && !name.starts_with('.')
}
