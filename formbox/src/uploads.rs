//! On-disk storage for uploaded images.
//!
//! Every upload gets a fresh name of the form `<millis><ext>`, e.g. `1718030405123.png`. The
//! millisecond stamp is forced to increase strictly within the process, so two uploads never
//! share a name even when they arrive in the same millisecond. Files are opened with
//! create-new semantics, so a name left behind by an earlier process is skipped rather than
//! overwritten.

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create upload directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Upload stream failed after {written} bytes: {source}")]
    Stream { written: u64, source: io::Error },

    #[error("Failed to delete {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },
}

/// Writes uploads into a single flat directory
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    last_stamp: AtomicU64,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_stamp: AtomicU64::new(0),
        }
    }

    /// Directory files are written to and served from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await.map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })
    }

    /// Write `content` under a freshly generated name and return that name.
    ///
    /// `original_name` only contributes its extension. If the stream or the disk fails part
    /// way, the partial file is removed before the error is returned. The submit handler passes
    /// an already buffered image, so [`StorageError::Stream`] only comes from callers that hand
    /// over a live stream.
    #[instrument(skip(self, content), err)]
    pub async fn store<S>(&self, content: S, original_name: &str) -> Result<String, StorageError>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        self.ensure_root().await?;

        let ext = extension_of(original_name);
        let (filename, path, mut file) = loop {
            let filename = format!("{}{}", self.next_stamp(), ext);
            let path = self.root.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (filename, path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(%filename, "Upload name already taken, trying the next stamp");
                }
                Err(source) => return Err(StorageError::Create { path, source }),
            }
        };

        let mut content = std::pin::pin!(content);
        let mut written = 0u64;
        let result: Result<(), StorageError> = async {
            let write_err = |source| StorageError::Write {
                path: path.clone(),
                source,
            };
            while let Some(chunk) = content.next().await {
                let chunk = chunk.map_err(|source| StorageError::Stream { written, source })?;
                file.write_all(&chunk).await.map_err(write_err)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(write_err)?;
            file.sync_all().await.map_err(write_err)
        }
        .await;

        if let Err(e) = result {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %cleanup, "Failed to remove partial upload");
            }
            return Err(e);
        }

        debug!(%filename, bytes = written, "Stored upload");
        Ok(filename)
    }

    /// Remove a stored upload. Removing a file that is already gone is not an error.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, filename: &str) -> Result<(), StorageError> {
        let path = self.root.join(filename);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete { path, source }),
        }
    }

    fn next_stamp(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        self.next_stamp_at(now)
    }

    /// Issue `now`, or one past the last issued stamp if the clock has not moved on
    fn next_stamp_at(&self, now: u64) -> u64 {
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// `.ext` of the client's filename, or nothing when it has no plain alphanumeric extension
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
