//! Filesystem helpers for the registry store.
//!
//! The registry persists as a single JSON document that is loaded fully
//! at construction and rewritten fully on every mutation. This module
//! keeps the path conventions and the atomic write-then-rename sequence
//! in one place so the registry logic never touches raw I/O. Only a
//! local filesystem backend exists today; the enum leaves room for an
//! object-store backend without rewriting the registry.
use std::io;
use std::path::{Path, PathBuf};

use snafu::{prelude::*, Backtrace};
use tokio::{fs, io::AsyncWriteExt};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Where a registry store lives.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    /// A registry file on the local filesystem.
    Local(PathBuf),
}

impl StoreLocation {
    /// Create a location for a local registry file.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        StoreLocation::Local(path.into())
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        match self {
            StoreLocation::Local(path) => path,
        }
    }
}

/// Errors raised by registry storage operations.
#[derive(Debug, Snafu)]
pub enum StorageError {
    /// The registry file does not exist.
    #[snafu(display("registry file not found: {path}"))]
    NotFound {
        /// The missing path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// Any other local I/O failure.
    #[snafu(display("I/O error at {path}: {source}"))]
    Io {
        /// The path where the failure occurred.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },
}

/// Read the registry document, distinguishing "missing" from other
/// failures so callers can treat an absent file as a fresh store.
pub async fn read_to_string(location: &StoreLocation) -> StorageResult<String> {
    let path = location.path();
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e).context(NotFoundSnafu {
            path: path.display().to_string(),
        }),
        Err(e) => Err(e).context(IoSnafu {
            path: path.display().to_string(),
        }),
    }
}

/// Replace the registry document atomically.
///
/// Writes to a sibling temporary file, syncs it, and renames it over the
/// target so readers never observe a half-written document. The
/// temporary file is removed on error paths.
pub async fn write_atomic(location: &StoreLocation, contents: &[u8]) -> StorageResult<()> {
    let path = location.path();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.context(IoSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let result = write_and_rename(&tmp_path, path, contents).await;
    if result.is_err() {
        // Best-effort cleanup; we are already reporting another error.
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_and_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(tmp_path).await.context(IoSnafu {
        path: tmp_path.display().to_string(),
    })?;
    file.write_all(contents).await.context(IoSnafu {
        path: tmp_path.display().to_string(),
    })?;
    file.sync_all().await.context(IoSnafu {
        path: tmp_path.display().to_string(),
    })?;
    drop(file);

    fs::rename(tmp_path, path).await.context(IoSnafu {
        path: path.display().to_string(),
    })
}
