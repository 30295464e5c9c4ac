//! Storage error types

use std::path::{Path, PathBuf};
use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur while reading or writing the store file
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or renaming the store file failed
    #[error("Store I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The map could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Checks if this error came from the filesystem
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }
}

impl From<StoreError> for PortError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Io { path, source } => PortError::Connection {
                message: format!("Store I/O failed for {}", path.display()),
                source: Some(Box::new(source)),
            },
            StoreError::Serialization(e) => PortError::transformation(e.to_string()),
            StoreError::Poisoned => PortError::internal("Store lock poisoned"),
        }
    }
}
