//! Credential store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Error reading or writing the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the settings file failed
    #[error("Settings file I/O error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file content is not a JSON object of strings
    #[error("Settings file {} is malformed: {}", .path.display(), .source)]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No platform configuration directory to place the settings file in
    #[error("Could not determine a configuration directory")]
    NoConfigDir,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Serialization {
            path: path.into(),
            source,
        }
    }
}
