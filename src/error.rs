//! Error types for layerconf.

use std::io;
use std::path::PathBuf;

/// Result type alias for layerconf operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A load was requested but no filename was given and none is on record.
    #[error("no configuration filename specified")]
    FileNotSpecified,

    /// The file is absent from every candidate base directory. The path is
    /// attributed to the first candidate directory for diagnostic stability.
    #[error("configuration file not found: {}", path.display())]
    FileNotFound {
        /// Full path the file was expected at.
        path: PathBuf,
    },

    /// The file exists but does not parse as a JSON object.
    #[error("invalid JSON in {}: {source}", path.display())]
    FileFormat {
        /// Path of the malformed file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file exists but is not readable due to permissions.
    #[error("permission denied reading {}: {source}", path.display())]
    FilePermission {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure while reading a file.
    #[error("i/o error reading {}: {source}", path.display())]
    FileIo {
        /// Path of the file being read.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The merged document failed validation against the supplied schema.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// A schema was supplied but the validation engine is compiled out
    /// (`validation` feature disabled). Never treated as "validation passed".
    #[error("schema supplied but the `validation` feature is not enabled")]
    ValidationUnavailable,

    /// A name or alias that no configuration was ever created under.
    #[error("unknown configuration: {0}")]
    UnknownConfiguration(String),

    /// A key path that is absent from the effective document.
    #[error("key not found: {key} (configuration `{config}`)")]
    KeyNotFound {
        /// Canonical name of the configuration that was queried.
        config: String,
        /// The dotted key path that failed to resolve.
        key: String,
    },

    /// The caller combined options that contradict each other.
    #[error("invalid usage: {0}")]
    Usage(String),

    /// A background watcher could not be started or stopped.
    #[error("watch error: {0}")]
    Watch(String),

    /// Generic wrapping error for anything unexpected.
    #[error("configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Map an I/O error encountered while reading `path` onto the taxonomy.
    pub(crate) fn from_read(path: PathBuf, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ConfigError::FileNotFound { path },
            io::ErrorKind::PermissionDenied => ConfigError::FilePermission { path, source },
            _ => ConfigError::FileIo { path, source },
        }
    }
}
