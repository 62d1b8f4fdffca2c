//! Error types for vox-files.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from file-tree (de)serialization and writing.
#[derive(Debug, Error)]
pub enum FileError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config, identity, or sidecar file failed its declared shape.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// JSON (de)serialization failure outside a specific file context.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failure outside a specific file context.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `file://` placeholder named a file that cannot be read. The tree is
    /// assumed internally consistent, so this is fatal for the resource.
    #[error("placeholder {placeholder} points at missing file {path}")]
    DanglingPlaceholder { placeholder: String, path: PathBuf },
}

/// Convenience constructor for [`FileError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FileError {
    FileError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`FileError::Parse`].
pub(crate) fn parse_err(path: impl Into<PathBuf>, message: impl ToString) -> FileError {
    FileError::Parse {
        path: path.into(),
        message: message.to_string(),
    }
}
