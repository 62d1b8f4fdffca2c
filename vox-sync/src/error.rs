//! Error types for vox-sync.

use thiserror::Error;

use vox_api::ApiError;
use vox_files::FileError;

/// All errors that can arise from the sync pipelines.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the file layer.
    #[error("file error: {0}")]
    Files(#[from] FileError),

    /// An error from the API client on a required fetch.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// JSON projection error while diffing or planning.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
