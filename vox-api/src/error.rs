//! Error types for vox-api.

use thiserror::Error;

use vox_core::ResourceKind;

/// All errors that can arise from talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// A response body failed its declared shape. Fatal for required
    /// listings; the caller decides for optional ones.
    #[error("failed to decode {kind} response: {source}")]
    Decode {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
}
