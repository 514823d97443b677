//! Defines the custom error type for the `sign-kit` crate.

use crate::storage::container::ContainerError;
use thiserror::Error;

/// The main error type for the `sign-kit` crate.
///
/// Verification mismatch is not an error: `finalize_verify` and
/// `SignatureService::verify` report it as `Ok(false)`. An `Err` from those
/// operations always means verification could not be attempted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key container error: {0}")]
    Container(#[from] ContainerError),

    #[error("unsupported signature algorithm: {name} (provider: {provider:?})")]
    UnsupportedAlgorithm {
        name: String,
        provider: Option<String>,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature operation failed: {0}")]
    Signature(String),

    #[error("precondition violated: {0}")]
    Precondition(&'static str),
}
