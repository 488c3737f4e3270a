//! Error types for formmat

use crate::backend::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by the sparse backend, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported element: {0}")]
    UnsupportedElement(String),

    #[error("invalid sub-domain: {0}")]
    InvalidSubDomain(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
