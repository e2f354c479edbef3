//! Error types for drivegate.

use thiserror::Error;

use crate::crypto::CipherError;

/// Common error type for drivegate.
///
/// Variants carry owned strings rather than source errors so results can be
/// shared between concurrent waiters of a single upstream call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Object or path component absent.
    #[error("{0} not found")]
    NotFound(String),

    /// A virtual path segment did not match any child of its folder.
    #[error("path segment {index} not found")]
    SegmentNotFound {
        /// Position of the offending segment; the first segment is 1.
        index: usize,
    },

    /// Missing, invalid or expired access token.
    #[error("access denied")]
    Unauthorized,

    /// Submitted folder password did not verify.
    #[error("invalid password")]
    InvalidPassword,

    /// A range was requested but the upstream cannot serve one.
    #[error("range requests are not supported for this object")]
    RangeNotSupported,

    /// The requested range lies outside the object.
    #[error("range not satisfiable for object of {size} bytes")]
    RangeNotSatisfiable {
        /// Total object size in bytes.
        size: u64,
    },

    /// Malformed client input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream call exceeded its time budget.
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// Upstream failed or returned an unusable response.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Opaque token failed to decrypt.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Anything else that should never reach a client verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether an idempotent read that failed this way may be attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamTimeout(_) | GatewayError::UpstreamUnavailable(_)
        )
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(e.to_string())
    }
}

/// Result type alias for drivegate operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
