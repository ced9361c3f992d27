//! Error types for outbound calls.
//!
//! Every failure mode of a remote call collapses into [`FetchError`]. Callers
//! higher up the stack never branch on the variant; the distinctions exist so
//! logs say what actually went wrong.

use thiserror::Error;

/// Errors that can occur while executing a single remote call.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// The request exceeded the client default or per-call timeout.
    #[error("request timeout")]
    Timeout,

    /// The endpoint could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint answered with a non-success status code.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// The response body could not be read off the wire.
    #[error("response body error: {0}")]
    Body(String),

    /// The response arrived but the extractor found no usable value in it.
    #[error("extraction failed: {0}")]
    Extract(String),

    /// The shared HTTP client could not be constructed.
    #[error("client build failed: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Returns true if the failure happened before any response arrived.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionFailed(_) | Self::Body(_)
        )
    }

    /// Returns the HTTP status code if the endpoint answered with one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(code, _) => Some(*code),
            _ => None,
        }
    }
}
