//! Error types for platform operations.
//!
//! # Example
//!
//! ```rust
//! use shopify_app::platform::PlatformError;
//!
//! let error = PlatformError::InvalidRedirectedUrl;
//! assert_eq!(error.to_string(), "invalid redirected url");
//! assert!(error.is_expected());
//!
//! let error = PlatformError::UnexpectedStatus {
//!     expected: 201,
//!     status: 200,
//!     body: "{}".to_string(),
//! };
//! assert!(!error.is_expected());
//! ```

use crate::clients::HttpError;
use thiserror::Error;

/// Errors that can occur while talking to the platform.
///
/// Variants caused by what the caller sent are "expected" and surface as
/// client errors; everything else is a server-side failure.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The callback URL could not be parsed, its `state` did not match the
    /// stored nonce, or its `hmac` did not validate.
    #[error("invalid redirected url")]
    InvalidRedirectedUrl,

    /// The platform granted a scope set other than the requested one.
    #[error("allowed access scopes are different from requested")]
    ScopeMismatch {
        /// Scopes sent in the authorization request.
        requested: String,
        /// Scopes echoed back by the token exchange.
        granted: String,
    },

    /// A successful response carried a status other than the one the
    /// endpoint documents.
    #[error("unexpected status {status} (expected {expected}): {body}")]
    UnexpectedStatus {
        /// The documented status.
        expected: u16,
        /// The received status.
        status: u16,
        /// The response body.
        body: String,
    },

    /// A response body did not have the expected shape.
    #[error("failed to decode platform response: {0}")]
    Decode(String),

    /// The request failed at the HTTP layer.
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl PlatformError {
    /// Returns `true` for errors caused by the caller's input.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidRedirectedUrl | Self::ScopeMismatch { .. }
        )
    }
}

// Verify PlatformError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PlatformError>();
};
