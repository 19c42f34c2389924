//! Error types for outbound HTTP calls to the platform.
//!
//! - [`HttpResponseError`]: a non-2xx response that is not retried
//! - [`MaxHttpRetriesExceededError`]: retryable responses until the attempt budget ran out
//! - [`InvalidHttpRequestError`]: a request rejected before it was sent
//! - [`HttpError`]: the union of the above plus transport failures

use thiserror::Error;

/// A non-successful response from the platform.
///
/// `message` holds a compact JSON rendering of the error fields found in the
/// response body (`errors`, `error`, `error_description`) or the raw body when
/// it is not JSON.
#[derive(Debug, Error)]
#[error("status {code}: {message}")]
pub struct HttpResponseError {
    /// The HTTP status code of the response.
    pub code: u16,
    /// Serialized error message.
    pub message: String,
    /// Value of the `X-Request-Id` response header, if any.
    pub error_reference: Option<String>,
}

/// Returned when every allowed attempt received a retryable response.
#[derive(Debug, Error)]
#[error("Exceeded maximum retry count of {tries}. Last status {code}: {message}")]
pub struct MaxHttpRetriesExceededError {
    /// Status code of the last response.
    pub code: u16,
    /// Number of attempts made.
    pub tries: u32,
    /// Serialized error message from the last response.
    pub message: String,
    /// Value of the `X-Request-Id` response header, if any.
    pub error_reference: Option<String>,
}

/// A request that failed validation before being sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// The target URL does not parse as an absolute URL.
    #[error("Invalid request URL '{url}'.")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// A header name or value contains characters HTTP does not allow.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The rejected header name.
        name: String,
    },
}

/// Unified error type for outbound HTTP calls.
#[derive(Debug, Error)]
pub enum HttpError {
    /// A non-2xx response that was not retried.
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// Retryable responses exhausted the attempt budget.
    #[error(transparent)]
    MaxRetries(#[from] MaxHttpRetriesExceededError),

    /// Request validation failed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// Network, TLS, or timeout failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl HttpError {
    /// Returns the response status code, if a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response(e) => Some(e.code),
            Self::MaxRetries(e) => Some(e.code),
            Self::InvalidRequest(_) | Self::Network(_) => None,
        }
    }
}

// Verify HttpError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpError>();
};
