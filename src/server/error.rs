//! HTTP error responses.
//!
//! Client errors become `422 {"message"}`, rejected session tokens and
//! webhook signatures `401 {"message"}`, and everything else
//! `500 {"message", "details"}` with `details` only when configured.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::install::InstallError;

/// An error ready to be sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    /// The request query could not be used.
    #[must_use]
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "invalid request query".to_string(),
            details: Some(reason.into()),
        }
    }

    /// A webhook delivery failed its HMAC check.
    #[must_use]
    pub fn invalid_webhook_signature() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid webhook signature".to_string(),
            details: None,
        }
    }

    /// A handler panicked.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
            details: None,
        }
    }

    /// Classifies an [`InstallError`].
    ///
    /// `action` names the failed operation in server error messages.
    #[must_use]
    pub fn from_install(error: &InstallError, action: &str, send_details: bool) -> Self {
        match error {
            InstallError::Session(e) => {
                tracing::info!(error = %e, "session token rejected");
                Self {
                    status: StatusCode::UNAUTHORIZED,
                    message: e.to_string(),
                    details: None,
                }
            }
            e if e.is_expected() => {
                tracing::info!(error = %e, "client error");
                Self {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    message: e.to_string(),
                    details: None,
                }
            }
            e => {
                tracing::error!(error = %e, "failed to {action}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: format!("failed to {action}"),
                    details: send_details.then(|| e.to_string()),
                }
            }
        }
    }

    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The response message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: &self.message,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Turns a caught panic into a 500 response.
#[allow(clippy::needless_pass_by_value)] // signature required by CatchPanicLayer
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    ApiError::internal().into_response()
}
