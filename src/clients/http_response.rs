//! Platform HTTP responses.

use std::collections::HashMap;
use std::time::Duration;

/// A response received from the platform.
///
/// Header names are lowercased. The body is parsed as JSON when possible;
/// any other payload is kept as a JSON string so error messages can still
/// carry it.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub code: u16,
    /// Response headers (a header may repeat).
    pub headers: HashMap<String, Vec<String>>,
    /// The response body.
    pub body: serde_json::Value,
}

impl HttpResponse {
    /// Creates a response from already-collected parts.
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, body: serde_json::Value) -> Self {
        Self {
            code,
            headers,
            body,
        }
    }

    /// Parses a raw body into a JSON value.
    #[must_use]
    pub fn parse_body(text: &str) -> serde_json::Value {
        if text.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }

    /// Returns `true` for statuses worth another attempt (429 and 5xx).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code == 429 || self.code >= 500
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns the `X-Request-Id` header value, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-request-id")
    }

    /// Returns the `X-Shopify-API-Deprecated-Reason` header value, if present.
    #[must_use]
    pub fn deprecation_reason(&self) -> Option<&str> {
        self.header("x-shopify-api-deprecated-reason")
    }

    /// Returns the wait requested by a `Retry-After` header given in seconds.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Renders the error-relevant part of the body as compact JSON.
    #[must_use]
    pub fn error_message(&self) -> String {
        let mut error_body = serde_json::Map::new();

        for field in ["errors", "error", "error_description"] {
            if let Some(value) = self.body.get(field) {
                error_body.insert(field.to_string(), value.clone());
            }
        }
        if error_body.is_empty() {
            if let Some(raw) = self.body.as_str() {
                error_body.insert("body".to_string(), serde_json::json!(raw));
            }
        }
        if let Some(request_id) = self.request_id() {
            error_body.insert(
                "error_reference".to_string(),
                serde_json::json!(format!(
                    "If you report this error, please include this id: {request_id}."
                )),
            );
        }

        serde_json::to_string(&error_body).unwrap_or_else(|_| "{}".to_string())
    }
}
