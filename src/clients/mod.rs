//! Outbound HTTP layer.
//!
//! - [`HttpClient`]: pooled async client with bounded retries
//! - [`HttpRequest`] / [`HttpRequestBuilder`]: request description
//! - [`HttpResponse`]: status, lowercased headers and parsed body
//! - [`RetryPolicy`]: attempt budget and backoff
//!
//! # Retry Behavior
//!
//! - **429**: waits for `Retry-After` when present, otherwise backs off
//! - **5xx** and connection/timeout failures: exponential backoff
//! - **other 4xx**: returned immediately
//!
//! Every wait is capped by [`RetryPolicy::max_delay`]. Retries are invisible
//! to callers: they see the final response or a single [`HttpError`].

mod errors;
mod http_client;
mod http_request;
mod http_response;

pub use errors::{HttpError, HttpResponseError, InvalidHttpRequestError, MaxHttpRetriesExceededError};
pub use http_client::{HttpClient, RetryPolicy, APP_VERSION};
pub use http_request::{HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::HttpResponse;
