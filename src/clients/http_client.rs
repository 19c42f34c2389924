//! HTTP client for platform communication.
//!
//! [`HttpClient`] wraps a pooled `reqwest` client and owns the retry
//! behavior, so callers above it issue a request once and see either the
//! final response or a single error.

use std::collections::HashMap;
use std::time::Duration;

use crate::clients::errors::{HttpError, HttpResponseError, MaxHttpRetriesExceededError};
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;
use crate::config::AppConfig;

/// Crate version from Cargo.toml.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bounded retry policy for outbound calls.
///
/// Responses with status 429 or 5xx, and connection or timeout failures, are
/// retried until `max_tries` attempts have been made. The wait before attempt
/// `n + 1` is `base_delay * 2^(n-1)`, or the server's `Retry-After` on a 429,
/// and never exceeds `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_tries: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that sends each request exactly once.
    #[must_use]
    pub const fn no_retries() -> Self {
        Self {
            max_tries: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Returns the wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1 << exponent);
        retry_after.unwrap_or(backoff).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP client for platform requests.
///
/// One instance is shared by every request handler; the underlying
/// connection pool is reused across stores.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    default_headers: HashMap<String, String>,
}

// Verify HttpClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpClient>();
};

impl HttpClient {
    /// Creates a client using the retry policy and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the TLS backend cannot be initialised.
    pub fn new(config: &AppConfig) -> Result<Self, HttpError> {
        Self::with_policy(*config.retry(), config.request_timeout())
    }

    /// Creates a client with an explicit retry policy and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the TLS backend cannot be initialised.
    pub fn with_policy(retry: RetryPolicy, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;

        let mut default_headers = HashMap::new();
        default_headers.insert(
            "User-Agent".to_string(),
            format!("shopify-app-backend v{APP_VERSION}"),
        );
        default_headers.insert("Accept".to_string(), "application/json".to_string());

        Ok(Self {
            client,
            retry,
            default_headers,
        })
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub const fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// Sends a request, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if:
    /// - the request fails validation (`InvalidRequest`)
    /// - the transport fails on the last allowed attempt (`Network`)
    /// - a non-retryable non-2xx response is received (`Response`)
    /// - every attempt received a retryable status (`MaxRetries`)
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        request.verify()?;

        let max_tries = self.retry.max_tries.max(1);
        let mut tries: u32 = 0;
        loop {
            tries += 1;

            let mut req_builder = self
                .client
                .request(request.http_method.as_reqwest(), &request.url);
            for (key, value) in &self.default_headers {
                req_builder = req_builder.header(key.as_str(), value.as_str());
            }
            for (key, value) in &request.extra_headers {
                req_builder = req_builder.header(key.as_str(), value.as_str());
            }
            if !request.query.is_empty() {
                req_builder = req_builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                req_builder = req_builder.json(body);
            }

            let res = match req_builder.send().await {
                Ok(res) => res,
                Err(err) if Self::is_transient(&err) && tries < max_tries => {
                    let delay = self.retry.delay_for(tries, None);
                    tracing::warn!(
                        method = %request.http_method,
                        url = %request.url,
                        attempt = tries,
                        ?delay,
                        error = %err,
                        "transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err) => return Err(HttpError::Network(err)),
            };

            let code = res.status().as_u16();
            let headers = Self::parse_response_headers(res.headers());
            let body_text = match res.text().await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(
                        url = %request.url,
                        status = code,
                        error = %err,
                        "failed to read response body"
                    );
                    return Err(HttpError::Network(err));
                }
            };
            let response = HttpResponse::new(code, headers, HttpResponse::parse_body(&body_text));

            if let Some(reason) = response.deprecation_reason() {
                tracing::warn!(url = %request.url, reason, "deprecated platform endpoint");
            }

            if response.is_ok() {
                return Ok(response);
            }

            let message = response.error_message();
            let error_reference = response.request_id().map(String::from);

            if !response.is_retryable() || max_tries == 1 {
                return Err(HttpError::Response(HttpResponseError {
                    code,
                    message,
                    error_reference,
                }));
            }

            if tries >= max_tries {
                return Err(HttpError::MaxRetries(MaxHttpRetriesExceededError {
                    code,
                    tries,
                    message,
                    error_reference,
                }));
            }

            let retry_after = if code == 429 {
                response.retry_after()
            } else {
                None
            };
            let delay = self.retry.delay_for(tries, retry_after);
            tracing::warn!(
                method = %request.http_method,
                url = %request.url,
                status = code,
                attempt = tries,
                ?delay,
                "retryable platform response"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn is_transient(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }

    fn parse_response_headers(
        headers: &reqwest::header::HeaderMap,
    ) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HttpMethod;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy {
            max_tries,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn client(max_tries: u32) -> HttpClient {
        HttpClient::with_policy(fast_policy(max_tries), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_tries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6, None), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_is_honored_but_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_default_headers() {
        let client = client(1);
        assert_eq!(
            client.default_headers().get("Accept"),
            Some(&"application/json".to_string())
        );
        assert!(client
            .default_headers()
            .get("User-Agent")
            .unwrap()
            .contains(APP_VERSION));
    }

    #[tokio::test]
    async fn test_sends_query_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(query_param("code", "abc"))
            .and(wiremock::matchers::header("X-Shopify-Access-Token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::builder(
            HttpMethod::Post,
            format!("{}/admin/oauth/access_token", server.uri()),
        )
        .query_param("code", "abc")
        .header("X-Shopify-Access-Token", "tok")
        .build()
        .unwrap();

        let response = client(1).request(request).await.unwrap();
        assert_eq!(response.code, 200);
        assert_eq!(response.body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1})))
            .mount(&server)
            .await;

        let request = HttpRequest::builder(HttpMethod::Get, format!("{}/flaky", server.uri()))
            .build()
            .unwrap();
        let response = client(3).request(request).await.unwrap();
        assert_eq!(response.body["count"], json!(1));
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "0.01")
                    .set_body_json(json!({"errors": "Exceeded 2 calls per second"})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let request = HttpRequest::builder(HttpMethod::Get, format!("{}/throttled", server.uri()))
            .build()
            .unwrap();
        let result = client(3).request(request).await;

        match result {
            Err(HttpError::MaxRetries(e)) => {
                assert_eq!(e.code, 429);
                assert_eq!(e.tries, 3);
                assert!(e.message.contains("Exceeded 2 calls"));
            }
            other => panic!("expected MaxRetries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": "Not Found"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::builder(HttpMethod::Get, format!("{}/missing", server.uri()))
            .build()
            .unwrap();
        let result = client(3).request(request).await;

        assert!(matches!(
            result,
            Err(HttpError::Response(HttpResponseError { code: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn test_truncated_body_surfaces_as_network_error() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{\"count\"")
                .unwrap();
        });

        let request = HttpRequest::builder(HttpMethod::Get, format!("http://{addr}/count"))
            .build()
            .unwrap();
        let result = client(1).request(request).await;
        server.join().unwrap();

        assert!(matches!(result, Err(HttpError::Network(_))));
    }

    #[tokio::test]
    async fn test_connection_failure_surfaces_as_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let request = HttpRequest::builder(HttpMethod::Get, "http://127.0.0.1:9/unreachable")
            .build()
            .unwrap();
        let result = client(2).request(request).await;
        assert!(matches!(result, Err(HttpError::Network(_))));
    }
}
