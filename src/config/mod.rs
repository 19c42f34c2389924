//! Application configuration.
//!
//! [`AppConfig`] is built once at startup, either through
//! [`AppConfig::builder`] or from the environment with
//! [`AppConfig::from_env`], and then shared read-only by every request.
//!
//! # Example
//!
//! ```rust
//! use shopify_app::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .scopes("write_products,read_products".parse().unwrap())
//!     .host(HostUrl::new("https://app.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.callback_url(), "https://app.example.com/auth/callback");
//! ```

mod newtypes;
mod version;

pub use newtypes::{ApiKey, ApiSecretKey, AuthScopes, HostUrl, StoreName};
pub use version::ApiVersion;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::clients::RetryPolicy;
use crate::error::ConfigError;

/// Path on the app that receives the OAuth callback.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Path on the app that receives the `app/uninstalled` webhook.
pub const UNINSTALL_PATH: &str = "/uninstall";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "debug";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Complete configuration of the app backend.
///
/// `AppConfig` is `Clone + Send + Sync`. Its `Debug` output redacts the
/// database URL, and the API secret is masked by [`ApiSecretKey`].
#[derive(Clone)]
pub struct AppConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    scopes: AuthScopes,
    host: HostUrl,
    api_version: ApiVersion,
    api_host: Option<HostUrl>,
    retry: RetryPolicy,
    request_timeout: Duration,
    verify_callback_hmac: bool,
    verify_webhook_hmac: bool,
    send_details_on_internal_error: bool,
    port: u16,
    database_url: Option<String>,
    log_level: String,
    log_format: LogFormat,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// See [`AppConfig::from_lookup`] for the recognised variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Required: `SHOPIFY_API_KEY`, `SHOPIFY_API_SECRET`, `SCOPES`, `HOST`.
    ///
    /// Optional: `SHOPIFY_API_VERSION`, `SHOPIFY_API_HOST`,
    /// `SHOPIFY_VERIFY_CALLBACK_HMAC`, `SHOPIFY_VERIFY_WEBHOOK_HMAC`,
    /// `HTTP_MAX_TRIES`, `HTTP_RETRY_BASE_DELAY_MS`, `HTTP_REQUEST_TIMEOUT_SECS`,
    /// `HTTP_SEND_DETAILS_ON_INTERNAL_ERROR`, `BACKEND_PORT`, `DATABASE_URL`
    /// (or `POSTGRES_HOST`/`POSTGRES_USER`/`POSTGRES_PASSWORD`/`POSTGRES_DATABASE`),
    /// `LOG_LEVEL`, `LOG_FORMAT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let mut builder = Self::builder()
            .api_key(ApiKey::new(env.required("SHOPIFY_API_KEY")?)?)
            .api_secret_key(ApiSecretKey::new(env.required("SHOPIFY_API_SECRET")?)?)
            .scopes(AuthScopes::new(env.required("SCOPES")?)?)
            .host(HostUrl::new(env.required("HOST")?)?)
            .verify_callback_hmac(env.parsed("SHOPIFY_VERIFY_CALLBACK_HMAC", false)?)
            .verify_webhook_hmac(env.parsed("SHOPIFY_VERIFY_WEBHOOK_HMAC", false)?)
            .send_details_on_internal_error(
                env.parsed("HTTP_SEND_DETAILS_ON_INTERNAL_ERROR", true)?,
            )
            .port(env.parsed("BACKEND_PORT", DEFAULT_PORT)?)
            .log_level(env.optional("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()))
            .log_format(env.parsed("LOG_FORMAT", LogFormat::Text)?)
            .request_timeout(Duration::from_secs(
                env.parsed("HTTP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT.as_secs())?,
            ));

        if let Some(version) = env.optional("SHOPIFY_API_VERSION") {
            builder = builder.api_version(version.parse()?);
        }
        if let Some(api_host) = env.optional("SHOPIFY_API_HOST") {
            builder = builder.api_host(HostUrl::new(api_host)?);
        }

        let defaults = RetryPolicy::default();
        let max_tries: u32 = env.parsed("HTTP_MAX_TRIES", defaults.max_tries)?;
        let base_delay_ms: u64 = env.parsed(
            "HTTP_RETRY_BASE_DELAY_MS",
            u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
        )?;
        builder = builder.retry(RetryPolicy {
            max_tries: max_tries.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
            ..defaults
        });

        if let Some(url) = env.database_url() {
            builder = builder.database_url(url);
        }

        builder.build()
    }

    /// Returns the API key (OAuth client id).
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key (OAuth client secret).
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the requested scopes.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the app's public base URL.
    #[must_use]
    pub const fn host(&self) -> &HostUrl {
        &self.host
    }

    /// Returns the Admin API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the platform host override, if configured.
    ///
    /// When set, server-to-server calls for every store are sent to this base
    /// URL instead of `https://{store}`. Merchant-facing redirect URLs are not
    /// affected.
    #[must_use]
    pub const fn api_host(&self) -> Option<&HostUrl> {
        self.api_host.as_ref()
    }

    /// Returns the outbound retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the per-request timeout for outbound calls.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns whether the OAuth callback `hmac` parameter is checked.
    #[must_use]
    pub const fn verify_callback_hmac(&self) -> bool {
        self.verify_callback_hmac
    }

    /// Returns whether the uninstall webhook signature is checked.
    #[must_use]
    pub const fn verify_webhook_hmac(&self) -> bool {
        self.verify_webhook_hmac
    }

    /// Returns whether server error responses carry the underlying error text.
    #[must_use]
    pub const fn send_details_on_internal_error(&self) -> bool {
        self.send_details_on_internal_error
    }

    /// Returns the listen port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the Postgres connection URL, if configured.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Returns the default log filter directive.
    #[must_use]
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Returns the log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Absolute URL the platform redirects to after authorization.
    #[must_use]
    pub fn callback_url(&self) -> String {
        self.host.join(CALLBACK_PATH)
    }

    /// Address registered for the `app/uninstalled` webhook of `store`.
    #[must_use]
    pub fn uninstall_webhook_url(&self, store: &StoreName) -> String {
        format!(
            "{}?shop={}",
            self.host.join(UNINSTALL_PATH),
            urlencoding::encode(store.as_ref())
        )
    }

    /// Base URL for server-to-server calls concerning `store`.
    #[must_use]
    pub fn store_api_base(&self, store: &StoreName) -> String {
        self.api_host
            .as_ref()
            .map_or_else(|| store.origin(), |host| host.as_ref().to_string())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret_key", &self.api_secret_key)
            .field("scopes", &self.scopes)
            .field("host", &self.host)
            .field("api_version", &self.api_version)
            .field("api_host", &self.api_host)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("verify_callback_hmac", &self.verify_callback_hmac)
            .field("verify_webhook_hmac", &self.verify_webhook_hmac)
            .field(
                "send_details_on_internal_error",
                &self.send_details_on_internal_error,
            )
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for [`AppConfig`].
///
/// `api_key`, `api_secret_key`, `scopes` and `host` are required.
///
/// # Defaults
///
/// - `api_version`: `2022-07`
/// - `retry`: [`RetryPolicy::default`]
/// - `request_timeout`: 30 seconds
/// - `verify_callback_hmac` / `verify_webhook_hmac`: `false`
/// - `send_details_on_internal_error`: `true`
/// - `port`: 8080
/// - `log_level`: `debug`
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    scopes: Option<AuthScopes>,
    host: Option<HostUrl>,
    api_version: Option<ApiVersion>,
    api_host: Option<HostUrl>,
    retry: Option<RetryPolicy>,
    request_timeout: Option<Duration>,
    verify_callback_hmac: bool,
    verify_webhook_hmac: bool,
    send_details_on_internal_error: Option<bool>,
    port: Option<u16>,
    database_url: Option<String>,
    log_level: Option<String>,
    log_format: LogFormat,
}

impl AppConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the requested scopes (required).
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the app's public base URL (required).
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the Admin API version.
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Routes server-to-server platform calls through `host`.
    #[must_use]
    pub fn api_host(mut self, host: HostUrl) -> Self {
        self.api_host = Some(host);
        self
    }

    /// Sets the outbound retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the per-request timeout for outbound calls.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enables the OAuth callback `hmac` check.
    #[must_use]
    pub const fn verify_callback_hmac(mut self, enabled: bool) -> Self {
        self.verify_callback_hmac = enabled;
        self
    }

    /// Enables the uninstall webhook signature check.
    #[must_use]
    pub const fn verify_webhook_hmac(mut self, enabled: bool) -> Self {
        self.verify_webhook_hmac = enabled;
        self
    }

    /// Sets whether server error responses include details.
    #[must_use]
    pub const fn send_details_on_internal_error(mut self, enabled: bool) -> Self {
        self.send_details_on_internal_error = Some(enabled);
        self
    }

    /// Sets the listen port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the Postgres connection URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Sets the default log filter directive.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Sets the log output format.
    #[must_use]
    pub const fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Builds the [`AppConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if a required field is
    /// not set.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self
            .api_secret_key
            .ok_or(ConfigError::MissingRequiredField {
                field: "api_secret_key",
            })?;
        let scopes = self
            .scopes
            .ok_or(ConfigError::MissingRequiredField { field: "scopes" })?;
        let host = self
            .host
            .ok_or(ConfigError::MissingRequiredField { field: "host" })?;

        Ok(AppConfig {
            api_key,
            api_secret_key,
            scopes,
            host,
            api_version: self.api_version.unwrap_or_default(),
            api_host: self.api_host,
            retry: self.retry.unwrap_or_default(),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            verify_callback_hmac: self.verify_callback_hmac,
            verify_webhook_hmac: self.verify_webhook_hmac,
            send_details_on_internal_error: self.send_details_on_internal_error.unwrap_or(true),
            port: self.port.unwrap_or(DEFAULT_PORT),
            database_url: self.database_url,
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format: self.log_format,
        })
    }
}

/// Typed access to configuration variables.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or(ConfigError::MissingEnvVar { name })
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional(name).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar {
                    name,
                    reason: e.to_string(),
                })
        })
    }

    fn database_url(&self) -> Option<String> {
        if let Some(url) = self.optional("DATABASE_URL") {
            return Some(url);
        }
        let host = self.optional("POSTGRES_HOST")?;
        let user = self.optional("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string());
        let password = self.optional("POSTGRES_PASSWORD").unwrap_or_default();
        let database = self
            .optional("POSTGRES_DATABASE")
            .unwrap_or_else(|| "postgres".to_string());
        Some(format!(
            "postgres://{}:{}@{host}/{database}",
            urlencoding::encode(&user),
            urlencoding::encode(&password)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SHOPIFY_API_KEY", "test-api-key"),
        ("SHOPIFY_API_SECRET", "test-secret"),
        ("SCOPES", "write_products,read_products"),
        ("HOST", "https://app.example.com"),
    ];

    fn create_test_config() -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .scopes("write_products".parse().unwrap())
            .host(HostUrl::new("https://app.example.com").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_fields() {
        let result = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField {
                field: "api_secret_key"
            })
        ));

        let result = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .scopes("read_products".parse().unwrap())
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "host" })
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let config = create_test_config();
        assert_eq!(config.api_version(), &ApiVersion::default());
        assert_eq!(config.port(), 8080);
        assert!(config.send_details_on_internal_error());
        assert!(!config.verify_callback_hmac());
        assert!(!config.verify_webhook_hmac());
        assert!(config.api_host().is_none());
        assert!(config.database_url().is_none());
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_derived_urls() {
        let config = create_test_config();
        let store = StoreName::new("shop.example.com").unwrap();

        assert_eq!(config.callback_url(), "https://app.example.com/auth/callback");
        assert_eq!(
            config.uninstall_webhook_url(&store),
            "https://app.example.com/uninstall?shop=shop.example.com"
        );
        assert_eq!(config.store_api_base(&store), "https://shop.example.com");
    }

    #[test]
    fn test_api_host_override_keeps_scheme() {
        let config = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .scopes("read_products".parse().unwrap())
            .host(HostUrl::new("https://app.example.com").unwrap())
            .api_host(HostUrl::new("http://127.0.0.1:9999").unwrap())
            .build()
            .unwrap();
        let store = StoreName::new("shop.example.com").unwrap();
        assert_eq!(config.store_api_base(&store), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("very-secret").unwrap())
            .scopes("read_products".parse().unwrap())
            .host(HostUrl::new("https://app.example.com").unwrap())
            .database_url("postgres://user:hunter2@db/app")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_lookup_reads_required_and_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.api_key().as_ref(), "test-api-key");
        assert_eq!(config.scopes().as_ref(), "write_products,read_products");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.retry().max_tries, RetryPolicy::default().max_tries);
    }

    #[test]
    fn test_from_lookup_reports_missing_variable() {
        let result = AppConfig::from_lookup(lookup(&REQUIRED[1..]));
        assert!(matches!(
            result,
            Err(ConfigError::MissingEnvVar {
                name: "SHOPIFY_API_KEY"
            })
        ));
    }

    #[test]
    fn test_from_lookup_parses_optional_values() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("BACKEND_PORT", "9090"),
            ("HTTP_SEND_DETAILS_ON_INTERNAL_ERROR", "false"),
            ("SHOPIFY_API_VERSION", "2022-04"),
            ("SHOPIFY_VERIFY_CALLBACK_HMAC", "true"),
            ("HTTP_MAX_TRIES", "5"),
            ("LOG_FORMAT", "json"),
            ("POSTGRES_HOST", "db:5432"),
            ("POSTGRES_USER", "app"),
            ("POSTGRES_PASSWORD", "p@ss"),
            ("POSTGRES_DATABASE", "stores"),
        ]);
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.port(), 9090);
        assert!(!config.send_details_on_internal_error());
        assert_eq!(config.api_version().to_string(), "2022-04");
        assert!(config.verify_callback_hmac());
        assert_eq!(config.retry().max_tries, 5);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(
            config.database_url(),
            Some("postgres://app:p%40ss@db:5432/stores")
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("BACKEND_PORT", "eighty"));
        let result = AppConfig::from_lookup(lookup(&vars));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar {
                name: "BACKEND_PORT",
                ..
            })
        ));
    }
}
