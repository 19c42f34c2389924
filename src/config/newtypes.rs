//! Validated newtype wrappers for configuration values.
//!
//! Each wrapper validates its contents on construction, so the rest of the
//! crate never has to re-check a raw string.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A validated Shopify API key (the app's OAuth client id).
///
/// # Example
///
/// ```rust
/// use shopify_app::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated Shopify API secret key.
///
/// The secret signs session tokens and OAuth callbacks, so its `Debug` output
/// is masked as `ApiSecretKey(*****)`.
///
/// ```rust
/// use shopify_app::ApiSecretKey;
///
/// let secret = ApiSecretKey::new("my-secret").unwrap();
/// assert_eq!(format!("{:?}", secret), "ApiSecretKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecretKey(String);

impl ApiSecretKey {
    /// Creates a new validated API secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiSecretKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiSecretKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiSecretKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecretKey(*****)")
    }
}

/// The scope string requested during installation.
///
/// The platform echoes granted scopes back in the token exchange response and
/// the handshake compares that echo verbatim against this value, so the string
/// is kept exactly as configured (outer whitespace aside).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthScopes(String);

impl AuthScopes {
    /// Creates a scope string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyScopes`] if nothing but whitespace is given.
    pub fn new(scopes: impl Into<String>) -> Result<Self, ConfigError> {
        let scopes = scopes.into();
        let scopes = scopes.trim();
        if scopes.is_empty() {
            return Err(ConfigError::EmptyScopes);
        }
        Ok(Self(scopes.to_string()))
    }

    /// Returns `true` when `granted` is exactly the configured scope string.
    #[must_use]
    pub fn matches(&self, granted: &str) -> bool {
        self.0 == granted
    }
}

impl AsRef<str> for AuthScopes {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AuthScopes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A merchant store's host name, the natural key of a store record.
///
/// Store names are host names such as `my-store.myshopify.com`, kept exactly
/// as given: no case folding, trimming or rewriting to the `myshopify.com`
/// domain, so custom test hosts like `shop.example.com` are accepted too.
///
/// ```rust
/// use shopify_app::StoreName;
///
/// let store = StoreName::new("My-Store.myshopify.com").unwrap();
/// assert_eq!(store.as_ref(), "My-Store.myshopify.com");
/// assert!(StoreName::new("not a store").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreName(String);

impl StoreName {
    /// Creates a validated store name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidStoreName`] if the value is not a plain
    /// host name.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name: String = name.into();

        let valid = !name.is_empty()
            && name.split('.').all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-')
            });

        if !valid {
            return Err(ConfigError::InvalidStoreName { name });
        }
        Ok(Self(name))
    }

    /// Returns the store's `https://` origin.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl AsRef<str> for StoreName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StoreName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StoreName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// An absolute `http`/`https` base URL with no trailing slash.
///
/// Used for the app's public base URL (from which the OAuth callback and the
/// uninstall webhook address are derived) and for the optional platform API
/// host override.
///
/// ```rust
/// use shopify_app::HostUrl;
///
/// let url = HostUrl::new("https://app.example.com/").unwrap();
/// assert_eq!(url.as_ref(), "https://app.example.com");
/// assert_eq!(url.join("/auth/callback"), "https://app.example.com/auth/callback");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostUrl(String);

impl HostUrl {
    /// Creates a validated host URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostUrl`] if the value does not parse as
    /// an absolute `http`/`https` URL with a host.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = url.into();
        let trimmed = raw.trim().trim_end_matches('/');

        let parsed = url::Url::parse(trimmed)
            .map_err(|_| ConfigError::InvalidHostUrl { url: raw.clone() })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ConfigError::InvalidHostUrl { url: raw });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Appends an absolute path to the base URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.0)
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> Option<String> {
        url::Url::parse(&self.0)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

impl AsRef<str> for HostUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
