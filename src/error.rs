//! Configuration error types.
//!
//! Every validated newtype and the [`AppConfig`](crate::AppConfig) builder
//! return `Result<T, ConfigError>` so a misconfigured deployment fails at
//! startup instead of on the first install attempt.
//!
//! # Example
//!
//! ```rust
//! use shopify_app::{ApiKey, ConfigError};
//!
//! let result = ApiKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
//! ```

use thiserror::Error;

/// Errors that can occur while building or loading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Shopify API key.")]
    EmptyApiKey,

    /// API secret key cannot be empty.
    #[error("API secret key cannot be empty. Please provide a valid Shopify API secret key.")]
    EmptyApiSecretKey,

    /// Requested scopes cannot be empty.
    #[error("Scopes cannot be empty. Provide a comma-separated list such as 'read_products'.")]
    EmptyScopes,

    /// Store name is not a valid host name.
    #[error("Invalid store name '{name}'. Expected a host name such as 'my-store.myshopify.com'.")]
    InvalidStoreName {
        /// The rejected store name.
        name: String,
    },

    /// API version is invalid.
    #[error("Invalid API version '{version}'. Expected format: 'YYYY-MM' (e.g., '2022-07') or 'unstable'.")]
    InvalidApiVersion {
        /// The invalid version string that was provided.
        version: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// Host URL is invalid.
    #[error("Invalid host URL '{url}'. Please provide a valid URL with scheme (e.g., 'https://myapp.example.com').")]
    InvalidHostUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A required environment variable is not set.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the variable.
        name: &'static str,
    },

    /// An environment variable is set but cannot be parsed.
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_store_name_error_message() {
        let error = ConfigError::InvalidStoreName {
            name: "bad store!".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("bad store!"));
        assert!(message.contains("Expected a host name"));
    }

    #[test]
    fn test_missing_required_field_error_message() {
        let error = ConfigError::MissingRequiredField { field: "api_key" };
        let message = error.to_string();
        assert!(message.contains("api_key"));
        assert!(message.contains("must be set"));
    }

    #[test]
    fn test_env_errors_name_the_variable() {
        let missing = ConfigError::MissingEnvVar {
            name: "SHOPIFY_API_KEY",
        };
        assert!(missing.to_string().contains("SHOPIFY_API_KEY"));

        let invalid = ConfigError::InvalidEnvVar {
            name: "BACKEND_PORT",
            reason: "invalid digit found in string".to_string(),
        };
        assert!(invalid.to_string().contains("BACKEND_PORT"));
        assert!(invalid.to_string().contains("invalid digit"));
    }
}
