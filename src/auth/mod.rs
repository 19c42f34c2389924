//! Signing and verification primitives.
//!
//! - [`hmac`]: HMAC-SHA256 helpers with constant-time comparison
//! - [`NonceSource`] / [`OsNonceGenerator`]: installation state tokens
//! - [`SessionVerifier`]: bearer session-token verification
//!
//! # Example
//!
//! ```rust
//! use shopify_app::auth::{SessionError, SessionVerifier};
//! use shopify_app::{ApiKey, ApiSecretKey};
//!
//! let verifier = SessionVerifier::new(
//!     ApiKey::new("api-key").unwrap(),
//!     ApiSecretKey::new("secret").unwrap(),
//! );
//! assert_eq!(verifier.verify(None), Err(SessionError::MissingToken));
//! ```

pub mod hmac;
mod nonce;
mod session_token;

pub use nonce::{NonceSource, OsNonceGenerator, FALLBACK_NONCE};
pub use session_token::{SessionClaims, SessionError, SessionVerifier, VerifiedSession};
