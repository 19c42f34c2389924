//! Session token verification.
//!
//! Embedded app pages call the backend with an `Authorization: Bearer <jwt>`
//! header carrying a session token signed by the platform with the app's API
//! secret. [`SessionVerifier`] accepts the token only if all of these hold:
//!
//! 1. the header is exactly `Bearer <token>`
//! 2. the token has three dot-separated segments
//! 3. `exp` is strictly in the future and `nbf` is not in the future (no leeway)
//! 4. `iss` contains `dest`
//! 5. `aud` equals the API key
//! 6. the HS256 signature over `header.payload` matches, compared in constant time
//!
//! Claims are checked before the signature; both passes are mandatory.
//!
//! # Token Structure
//!
//! - `iss`: issuer (e.g., `https://shop.myshopify.com/admin`)
//! - `dest`: destination shop (e.g., `https://shop.myshopify.com`)
//! - `aud`: audience, the app's API key
//! - `sub`: subject, the merchant user id
//! - `exp` / `nbf` / `iat`: timestamps in seconds
//! - `jti`: token id
//! - `sid`: platform session id

use std::collections::HashSet;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::hmac;
use crate::config::{ApiKey, ApiSecretKey, AppConfig, StoreName};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionClaims {
    /// Issuer, the shop admin URL that issued the token.
    pub iss: String,
    /// Destination, the shop origin.
    pub dest: String,
    /// Audience, expected to be the app's API key.
    pub aud: String,
    /// Subject, the merchant user id.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Not-before time (Unix seconds). Absent means no lower bound.
    #[serde(default)]
    pub nbf: i64,
    /// Issued-at time (Unix seconds).
    #[serde(default)]
    pub iat: Option<i64>,
    /// Token id.
    #[serde(default)]
    pub jti: Option<String>,
    /// Platform session id.
    #[serde(default)]
    pub sid: Option<String>,
}

impl SessionClaims {
    /// Returns `dest` with one leading `https://` removed.
    #[must_use]
    pub fn shop(&self) -> &str {
        self.dest.strip_prefix("https://").unwrap_or(&self.dest)
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    /// The store the token was issued for.
    pub store_name: StoreName,
    /// The verified claims.
    pub claims: SessionClaims,
}

/// Reasons a session token is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No `Authorization` header was sent.
    #[error("missing auth token")]
    MissingToken,

    /// The header or the token does not have the expected shape.
    #[error("malformed auth token: {reason}")]
    MalformedToken {
        /// What is wrong with it.
        reason: String,
    },

    /// `exp` is not in the future.
    #[error("JWT token has expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("JWT token is not yet valid")]
    NotYetValid,

    /// `iss` does not contain `dest`.
    #[error("JWT token issuer does not match its destination")]
    IssuerMismatch,

    /// `aud` is not the app's API key.
    #[error("JWT token audience does not match the API key")]
    AudienceMismatch,

    /// The signature does not verify with the API secret.
    #[error("invalid JWT token signature")]
    InvalidSignature,

    /// `dest` does not name a valid store.
    #[error("JWT token destination '{dest}' is not a valid store")]
    InvalidDestination {
        /// The rejected destination.
        dest: String,
    },
}

/// Verifies session tokens against the app's credentials.
#[derive(Clone, Debug)]
pub struct SessionVerifier {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
}

impl SessionVerifier {
    /// Creates a verifier for the given credentials.
    #[must_use]
    pub const fn new(api_key: ApiKey, api_secret_key: ApiSecretKey) -> Self {
        Self {
            api_key,
            api_secret_key,
        }
    }

    /// Creates a verifier from the app configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_key().clone(), config.api_secret_key().clone())
    }

    /// Verifies an `Authorization` header value at the current time.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError`] for the first check that fails.
    pub fn verify(&self, authorization: Option<&str>) -> Result<VerifiedSession, SessionError> {
        self.verify_at(authorization, chrono::Utc::now().timestamp())
    }

    /// Verifies an `Authorization` header value at `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError`] for the first check that fails.
    pub fn verify_at(
        &self,
        authorization: Option<&str>,
        now: i64,
    ) -> Result<VerifiedSession, SessionError> {
        let token = Self::bearer_token(authorization)?;

        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(SessionError::MalformedToken {
                reason: format!("expected 3 segments, found {}", segments.len()),
            });
        };

        let claims = Self::decode_claims(token)?;
        self.check_claims(&claims, now)?;

        let signed = format!("{header}.{payload}");
        if !hmac::verify_base64url(signed.as_bytes(), signature, self.api_secret_key.as_ref()) {
            return Err(SessionError::InvalidSignature);
        }

        let store_name =
            StoreName::new(claims.shop()).map_err(|_| SessionError::InvalidDestination {
                dest: claims.dest.clone(),
            })?;

        Ok(VerifiedSession { store_name, claims })
    }

    fn bearer_token(authorization: Option<&str>) -> Result<&str, SessionError> {
        let header = authorization
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SessionError::MissingToken)?;

        let parts: Vec<&str> = header.split(' ').collect();
        match parts.as_slice() {
            [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
                Ok(*token)
            }
            _ => Err(SessionError::MalformedToken {
                reason: "expected 'Bearer <token>'".to_string(),
            }),
        }
    }

    /// Decodes the payload without checking the signature or any claim.
    fn decode_claims(token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::MalformedToken {
                reason: e.to_string(),
            })
    }

    fn check_claims(&self, claims: &SessionClaims, now: i64) -> Result<(), SessionError> {
        if claims.exp <= now {
            return Err(SessionError::Expired);
        }
        if claims.nbf > now {
            return Err(SessionError::NotYetValid);
        }
        if !claims.iss.contains(&claims.dest) {
            return Err(SessionError::IssuerMismatch);
        }
        if claims.aud != self.api_key.as_ref() {
            return Err(SessionError::AudienceMismatch);
        }
        Ok(())
    }
}

// Verify SessionVerifier is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionVerifier>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const NOW: i64 = 1_700_000_000;

    #[derive(Serialize)]
    struct TestJwtClaims {
        iss: String,
        dest: String,
        aud: String,
        sub: String,
        exp: i64,
        nbf: i64,
        iat: i64,
        jti: String,
        sid: String,
    }

    fn valid_claims() -> TestJwtClaims {
        TestJwtClaims {
            iss: "https://shop.example.com/admin".to_string(),
            dest: "https://shop.example.com".to_string(),
            aud: "test-api-key".to_string(),
            sub: "42".to_string(),
            exp: NOW + 60,
            nbf: NOW - 5,
            iat: NOW - 5,
            jti: "jwt-id".to_string(),
            sid: "session-id".to_string(),
        }
    }

    fn create_token(claims: &TestJwtClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> SessionVerifier {
        SessionVerifier::new(
            ApiKey::new("test-api-key").unwrap(),
            ApiSecretKey::new("test-secret").unwrap(),
        )
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn test_accepts_valid_token_and_strips_scheme() {
        let token = create_token(&valid_claims(), "test-secret");
        let session = verifier().verify_at(Some(&bearer(&token)), NOW).unwrap();

        assert_eq!(session.store_name.as_ref(), "shop.example.com");
        assert_eq!(session.claims.sub.as_deref(), Some("42"));
        assert_eq!(session.claims.sid.as_deref(), Some("session-id"));
    }

    #[test]
    fn test_rejects_missing_header() {
        assert_eq!(
            verifier().verify_at(None, NOW),
            Err(SessionError::MissingToken)
        );
        assert_eq!(
            verifier().verify_at(Some("  "), NOW),
            Err(SessionError::MissingToken)
        );
    }

    #[test]
    fn test_rejects_header_without_two_parts() {
        let token = create_token(&valid_claims(), "test-secret");
        for header in [token.clone(), format!("Bearer  {token}"), format!("Basic {token}")] {
            assert!(matches!(
                verifier().verify_at(Some(&header), NOW),
                Err(SessionError::MalformedToken { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        assert!(matches!(
            verifier().verify_at(Some("Bearer a.b"), NOW),
            Err(SessionError::MalformedToken { reason }) if reason.contains("3 segments")
        ));
        assert!(matches!(
            verifier().verify_at(Some("Bearer a.b.c.d"), NOW),
            Err(SessionError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_rejects_expired_token_even_when_signed() {
        let mut claims = valid_claims();
        claims.exp = NOW;
        let token = create_token(&claims, "test-secret");
        assert_eq!(
            verifier().verify_at(Some(&bearer(&token)), NOW),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn test_rejects_token_not_yet_valid() {
        let mut claims = valid_claims();
        claims.nbf = NOW + 1;
        let token = create_token(&claims, "test-secret");
        assert_eq!(
            verifier().verify_at(Some(&bearer(&token)), NOW),
            Err(SessionError::NotYetValid)
        );
    }

    #[test]
    fn test_nbf_equal_to_now_is_accepted() {
        let mut claims = valid_claims();
        claims.nbf = NOW;
        let token = create_token(&claims, "test-secret");
        assert!(verifier().verify_at(Some(&bearer(&token)), NOW).is_ok());
    }

    #[test]
    fn test_rejects_issuer_not_containing_destination() {
        let mut claims = valid_claims();
        claims.iss = "https://other.example.com/admin".to_string();
        let token = create_token(&claims, "test-secret");
        assert_eq!(
            verifier().verify_at(Some(&bearer(&token)), NOW),
            Err(SessionError::IssuerMismatch)
        );
    }

    #[test]
    fn test_rejects_signed_token_with_wrong_audience() {
        let mut claims = valid_claims();
        claims.aud = "someone-else".to_string();
        let token = create_token(&claims, "test-secret");
        assert_eq!(
            verifier().verify_at(Some(&bearer(&token)), NOW),
            Err(SessionError::AudienceMismatch)
        );
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let token = create_token(&valid_claims(), "not-the-secret");
        assert_eq!(
            verifier().verify_at(Some(&bearer(&token)), NOW),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let token = create_token(&valid_claims(), "test-secret");
        let mut other = valid_claims();
        other.sub = "1".to_string();
        let other_token = create_token(&other, "test-secret");

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other_token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(
            verifier().verify_at(Some(&bearer(&forged)), NOW),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn test_rejects_undecodable_payload() {
        assert!(matches!(
            verifier().verify_at(Some("Bearer abc.def.ghi"), NOW),
            Err(SessionError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_shop_strips_only_https_scheme() {
        let claims = SessionClaims {
            iss: String::new(),
            dest: "https://shop.example.com".to_string(),
            aud: String::new(),
            sub: None,
            exp: 0,
            nbf: 0,
            iat: None,
            jti: None,
            sid: None,
        };
        assert_eq!(claims.shop(), "shop.example.com");

        let claims = SessionClaims {
            dest: "shop.example.com".to_string(),
            ..claims
        };
        assert_eq!(claims.shop(), "shop.example.com");
    }
}
