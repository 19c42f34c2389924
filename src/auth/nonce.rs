//! Per-installation state tokens.
//!
//! A nonce is stored on the store record when an install begins and echoed
//! back by the platform as the `state` parameter of the OAuth callback.

use rand::rngs::OsRng;
use rand::RngCore;

/// Returned when the operating system's entropy source is unavailable.
///
/// This value is public knowledge and offers no protection against forged
/// callbacks. It is only reached when `getrandom` fails, which is logged at
/// `warn` level.
pub const FALLBACK_NONCE: &str = "jg6yf3JAdB5hvFaG1o";

/// Source of installation nonces.
pub trait NonceSource: Send + Sync {
    /// Produces a fresh nonce. Never blocks and never fails.
    fn generate(&self) -> String;
}

/// Nonces backed by the OS random number generator.
///
/// Each nonce is a hyphenated UUID v4 built from 16 bytes of OS randomness,
/// giving 122 bits of entropy.
///
/// ```rust
/// use shopify_app::auth::{NonceSource, OsNonceGenerator};
///
/// let nonce = OsNonceGenerator.generate();
/// assert_eq!(nonce.len(), 36);
/// assert_ne!(nonce, OsNonceGenerator.generate());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct OsNonceGenerator;

impl OsNonceGenerator {
    fn from_bytes(result: Result<[u8; 16], rand::Error>) -> String {
        match result {
            Ok(bytes) => uuid::Builder::from_random_bytes(bytes)
                .into_uuid()
                .hyphenated()
                .to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "OS entropy unavailable, using fallback nonce");
                FALLBACK_NONCE.to_string()
            }
        }
    }
}

impl NonceSource for OsNonceGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 16];
        Self::from_bytes(OsRng.try_fill_bytes(&mut bytes).map(|()| bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_nonces_are_uuid_v4() {
        let nonce = OsNonceGenerator.generate();
        let parsed = uuid::Uuid::parse_str(&nonce).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_nonces_do_not_repeat() {
        let nonces: HashSet<String> = (0..1000).map(|_| OsNonceGenerator.generate()).collect();
        assert_eq!(nonces.len(), 1000);
    }

    #[test]
    fn test_entropy_failure_uses_fallback() {
        let err = rand::Error::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no entropy",
        ));
        assert_eq!(OsNonceGenerator::from_bytes(Err(err)), FALLBACK_NONCE);
    }
}
