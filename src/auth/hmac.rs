//! HMAC-SHA256 signing and constant-time verification.
//!
//! Three signature formats are in play:
//!
//! - session tokens: raw MAC over `header.payload`, base64url without padding
//! - OAuth callbacks: lowercase hex MAC over the sorted query string
//! - webhooks: standard base64 MAC over the raw request body
//!
//! Every comparison goes through [`subtle`] so timing does not leak how many
//! leading bytes matched.
//!
//! ```rust
//! use shopify_app::auth::hmac::{compute_signature, constant_time_compare};
//!
//! let sig = compute_signature("message", "key");
//! assert!(constant_time_compare(
//!     &sig,
//!     "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a"
//! ));
//! ```

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters that are never part of the signed callback message.
const UNSIGNED_PARAMS: [&str; 2] = ["hmac", "signature"];

#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
fn mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Computes the raw HMAC-SHA256 of `message`.
#[must_use]
pub fn sign(message: &[u8], secret: &str) -> Vec<u8> {
    let mut mac = mac(secret);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Computes a lowercase hex HMAC-SHA256 of `message`.
#[must_use]
pub fn compute_signature(message: &str, secret: &str) -> String {
    hex::encode(sign(message.as_bytes(), secret))
}

/// Computes a standard-base64 HMAC-SHA256 of raw bytes.
#[must_use]
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    STANDARD.encode(sign(message, secret))
}

/// Computes a base64url (unpadded) HMAC-SHA256, the JWT `HS256` format.
#[must_use]
pub fn compute_signature_base64url(message: &[u8], secret: &str) -> String {
    URL_SAFE_NO_PAD.encode(sign(message, secret))
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifies a MAC over `message` against raw signature bytes.
#[must_use]
pub fn verify_bytes(message: &[u8], signature: &[u8], secret: &str) -> bool {
    let expected = sign(message, secret);
    expected.ct_eq(signature).into()
}

/// Verifies a JWT-style signature given as a base64url segment.
///
/// A segment that is not valid base64url never verifies.
#[must_use]
pub fn verify_base64url(message: &[u8], signature_segment: &str, secret: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(signature_segment)
        .map(|signature| verify_bytes(message, &signature, secret))
        .unwrap_or(false)
}

/// Builds the message the platform signs for an OAuth callback.
///
/// All parameters except `hmac` and `signature` are sorted by key and joined
/// as `key=value` pairs separated by `&`.
#[must_use]
pub fn callback_signable_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(key, _)| !UNSIGNED_PARAMS.contains(key))
        .collect();
    pairs.sort_unstable();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Verifies the `hmac` parameter of an OAuth callback query.
///
/// Returns `false` when the parameter is missing.
#[must_use]
pub fn verify_callback<'a, I>(params: I, secret: &str) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
{
    let Some(received) = params
        .clone()
        .into_iter()
        .find_map(|(key, value)| (key == "hmac").then_some(value))
    else {
        return false;
    };
    let computed = compute_signature(&callback_signable_string(params), secret);
    constant_time_compare(&computed, received)
}

/// Verifies the `X-Shopify-Hmac-SHA256` header of a webhook delivery.
#[must_use]
pub fn verify_webhook(body: &[u8], hmac_header: &str, secret: &str) -> bool {
    constant_time_compare(&compute_signature_base64(body, secret), hmac_header.trim())
}

// Hex encoding for callback signatures
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .flat_map(|&byte| [HEX_CHARS[(byte >> 4) as usize], HEX_CHARS[(byte & 0x0f) as usize]])
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_signature_matches_known_value() {
        // HMAC-SHA256("message", "key")
        assert_eq!(
            compute_signature("message", "key"),
            "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a"
        );
    }

    #[test]
    fn test_base64_encodings_of_same_mac() {
        let standard = compute_signature_base64(b"payload", "secret");
        let url_safe = compute_signature_base64url(b"payload", "secret");
        assert_eq!(standard.len(), 44);
        assert_eq!(url_safe.len(), 43);
        assert_eq!(
            standard.trim_end_matches('=').replace('+', "-").replace('/', "_"),
            url_safe
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
        assert!(!constant_time_compare("a", ""));
    }

    #[test]
    fn test_verify_base64url_rejects_garbage() {
        let sig = compute_signature_base64url(b"header.payload", "secret");
        assert!(verify_base64url(b"header.payload", &sig, "secret"));
        assert!(!verify_base64url(b"header.payload", &sig, "other"));
        assert!(!verify_base64url(b"header.payload2", &sig, "secret"));
        assert!(!verify_base64url(b"header.payload", "!!not base64!!", "secret"));
        assert!(!verify_base64url(b"header.payload", "", "secret"));
    }

    #[test]
    fn test_callback_signable_string_sorts_and_skips_signatures() {
        let params = [
            ("state", "nonce"),
            ("hmac", "deadbeef"),
            ("code", "abc"),
            ("shop", "shop.example.com"),
            ("signature", "x"),
        ];
        assert_eq!(
            callback_signable_string(params),
            "code=abc&shop=shop.example.com&state=nonce"
        );
    }

    #[test]
    fn test_verify_callback() {
        let signable = "code=abc&shop=shop.example.com&state=nonce&timestamp=1";
        let hmac = compute_signature(signable, "secret");
        let params = vec![
            ("code", "abc"),
            ("hmac", hmac.as_str()),
            ("shop", "shop.example.com"),
            ("state", "nonce"),
            ("timestamp", "1"),
        ];
        assert!(verify_callback(params.iter().copied(), "secret"));
        assert!(!verify_callback(params.iter().copied(), "wrong"));

        let unsigned = [("code", "abc"), ("shop", "shop.example.com")];
        assert!(!verify_callback(unsigned, "secret"));
    }

    #[test]
    fn test_verify_webhook() {
        let body = br#"{"id":1}"#;
        let header = compute_signature_base64(body, "secret");
        assert!(verify_webhook(body, &header, "secret"));
        assert!(!verify_webhook(b"{\"id\":2}", &header, "secret"));
    }
}
