//! Error type for installation flow operations.

use thiserror::Error;

use crate::auth::SessionError;
use crate::config::StoreName;
use crate::platform::PlatformError;
use crate::storage::StorageError;

/// Errors returned by [`InstallationFlow`](super::InstallationFlow).
///
/// [`is_expected`](Self::is_expected) splits them into client errors (bad
/// input from the caller) and server errors (platform or storage failures).
#[derive(Debug, Error)]
pub enum InstallError {
    /// No record exists for the store.
    #[error("store is not found")]
    StoreNotFound {
        /// The store that was looked up.
        name: StoreName,
    },

    /// The store has a record but the handshake never completed.
    #[error("store is not installed")]
    NotInstalled {
        /// The store that was looked up.
        name: StoreName,
    },

    /// The bearer session token was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The platform rejected the handshake or failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The store repository failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl InstallError {
    /// Returns `true` for errors caused by the caller's input.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        match self {
            Self::StoreNotFound { .. } | Self::NotInstalled { .. } | Self::Session(_) => true,
            Self::Platform(e) => e.is_expected(),
            Self::Storage(_) => false,
        }
    }
}

// Verify InstallError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<InstallError>();
};

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreName {
        StoreName::new("shop.example.com").unwrap()
    }

    #[test]
    fn test_store_not_found_is_client_error() {
        let error = InstallError::StoreNotFound { name: store() };
        assert_eq!(error.to_string(), "store is not found");
        assert!(error.is_expected());
    }

    #[test]
    fn test_platform_classification_is_forwarded() {
        assert!(InstallError::from(PlatformError::InvalidRedirectedUrl).is_expected());
        assert!(!InstallError::from(PlatformError::Decode("x".to_string())).is_expected());
    }

    #[test]
    fn test_storage_errors_are_server_errors() {
        let error = InstallError::from(StorageError::Invariant("x".to_string()));
        assert!(!error.is_expected());
    }

    #[test]
    fn test_session_errors_are_client_errors() {
        let error = InstallError::from(SessionError::Expired);
        assert!(error.is_expected());
    }
}
