use std::fmt;

use crate::storage::StoreRecord;

/// Where a store is in the installation lifecycle.
///
/// A store that uninstalled has its record purged, so it reads as
/// [`NotInstalled`](Self::NotInstalled) again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstallState {
    /// No record exists.
    NotInstalled,
    /// A handshake was started and has not completed.
    PendingAuthorization,
    /// The handshake completed and a token is stored.
    Installed,
}

impl InstallState {
    /// Derives the state from a stored record.
    #[must_use]
    pub const fn of(record: Option<&StoreRecord>) -> Self {
        match record {
            None => Self::NotInstalled,
            Some(record) if record.installed => Self::Installed,
            Some(_) => Self::PendingAuthorization,
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotInstalled => "not_installed",
            Self::PendingAuthorization => "pending_authorization",
            Self::Installed => "installed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreName;
    use crate::storage::StoreUpdate;

    #[test]
    fn test_state_of_record() {
        let name = StoreName::new("shop.example.com").unwrap();
        let pending = StoreRecord::pending(name, "nonce");
        let installed = pending
            .clone()
            .apply(StoreUpdate::installed("token"))
            .unwrap();

        assert_eq!(InstallState::of(None), InstallState::NotInstalled);
        assert_eq!(InstallState::of(Some(&pending)), InstallState::PendingAuthorization);
        assert_eq!(InstallState::of(Some(&installed)), InstallState::Installed);
        assert_eq!(InstallState::Installed.to_string(), "installed");
    }
}
