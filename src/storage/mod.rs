//! Persistence of per-store installation state.
//!
//! A [`StoreRecord`] exists for every store that has started an install and
//! has not been uninstalled. Implementations of [`StoreRepository`]:
//!
//! - [`PgStoreRepository`]: Postgres via `sqlx`
//! - [`InMemoryStoreRepository`]: process-local map, for tests and demos
//! - [`StoreBackend`]: picks one of the above at startup

mod memory;
mod postgres;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::StoreName;

pub use memory::InMemoryStoreRepository;
pub use postgres::PgStoreRepository;

/// One merchant installation.
///
/// Invariant: `installed` implies a non-empty `access_token`. The nonce is
/// only meaningful while a handshake is in flight.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// Store host name, unique.
    pub name: StoreName,
    /// Nonce of the in-flight handshake.
    pub nonce: String,
    /// Offline access token, set once installed.
    pub access_token: Option<String>,
    /// Whether the handshake completed.
    pub installed: bool,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl StoreRecord {
    /// A record for a store whose handshake has just begun.
    #[must_use]
    pub fn pending(name: StoreName, nonce: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name,
            nonce: nonce.into(),
            access_token: None,
            installed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `update` into the record, leaving unset fields untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invariant`] if the result would be installed
    /// without an access token.
    pub fn apply(mut self, update: StoreUpdate) -> Result<Self, StorageError> {
        if let Some(nonce) = update.nonce {
            self.nonce = nonce;
        }
        if let Some(token) = update.access_token {
            self.access_token = Some(token);
        }
        if let Some(installed) = update.installed {
            self.installed = installed;
        }
        self.check()?;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Checks the installed/token invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invariant`] when it does not hold.
    pub fn check(&self) -> Result<(), StorageError> {
        let has_token = self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        if self.installed && !has_token {
            return Err(StorageError::Invariant(format!(
                "store {} is marked installed without an access token",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for StoreRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRecord")
            .field("name", &self.name)
            .field("nonce", &self.nonce)
            .field("access_token", &self.access_token.as_ref().map(|_| "*****"))
            .field("installed", &self.installed)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Partial update of a [`StoreRecord`]; `None` fields are left as stored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoreUpdate {
    /// New nonce.
    pub nonce: Option<String>,
    /// New access token.
    pub access_token: Option<String>,
    /// New installed flag.
    pub installed: Option<bool>,
}

impl StoreUpdate {
    /// Restarts a handshake: fresh nonce, not installed.
    #[must_use]
    pub fn restart(nonce: impl Into<String>) -> Self {
        Self {
            nonce: Some(nonce.into()),
            access_token: None,
            installed: Some(false),
        }
    }

    /// Completes a handshake with the exchanged token.
    #[must_use]
    pub fn installed(access_token: impl Into<String>) -> Self {
        Self {
            nonce: None,
            access_token: Some(access_token.into()),
            installed: Some(true),
        }
    }
}

impl fmt::Debug for StoreUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreUpdate")
            .field("nonce", &self.nonce)
            .field("access_token", &self.access_token.as_ref().map(|_| "*****"))
            .field("installed", &self.installed)
            .finish()
    }
}

/// Errors raised by store repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record exists for the store.
    #[error("store {name} is not found")]
    NotFound {
        /// The missing store.
        name: StoreName,
    },

    /// A record already exists for the store.
    #[error("store {name} already exists")]
    Conflict {
        /// The duplicated store.
        name: StoreName,
    },

    /// A write would break a record invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A stored row could not be turned into a record.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The database rejected or failed the query.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Store record persistence.
///
/// Operations are independent; the repository offers no transactions across
/// calls, so concurrent writers to the same store are last-writer-wins.
pub trait StoreRepository: Send + Sync {
    /// Loads the record for `name`, if any.
    fn get(
        &self,
        name: &StoreName,
    ) -> impl Future<Output = Result<Option<StoreRecord>, StorageError>> + Send;

    /// Inserts a new record.
    ///
    /// Fails with [`StorageError::Conflict`] if one already exists.
    fn create(
        &self,
        record: StoreRecord,
    ) -> impl Future<Output = Result<StoreRecord, StorageError>> + Send;

    /// Merges `update` into the existing record and returns the result.
    ///
    /// Fails with [`StorageError::NotFound`] if there is no record.
    fn update(
        &self,
        name: &StoreName,
        update: StoreUpdate,
    ) -> impl Future<Output = Result<StoreRecord, StorageError>> + Send;

    /// Removes the record.
    ///
    /// Fails with [`StorageError::NotFound`] if there is no record.
    fn delete(&self, name: &StoreName) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Repository chosen at startup from configuration.
#[derive(Clone, Debug)]
pub enum StoreBackend {
    /// Postgres-backed storage.
    Postgres(PgStoreRepository),
    /// Process-local storage.
    Memory(InMemoryStoreRepository),
}

impl StoreRepository for StoreBackend {
    async fn get(&self, name: &StoreName) -> Result<Option<StoreRecord>, StorageError> {
        match self {
            Self::Postgres(repo) => repo.get(name).await,
            Self::Memory(repo) => repo.get(name).await,
        }
    }

    async fn create(&self, record: StoreRecord) -> Result<StoreRecord, StorageError> {
        match self {
            Self::Postgres(repo) => repo.create(record).await,
            Self::Memory(repo) => repo.create(record).await,
        }
    }

    async fn update(
        &self,
        name: &StoreName,
        update: StoreUpdate,
    ) -> Result<StoreRecord, StorageError> {
        match self {
            Self::Postgres(repo) => repo.update(name, update).await,
            Self::Memory(repo) => repo.update(name, update).await,
        }
    }

    async fn delete(&self, name: &StoreName) -> Result<(), StorageError> {
        match self {
            Self::Postgres(repo) => repo.delete(name).await,
            Self::Memory(repo) => repo.delete(name).await,
        }
    }
}
