//! Install, callback and uninstall orchestration.
//!
//! [`InstallationFlow`] ties a [`StoreRepository`] to a [`PlatformApi`]:
//!
//! 1. [`begin_install`](InstallationFlow::begin_install) stores a nonce and
//!    returns the authorization URL
//! 2. [`complete_install`](InstallationFlow::complete_install) validates the
//!    callback, exchanges the code, subscribes the uninstall webhook and
//!    stores the token
//! 3. [`uninstall`](InstallationFlow::uninstall) purges the record
//!
//! Every step is a hard gate: a failure leaves the stored record as it was.

mod error;
mod state;

use tracing::instrument;

use crate::config::{HostUrl, StoreName};
use crate::platform::PlatformApi;
use crate::storage::{StorageError, StoreRecord, StoreRepository, StoreUpdate};

pub use error::InstallError;
pub use state::InstallState;

/// Where to send a merchant who opened the app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectInstruction {
    /// Target URL.
    pub url: String,
    /// Nonce of the started handshake; `None` when the store is installed.
    pub nonce: Option<String>,
}

/// The installation state machine.
#[derive(Debug)]
pub struct InstallationFlow<R, P> {
    repository: R,
    platform: P,
}

impl<R: StoreRepository, P: PlatformApi> InstallationFlow<R, P> {
    /// Creates a flow over the given collaborators.
    #[must_use]
    pub const fn new(repository: R, platform: P) -> Self {
        Self {
            repository,
            platform,
        }
    }

    /// The store repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// The platform API.
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Current lifecycle state of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Storage`] if the lookup fails.
    pub async fn state(&self, store: &StoreName) -> Result<InstallState, InstallError> {
        let record = self.repository.get(store).await?;
        Ok(InstallState::of(record.as_ref()))
    }

    /// Starts (or restarts) the handshake for `store`.
    ///
    /// An installed store gets the exit-iframe URL and nothing is written.
    /// Otherwise a fresh nonce is stored with exactly one write, after the
    /// authorization URL is built.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Storage`] if the repository fails.
    #[instrument(skip(self, redirect_base), fields(store = %store))]
    pub async fn begin_install(
        &self,
        store: &StoreName,
        redirect_base: &HostUrl,
    ) -> Result<RedirectInstruction, InstallError> {
        let existing = self.repository.get(store).await?;

        if InstallState::of(existing.as_ref()) == InstallState::Installed {
            tracing::debug!("store already installed");
            return Ok(RedirectInstruction {
                url: self.platform.exit_iframe_url(store),
                nonce: None,
            });
        }

        let redirect = self.platform.handle_install(store, redirect_base);

        if existing.is_some() {
            self.repository
                .update(store, StoreUpdate::restart(redirect.nonce.clone()))
                .await?;
        } else {
            let created = self
                .repository
                .create(StoreRecord::pending(store.clone(), redirect.nonce.clone()))
                .await;
            match created {
                Ok(_) => {}
                // A concurrent install created the record first; last writer wins.
                Err(StorageError::Conflict { .. }) => {
                    tracing::debug!("store record created concurrently, overwriting nonce");
                    self.repository
                        .update(store, StoreUpdate::restart(redirect.nonce.clone()))
                        .await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("installation started");
        Ok(RedirectInstruction {
            url: redirect.url,
            nonce: Some(redirect.nonce),
        })
    }

    /// Finishes the handshake from the platform's callback URL.
    ///
    /// # Errors
    ///
    /// - [`InstallError::StoreNotFound`] if no handshake was started
    /// - [`InstallError::Platform`] if the callback is invalid, the scopes
    ///   differ, or a platform call fails
    /// - [`InstallError::Storage`] if the repository fails
    #[instrument(skip(self, callback_url), fields(store = %store))]
    pub async fn complete_install(
        &self,
        store: &StoreName,
        callback_url: &str,
    ) -> Result<(), InstallError> {
        let record = self
            .repository
            .get(store)
            .await?
            .ok_or_else(|| InstallError::StoreNotFound { name: store.clone() })?;

        let token = self
            .platform
            .handle_redirect(store, callback_url, &record.nonce)
            .await?;
        self.platform
            .subscribe_uninstall_webhook(store, &token.access_token)
            .await?;
        self.repository
            .update(store, StoreUpdate::installed(token.access_token))
            .await?;

        tracing::info!("installation completed");
        Ok(())
    }

    /// Removes `store` after the platform reported the app uninstalled.
    ///
    /// # Errors
    ///
    /// - [`InstallError::StoreNotFound`] if there is no record; nothing is
    ///   deleted
    /// - [`InstallError::Storage`] if the repository fails
    #[instrument(skip(self), fields(store = %store))]
    pub async fn uninstall(&self, store: &StoreName) -> Result<(), InstallError> {
        if self.repository.get(store).await?.is_none() {
            return Err(InstallError::StoreNotFound { name: store.clone() });
        }
        self.repository.delete(store).await?;
        tracing::info!("store uninstalled");
        Ok(())
    }

    /// Counts the products of the store named by the session token.
    ///
    /// # Errors
    ///
    /// - [`InstallError::Session`] if the token is rejected
    /// - [`InstallError::StoreNotFound`] / [`InstallError::NotInstalled`]
    ///   if the store has no usable token
    /// - [`InstallError::Platform`] if the platform call fails
    #[instrument(skip_all, fields(store = tracing::field::Empty))]
    pub async fn products_count(&self, authorization: Option<&str>) -> Result<u64, InstallError> {
        let (store, token) = self.authorize(authorization).await?;
        self.platform
            .products_count(&store, &token)
            .await
            .map_err(InstallError::from)
    }

    /// Creates demo products in the store named by the session token.
    ///
    /// # Errors
    ///
    /// Same as [`products_count`](Self::products_count).
    #[instrument(skip_all, fields(store = tracing::field::Empty))]
    pub async fn create_products(&self, authorization: Option<&str>) -> Result<(), InstallError> {
        let (store, token) = self.authorize(authorization).await?;
        self.platform
            .create_products(&store, &token)
            .await
            .map_err(InstallError::from)
    }

    async fn authorize(
        &self,
        authorization: Option<&str>,
    ) -> Result<(StoreName, String), InstallError> {
        let session = self.platform.verify_session(authorization)?;
        let store = session.store_name;
        tracing::Span::current().record("store", tracing::field::display(&store));

        let record = self
            .repository
            .get(&store)
            .await?
            .ok_or_else(|| InstallError::StoreNotFound { name: store.clone() })?;
        match record.access_token {
            Some(token) if record.installed => Ok((store, token)),
            _ => Err(InstallError::NotInstalled { name: store }),
        }
    }
}

// Verify InstallationFlow is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<
        InstallationFlow<crate::storage::StoreBackend, crate::platform::ShopifyApi>,
    >();
};
