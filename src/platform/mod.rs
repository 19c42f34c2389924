//! The platform's HTTP API, as seen by the installation flow.
//!
//! [`PlatformApi`] is the seam between the install/uninstall logic and the
//! network. [`ShopifyApi`] is the production implementation; tests swap in
//! their own.

mod error;
mod shopify;

use std::fmt;
use std::future::Future;

use serde::Deserialize;

use crate::auth::{SessionError, VerifiedSession};
use crate::config::{HostUrl, StoreName};

pub use error::PlatformError;
pub use shopify::{ShopifyApi, PRODUCTS_PER_BATCH};

/// Where to send a merchant who asked to install the app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRedirect {
    /// The authorization URL.
    pub url: String,
    /// The `state` value embedded in `url`.
    pub nonce: String,
}

/// Body of a successful authorization-code exchange.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct AccessTokenResponse {
    /// Offline access token.
    pub access_token: String,
    /// Scopes actually granted, comma separated.
    pub scope: String,
}

impl fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("access_token", &"*****")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Operations the app performs against the platform.
///
/// Implementations must be shareable across request tasks.
pub trait PlatformApi: Send + Sync {
    /// URL that breaks an installed app out of the admin iframe.
    fn exit_iframe_url(&self, store: &StoreName) -> String;

    /// URL of the app's page inside the store admin.
    fn app_url(&self, store: &StoreName) -> String;

    /// Builds the authorization URL for `store` with a fresh nonce.
    ///
    /// No network call is made.
    fn handle_install(&self, store: &StoreName, redirect_base: &HostUrl) -> InstallRedirect;

    /// Validates an OAuth callback and exchanges its code for a token.
    ///
    /// `expected_nonce` is the nonce stored when the install began.
    fn handle_redirect(
        &self,
        store: &StoreName,
        callback_url: &str,
        expected_nonce: &str,
    ) -> impl Future<Output = Result<AccessTokenResponse, PlatformError>> + Send;

    /// Verifies a bearer session token from the `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`SessionError`].
    fn verify_session(&self, authorization: Option<&str>) -> Result<VerifiedSession, SessionError>;

    /// Registers the `app/uninstalled` webhook for `store`.
    fn subscribe_uninstall_webhook(
        &self,
        store: &StoreName,
        access_token: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Creates a batch of demo products in `store`.
    fn create_products(
        &self,
        store: &StoreName,
        access_token: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Counts the products in `store`.
    fn products_count(
        &self,
        store: &StoreName,
        access_token: &str,
    ) -> impl Future<Output = Result<u64, PlatformError>> + Send;
}
