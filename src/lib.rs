//! # Shopify app backend
//!
//! Server side of a Shopify app: the OAuth install handshake, verification
//! of App Bridge session tokens, and persistence of per-store installation
//! state.
//!
//! ## Overview
//!
//! - Type-safe configuration via [`AppConfig`] and [`AppConfigBuilder`]
//! - Validated newtypes for credentials, store names and URLs
//! - Install / callback / uninstall orchestration via [`InstallationFlow`]
//! - Session token and HMAC verification in [`auth`]
//! - Platform calls behind the [`PlatformApi`] trait, with a retrying
//!   [`HttpClient`] underneath
//! - Store records in Postgres or in memory via [`StoreRepository`]
//! - An axum router exposing it all in [`server`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shopify_app::{AppConfig, InMemoryStoreRepository, InstallationFlow, ShopifyApi};
//! use shopify_app::server::{router, AppState};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(AppConfig::from_env()?);
//! let platform = ShopifyApi::new(Arc::clone(&config))?;
//! let flow = InstallationFlow::new(InMemoryStoreRepository::new(), platform);
//! let app = router(AppState::new(config, flow));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! shopify_app::server::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Installation handshake
//!
//! ```text
//! merchant ──GET /?shop=──▶ begin_install ──302──▶ platform authorize page
//! platform ──GET /auth/callback──▶ complete_install
//!     ├─ state == stored nonce
//!     ├─ POST /admin/oauth/access_token
//!     ├─ granted scope == requested scope
//!     ├─ POST /admin/api/{version}/webhooks.json (app/uninstalled)
//!     └─ store token, installed = true
//! platform ──POST /uninstall?shop=──▶ uninstall (record deleted)
//! ```

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod install;
pub mod platform;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use config::{
    ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, AuthScopes, HostUrl,
    LogFormat, StoreName,
};
pub use error::ConfigError;

pub use clients::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse,
    HttpResponseError, InvalidHttpRequestError, MaxHttpRetriesExceededError, RetryPolicy,
};

pub use auth::{SessionError, SessionVerifier, VerifiedSession};
pub use install::{InstallError, InstallState, InstallationFlow, RedirectInstruction};
pub use platform::{PlatformApi, PlatformError, ShopifyApi};
pub use storage::{
    InMemoryStoreRepository, PgStoreRepository, StorageError, StoreBackend, StoreRecord,
    StoreRepository, StoreUpdate,
};
