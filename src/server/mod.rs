//! Inbound HTTP surface.
//!
//! | Route | Method | Operation |
//! |---|---|---|
//! | `/` | GET | begin install, 302 to the platform |
//! | `/auth/callback` | GET | complete install, 302 to the app page |
//! | `/uninstall` | POST | uninstall webhook |
//! | `/api/products/count` | GET | product count (bearer session) |
//! | `/api/products/create` | GET | create demo products (bearer session) |
//! | `/ping` | GET | liveness |
//!
//! Every route runs behind a panic guard, request tracing and permissive CORS.

mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, CALLBACK_PATH, UNINSTALL_PATH};
use crate::install::{InstallError, InstallationFlow};
use crate::platform::PlatformApi;
use crate::storage::StoreRepository;

pub use error::{panic_response, ApiError};
pub use handlers::ShopQuery;

/// State shared by every handler.
///
/// Cheap to clone; everything lives behind one `Arc`.
pub struct AppState<R, P> {
    inner: Arc<AppStateInner<R, P>>,
}

struct AppStateInner<R, P> {
    config: Arc<AppConfig>,
    flow: InstallationFlow<R, P>,
}

impl<R, P> Clone for AppState<R, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: StoreRepository, P: PlatformApi> AppState<R, P> {
    /// Creates the state.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, flow: InstallationFlow<R, P>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, flow }),
        }
    }

    /// Application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// The installation flow.
    #[must_use]
    pub fn flow(&self) -> &InstallationFlow<R, P> {
        &self.inner.flow
    }

    fn reject(&self, error: &InstallError, action: &str) -> ApiError {
        ApiError::from_install(error, action, self.config().send_details_on_internal_error())
    }
}

/// Builds the application router.
pub fn router<R, P>(state: AppState<R, P>) -> Router
where
    R: StoreRepository + 'static,
    P: PlatformApi + 'static,
{
    Router::new()
        .route("/", get(handlers::begin_install::<R, P>))
        .route(CALLBACK_PATH, get(handlers::complete_install::<R, P>))
        .route(UNINSTALL_PATH, post(handlers::uninstall::<R, P>))
        .route("/api/products/count", get(handlers::products_count::<R, P>))
        .route("/api/products/create", get(handlers::create_products::<R, P>))
        .route("/ping", get(handlers::ping))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves `app` until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}
