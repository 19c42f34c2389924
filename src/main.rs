//! Shopify app backend server.
//!
//! Reads configuration from the environment (and `.env`), picks Postgres
//! storage when `DATABASE_URL` (or the `POSTGRES_*` variables) is set and
//! in-memory storage otherwise, then serves the app on `BACKEND_PORT`.

use std::net::SocketAddr;
use std::sync::Arc;

use shopify_app::server::{self, AppState};
use shopify_app::telemetry;
use shopify_app::{
    AppConfig, InMemoryStoreRepository, InstallationFlow, PgStoreRepository, ShopifyApi,
    StoreBackend,
};

#[tokio::main]
async fn main() {
    let config = Arc::new(AppConfig::from_env().expect("Failed to load configuration"));

    telemetry::init_tracing(config.log_level(), config.log_format());
    tracing::debug!(?config, "configuration loaded");

    let repository = match config.database_url() {
        Some(url) => {
            let repo = PgStoreRepository::connect(url)
                .await
                .expect("Failed to create database pool");
            repo.ensure_schema()
                .await
                .expect("Failed to create stores table");
            tracing::info!("Database pool created");
            StoreBackend::Postgres(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, store records are kept in memory");
            StoreBackend::Memory(InMemoryStoreRepository::new())
        }
    };

    let platform = ShopifyApi::new(Arc::clone(&config)).expect("Failed to build HTTP client");
    let flow = InstallationFlow::new(repository, platform);
    let app = server::router(AppState::new(Arc::clone(&config), flow));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    tracing::info!("backend listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    server::serve(listener, app).await.expect("Server error");
}
