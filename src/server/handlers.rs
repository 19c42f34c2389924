//! Route handlers.

use axum::body::Bytes;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::auth::hmac;
use crate::config::StoreName;
use crate::platform::PlatformApi;
use crate::storage::StoreRepository;

const WEBHOOK_HMAC_HEADER: &str = "x-shopify-hmac-sha256";

/// Query carrying the store a request is about.
#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    shop: Option<String>,
}

impl ShopQuery {
    fn store(&self) -> Result<StoreName, ApiError> {
        let shop = self
            .shop
            .as_deref()
            .ok_or_else(|| ApiError::invalid_query("missing shop parameter"))?;
        StoreName::new(shop).map_err(|e| ApiError::invalid_query(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u64,
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// `GET /ping`
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

/// `GET /?shop=`: starts the install handshake.
pub async fn begin_install<R, P>(
    State(state): State<AppState<R, P>>,
    Query(query): Query<ShopQuery>,
) -> Result<Response, ApiError>
where
    R: StoreRepository,
    P: PlatformApi,
{
    let store = query.store()?;
    let redirect = state
        .flow()
        .begin_install(&store, state.config().host())
        .await
        .map_err(|e| state.reject(&e, "handle call"))?;
    Ok(found(redirect.url))
}

/// `GET /auth/callback`: finishes the handshake and opens the app.
pub async fn complete_install<R, P>(
    State(state): State<AppState<R, P>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ShopQuery>,
) -> Result<Response, ApiError>
where
    R: StoreRepository,
    P: PlatformApi,
{
    let store = query.store()?;
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let callback_url = state.config().host().join(path_and_query);

    state
        .flow()
        .complete_install(&store, &callback_url)
        .await
        .map_err(|e| state.reject(&e, "handle oauth2 redirect call"))?;
    Ok(found(state.flow().platform().app_url(&store)))
}

/// `POST /uninstall?shop=`: the `app/uninstalled` webhook.
pub async fn uninstall<R, P>(
    State(state): State<AppState<R, P>>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError>
where
    R: StoreRepository,
    P: PlatformApi,
{
    let store = query.store()?;

    if state.config().verify_webhook_hmac() {
        let signature = headers
            .get(WEBHOOK_HMAC_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let secret = state.config().api_secret_key().as_ref();
        if !hmac::verify_webhook(&body, signature, secret) {
            tracing::warn!(store = %store, "webhook hmac does not validate");
            return Err(ApiError::invalid_webhook_signature());
        }
    }

    state
        .flow()
        .uninstall(&store)
        .await
        .map_err(|e| state.reject(&e, "uninstall app"))?;
    Ok(StatusCode::OK)
}

/// `GET /api/products/count`
pub async fn products_count<R, P>(
    State(state): State<AppState<R, P>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: StoreRepository,
    P: PlatformApi,
{
    let count = state
        .flow()
        .products_count(authorization(&headers))
        .await
        .map_err(|e| state.reject(&e, "get products count"))?;
    Ok(Json(CountResponse { count }).into_response())
}

/// `GET /api/products/create`
pub async fn create_products<R, P>(
    State(state): State<AppState<R, P>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: StoreRepository,
    P: PlatformApi,
{
    state
        .flow()
        .create_products(authorization(&headers))
        .await
        .map_err(|e| state.reject(&e, "create products"))?;
    Ok(Json("").into_response())
}
