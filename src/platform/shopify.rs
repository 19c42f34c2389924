//! [`PlatformApi`] over the Shopify Admin REST API.

use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use tracing::instrument;

use super::{AccessTokenResponse, InstallRedirect, PlatformApi, PlatformError};
use crate::auth::{
    hmac, NonceSource, OsNonceGenerator, SessionError, SessionVerifier, VerifiedSession,
};
use crate::clients::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
use crate::config::{AppConfig, HostUrl, StoreName, CALLBACK_PATH};

/// Number of products created by one [`PlatformApi::create_products`] call.
pub const PRODUCTS_PER_BATCH: usize = 5;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const UNINSTALL_TOPIC: &str = "app/uninstalled";

/// Production [`PlatformApi`].
///
/// Generic over the nonce source so tests can pin the `state` values.
#[derive(Debug)]
pub struct ShopifyApi<N: NonceSource = OsNonceGenerator> {
    config: Arc<AppConfig>,
    http: HttpClient,
    nonces: N,
    sessions: SessionVerifier,
}

impl ShopifyApi {
    /// Creates the API with OS-backed nonces.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the HTTP client cannot be built.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, HttpError> {
        Self::with_nonce_source(config, OsNonceGenerator)
    }
}

impl<N: NonceSource> ShopifyApi<N> {
    /// Creates the API with a custom nonce source.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the HTTP client cannot be built.
    pub fn with_nonce_source(config: Arc<AppConfig>, nonces: N) -> Result<Self, HttpError> {
        let http = HttpClient::new(&config)?;
        let sessions = SessionVerifier::from_config(&config);
        Ok(Self {
            config,
            http,
            nonces,
            sessions,
        })
    }

    /// The configuration this API was built from.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn admin_url(&self, store: &StoreName, resource: &str) -> String {
        format!(
            "{}/admin/api/{}/{resource}",
            self.config.store_api_base(store),
            self.config.api_version()
        )
    }

    fn expect_status(response: &HttpResponse, expected: u16) -> Result<(), PlatformError> {
        if response.code == expected {
            return Ok(());
        }
        Err(PlatformError::UnexpectedStatus {
            expected,
            status: response.code,
            body: response.body.to_string(),
        })
    }

    fn check_state(
        store: &StoreName,
        params: &[(String, String)],
        expected_nonce: &str,
    ) -> Result<(), PlatformError> {
        // An empty state counts as absent.
        match params
            .iter()
            .find(|(key, _)| key == "state")
            .filter(|(_, state)| !state.is_empty())
        {
            Some((_, state)) if !hmac::constant_time_compare(state, expected_nonce) => {
                tracing::warn!(store = %store, "callback state does not match stored nonce");
                Err(PlatformError::InvalidRedirectedUrl)
            }
            Some(_) => Ok(()),
            None => {
                tracing::warn!(store = %store, "callback carries no state, skipping nonce check");
                Ok(())
            }
        }
    }

    fn check_callback_hmac(
        &self,
        store: &StoreName,
        params: &[(String, String)],
    ) -> Result<(), PlatformError> {
        if !self.config.verify_callback_hmac() {
            return Ok(());
        }
        let pairs = params.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        if hmac::verify_callback(pairs, self.config.api_secret_key().as_ref()) {
            Ok(())
        } else {
            tracing::warn!(store = %store, "callback hmac does not validate");
            Err(PlatformError::InvalidRedirectedUrl)
        }
    }

    async fn exchange_code(
        &self,
        store: &StoreName,
        code: &str,
    ) -> Result<AccessTokenResponse, PlatformError> {
        let url = format!(
            "{}/admin/oauth/access_token",
            self.config.store_api_base(store)
        );
        let request = HttpRequest::builder(HttpMethod::Post, url)
            .query_param("client_id", self.config.api_key().as_ref())
            .query_param("client_secret", self.config.api_secret_key().as_ref())
            .query_param("code", code)
            .build()
            .map_err(HttpError::from)?;

        let response = self.http.request(request).await?;
        Self::expect_status(&response, 200)?;
        serde_json::from_value(response.body).map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

impl<N: NonceSource> PlatformApi for ShopifyApi<N> {
    fn exit_iframe_url(&self, store: &StoreName) -> String {
        format!(
            "{}/admin/apps/{}/exit-iframe",
            store.origin(),
            self.config.api_key().as_ref()
        )
    }

    fn app_url(&self, store: &StoreName) -> String {
        format!(
            "{}/admin/apps/{}",
            store.origin(),
            self.config.api_key().as_ref()
        )
    }

    fn handle_install(&self, store: &StoreName, redirect_base: &HostUrl) -> InstallRedirect {
        let nonce = self.nonces.generate();
        let redirect_uri = redirect_base.join(CALLBACK_PATH);

        let params: [(&str, &str); 5] = [
            ("client_id", self.config.api_key().as_ref()),
            ("scope", self.config.scopes().as_ref()),
            ("redirect_uri", &redirect_uri),
            ("state", &nonce),
            ("grant_options[]", "offline"),
        ];
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}/admin/oauth/authorize?{query_string}", store.origin());
        InstallRedirect { url, nonce }
    }

    #[instrument(skip(self, callback_url, expected_nonce), fields(store = %store))]
    async fn handle_redirect(
        &self,
        store: &StoreName,
        callback_url: &str,
        expected_nonce: &str,
    ) -> Result<AccessTokenResponse, PlatformError> {
        let parsed = url::Url::parse(callback_url).map_err(|e| {
            tracing::warn!(error = %e, "callback url does not parse");
            PlatformError::InvalidRedirectedUrl
        })?;
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        Self::check_state(store, &params, expected_nonce)?;
        self.check_callback_hmac(store, &params)?;

        let code = params
            .iter()
            .find_map(|(key, value)| (key == "code").then_some(value.as_str()))
            .unwrap_or_default();
        let token = self.exchange_code(store, code).await?;

        if !self.config.scopes().matches(&token.scope) {
            tracing::warn!(
                requested = %self.config.scopes(),
                granted = %token.scope,
                "granted scopes differ from requested"
            );
            return Err(PlatformError::ScopeMismatch {
                requested: self.config.scopes().to_string(),
                granted: token.scope,
            });
        }

        tracing::debug!("exchanged authorization code");
        Ok(token)
    }

    fn verify_session(&self, authorization: Option<&str>) -> Result<VerifiedSession, SessionError> {
        self.sessions.verify(authorization)
    }

    #[instrument(skip(self, access_token), fields(store = %store))]
    async fn subscribe_uninstall_webhook(
        &self,
        store: &StoreName,
        access_token: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({
            "webhook": {
                "address": self.config.uninstall_webhook_url(store),
                "topic": UNINSTALL_TOPIC,
                "format": "json",
            }
        });
        let request = HttpRequest::builder(HttpMethod::Post, self.admin_url(store, "webhooks.json"))
            .json(body)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .build()
            .map_err(HttpError::from)?;

        let response = self.http.request(request).await?;
        Self::expect_status(&response, 201)?;
        tracing::info!("subscribed to uninstall webhook");
        Ok(())
    }

    #[instrument(skip(self, access_token), fields(store = %store))]
    async fn create_products(&self, store: &StoreName, access_token: &str) -> Result<(), PlatformError> {
        for _ in 0..PRODUCTS_PER_BATCH {
            let title = format!("Product {}", rand::thread_rng().gen_range(0..1000));
            let body = json!({
                "product": {
                    "title": title,
                    "body_html": format!("<p>{title}</p>"),
                    "vendor": "Vendor",
                    "product_type": "Type",
                    "status": "active",
                }
            });
            let request = HttpRequest::builder(HttpMethod::Post, self.admin_url(store, "products.json"))
                .json(body)
                .header(ACCESS_TOKEN_HEADER, access_token)
                .build()
                .map_err(HttpError::from)?;

            let response = self.http.request(request).await?;
            Self::expect_status(&response, 201)?;
        }
        tracing::info!(count = PRODUCTS_PER_BATCH, "created products");
        Ok(())
    }

    #[instrument(skip(self, access_token), fields(store = %store))]
    async fn products_count(&self, store: &StoreName, access_token: &str) -> Result<u64, PlatformError> {
        let request = HttpRequest::builder(HttpMethod::Get, self.admin_url(store, "products/count.json"))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .build()
            .map_err(HttpError::from)?;

        let response = self.http.request(request).await?;
        Self::expect_status(&response, 200)?;
        response
            .body
            .get("count")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| PlatformError::Decode(format!("missing count in {}", response.body)))
    }
}

// Verify ShopifyApi is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShopifyApi>();
};
