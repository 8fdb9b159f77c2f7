// OAuth token acquisition
//
// Two grant flows, chosen by the credentials' simulation flag:
// - simulator: authorization-code grant, with the code captured from the
//   authorize endpoint's 302 redirect (never followed)
// - production: refresh-token grant with the client secret
//
// Acquisition is serialized behind a single async mutex so that a burst of
// callers observing a missing token produces exactly one round-trip.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::credentials::{AccessToken, CredentialStore};
use crate::error::Error;
use crate::transport::unexpected_status;

const AUTHORIZE_PATH: &str = "security/oauth/authorize";
const TOKEN_PATH: &str = "security/oauth/token";

/// Parameters of the authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: "https://example.com".into(),
            scope: "IdentifyAppliance Monitor Settings Control".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Obtains and caches access tokens for one client instance.
#[derive(Debug)]
pub struct TokenManager {
    store: Arc<CredentialStore>,
    http: reqwest::Client,
    base_url: Url,
    oauth: OAuthConfig,
    acquire: Mutex<()>,
}

impl TokenManager {
    /// `http` must not follow redirects; see
    /// [`TransportConfig::build_oauth_client`](crate::TransportConfig::build_oauth_client).
    pub fn new(
        store: Arc<CredentialStore>,
        http: reqwest::Client,
        base_url: Url,
        oauth: OAuthConfig,
    ) -> Self {
        Self {
            store,
            http,
            base_url,
            oauth,
            acquire: Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Return a usable access token, acquiring one if none is cached.
    ///
    /// Fails with [`Error::Configuration`] when neither a refresh token nor
    /// simulation mode is configured.
    pub async fn ensure_valid_credentials(&self) -> Result<Arc<AccessToken>, Error> {
        if !self.store.is_simulation() && !self.store.has_refresh_token() {
            return Err(Error::configuration(
                "no refresh token configured (required unless simulation mode is enabled)",
            ));
        }

        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }

        let _guard = self.acquire.lock().await;

        // Someone else may have finished acquiring while we waited.
        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }

        let token = if self.store.is_simulation() {
            self.authorization_code_grant().await?
        } else {
            self.refresh_token_grant().await?
        };

        info!(simulation = self.store.is_simulation(), "access token acquired");
        Ok(self.store.store_access_token(token))
    }

    /// Drop the cached access token. Idempotent.
    pub fn invalidate(&self) {
        debug!("access token invalidated");
        self.store.invalidate();
    }

    /// Drop the cached access token if it is still `token`.
    pub fn invalidate_if(&self, token: &Arc<AccessToken>) -> bool {
        let cleared = self.store.invalidate_if(token);
        if cleared {
            debug!("rejected access token invalidated");
        }
        cleared
    }

    // ── Grant flows ──────────────────────────────────────────────────

    async fn authorization_code_grant(&self) -> Result<AccessToken, Error> {
        let url = self.base_url.join(AUTHORIZE_PATH)?;
        debug!("requesting authorization code at {url}");

        let resp = self
            .http
            .get(url)
            .query(&[
                ("client_id", self.store.client_id()),
                ("response_type", "code"),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("scope", self.oauth.scope.as_str()),
            ])
            .send()
            .await?;

        if resp.status() != StatusCode::FOUND {
            return Err(unexpected_status(resp, "authorization request was not redirected").await);
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::communication(Some(302), "authorization redirect has no Location", None)
            })?;
        let code = extract_authorization_code(&self.base_url, location)?;

        let client_id = self.store.client_id();
        self.request_token(&[
            ("client_id", client_id),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("code", code.as_str()),
        ])
        .await
    }

    async fn refresh_token_grant(&self) -> Result<AccessToken, Error> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or_else(|| Error::configuration("no refresh token configured"))?;

        self.request_token(&[
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
            ("client_secret", self.store.client_secret().expose_secret()),
        ])
        .await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<AccessToken, Error> {
        let url = self.base_url.join(TOKEN_PATH)?;
        debug!("requesting access token at {url}");

        let resp = self.http.post(url).form(form).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(unexpected_status(resp, "token request failed").await);
        }

        let body = resp.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::malformed(200, &e, body.clone()))?;

        if let Some(rotated) = parsed.refresh_token {
            self.store.set_refresh_token(SecretString::from(rotated));
        }

        Ok(AccessToken::new(
            SecretString::from(parsed.access_token),
            parsed.expires_in.map(Duration::from_secs),
        ))
    }
}

/// Pull the `code` query parameter out of an authorization redirect.
///
/// Relative `Location` values are resolved against the API base URL.
fn extract_authorization_code(base_url: &Url, location: &str) -> Result<String, Error> {
    let redirect = base_url.join(location)?;
    redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            Error::communication(
                Some(302),
                format!("authorization redirect carries no code: {location}"),
                None,
            )
        })
}
