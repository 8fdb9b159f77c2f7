// Appliance API HTTP client
//
// Wraps `reqwest::Client` with bearer-token handling and the response
// classification policy. Typed endpoint methods live in `appliances.rs`
// as inherent methods, keeping this module focused on request mechanics.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenManager;
use crate::error::Error;
use crate::transport::{JSON_MEDIA_TYPE, unexpected_status};

// ── Request / response ───────────────────────────────────────────────

/// One logical API call: method, resource path, optional JSON body, and
/// the set of status codes the caller treats as success.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    accepted: Vec<StatusCode>,
}

impl ApiRequest {
    /// `GET {path}`, accepting 200.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            accepted: vec![StatusCode::OK],
        }
    }

    /// `PUT {path}` with a JSON body, accepting 204.
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
            accepted: vec![StatusCode::NO_CONTENT],
        }
    }

    /// Replace the accepted status set.
    pub fn accept(mut self, statuses: &[StatusCode]) -> Self {
        self.accepted = statuses.to_vec();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn accepts(&self, status: StatusCode) -> bool {
        self.accepted.contains(&status)
    }
}

/// A response whose status was in the request's accepted set.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Deserialize the body. Malformed JSON is a `Communication` error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::malformed(self.status.as_u16(), &e, self.body.clone()))
    }
}

/// Outcome of a single HTTP exchange.
enum Attempt {
    Completed(ApiResponse),
    /// 401 on a request that did not expect it; the token has been invalidated.
    TokenRejected(ApiResponse),
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the appliance REST API.
///
/// Cheaply cloneable; all clones share the HTTP connection pool and the
/// token manager.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// `base_url` should end with `/`; see [`crate::transport::normalize_base_url`].
    pub fn new(http: reqwest::Client, base_url: Url, tokens: Arc<TokenManager>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                tokens,
            }),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.inner.tokens
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Execute a request with token handling and status classification.
    ///
    /// A 401 the request did not ask for invalidates the token and the call
    /// is repeated exactly once with a freshly acquired token. A second 401
    /// is returned as a `Communication` error.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        match self.attempt(request).await? {
            Attempt::Completed(resp) => return Ok(resp),
            Attempt::TokenRejected(_) => {
                debug!(path = request.path(), "access token rejected, retrying once");
            }
        }

        match self.attempt(request).await? {
            Attempt::Completed(resp) => Ok(resp),
            Attempt::TokenRejected(resp) => Err(Error::communication(
                Some(resp.status.as_u16()),
                format!(
                    "{} {}: access token rejected after refresh",
                    request.method(),
                    request.path()
                ),
                (!resp.body.is_empty()).then_some(resp.body),
            )),
        }
    }

    async fn attempt(&self, request: &ApiRequest) -> Result<Attempt, Error> {
        let token = self.inner.tokens.ensure_valid_credentials().await?;
        let url = self.url(request.path())?;
        debug!("{} {url}", request.method());

        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, JSON_MEDIA_TYPE);
        if let Some(ref body) = request.body {
            builder = builder
                .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
                .body(body.to_string());
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED && !request.accepts(status) {
            let body = resp.text().await.unwrap_or_default();
            warn!(path = request.path(), "request rejected with 401");
            self.inner.tokens.invalidate_if(&token);
            return Ok(Attempt::TokenRejected(ApiResponse { status, body }));
        }

        if !request.accepts(status) {
            let context = format!("{} {}", request.method(), request.path());
            return Err(unexpected_status(resp, &context).await);
        }

        let body = resp.text().await?;
        Ok(Attempt::Completed(ApiResponse { status, body }))
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }
}
