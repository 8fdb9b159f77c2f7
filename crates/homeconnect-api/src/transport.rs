// Shared transport configuration for building reqwest::Client instances.
//
// The REST client, the OAuth flows and the event streams each need a
// slightly different client (redirect policy, total timeout), but share
// connect timeout and user agent through this module.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Production API host.
pub const PRODUCTION_URL: &str = "https://api.home-connect.com";

/// Simulator API host, used when the credentials are in simulation mode.
pub const SIMULATOR_URL: &str = "https://simulator.home-connect.com";

/// Media type the appliance API speaks for request and response bodies.
pub const JSON_MEDIA_TYPE: &str = "application/vnd.bsh.sdk.v1+json";

const USER_AGENT: &str = concat!("homeconnect/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Total request timeout for REST and OAuth calls.
    /// Not applied to event streams, which stay open indefinitely.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build the client used for REST calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        finish(self.builder().timeout(self.timeout))
    }

    /// Build the client used for the OAuth endpoints.
    ///
    /// Redirects are never followed: the authorization-code flow reads the
    /// code straight from the `Location` header of the 302 response.
    pub fn build_oauth_client(&self) -> Result<reqwest::Client, Error> {
        finish(
            self.builder()
                .timeout(self.timeout)
                .redirect(reqwest::redirect::Policy::none()),
        )
    }

    /// Build the client used for long-lived event streams (no total timeout).
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        finish(self.builder())
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
    }
}

fn finish(builder: reqwest::ClientBuilder) -> Result<reqwest::Client, Error> {
    builder
        .build()
        .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))
}

/// Parse a base URL and make sure it ends with `/`, so relative
/// resource paths join onto it instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Turn a response with an unexpected status into a `Communication` error,
/// keeping the body for diagnosis.
pub(crate) async fn unexpected_status(resp: reqwest::Response, context: &str) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("unexpected status");
    Error::communication(
        Some(status.as_u16()),
        format!("{context}: {reason}"),
        (!body.is_empty()).then_some(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_trailing_slash() {
        let url = normalize_base_url("https://api.home-connect.com").unwrap();
        assert_eq!(url.as_str(), "https://api.home-connect.com/");

        let url = normalize_base_url("http://127.0.0.1:8080/proxy").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/proxy/");
        assert_eq!(
            url.join("api/homeappliances").unwrap().as_str(),
            "http://127.0.0.1:8080/proxy/api/homeappliances"
        );
    }

    #[test]
    fn normalize_rejects_garbage() {
        let err = normalize_base_url("not a url").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn clients_build_with_defaults() {
        let config = TransportConfig::default();
        assert!(config.build_client().is_ok());
        assert!(config.build_oauth_client().is_ok());
        assert!(config.build_stream_client().is_ok());
    }
}
