// ── Runtime bridge configuration ──
//
// Describes *which* account to act for and how to reach the API. Carries
// credential data and tuning, but never touches disk: the CLI (or any
// other consumer) builds a `BridgeConfig` and hands it in.

use std::time::Duration;

use homeconnect_api::transport::normalize_base_url;
use homeconnect_api::{
    Credentials, Error, OAuthConfig, PRODUCTION_URL, SIMULATOR_URL, StreamConfig, TransportConfig,
};
use secrecy::SecretString;
use url::Url;

/// Configuration for one API account.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Required unless `simulation` is set.
    pub refresh_token: Option<SecretString>,
    /// Talk to the simulator and use the authorization-code flow.
    pub simulation: bool,
    /// Overrides the production/simulator host picked from `simulation`.
    pub base_url: Option<Url>,
    /// Total timeout for REST and OAuth requests.
    pub timeout: Duration,
    pub oauth: OAuthConfig,
    pub stream: StreamConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::from(String::new()),
            refresh_token: None,
            simulation: false,
            base_url: None,
            timeout: Duration::from_secs(30),
            oauth: OAuthConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// The API host this configuration talks to, with a trailing slash.
    pub fn effective_base_url(&self) -> Result<Url, Error> {
        match &self.base_url {
            Some(url) => normalize_base_url(url.as_str()),
            None if self.simulation => normalize_base_url(SIMULATOR_URL),
            None => normalize_base_url(PRODUCTION_URL),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }

    pub(crate) fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            simulation: self.simulation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_simulation_flag() {
        let mut config = BridgeConfig::default();
        assert_eq!(
            config.effective_base_url().unwrap().as_str(),
            "https://api.home-connect.com/"
        );

        config.simulation = true;
        assert_eq!(
            config.effective_base_url().unwrap().as_str(),
            "https://simulator.home-connect.com/"
        );
    }

    #[test]
    fn explicit_base_url_wins() {
        let config = BridgeConfig {
            simulation: true,
            base_url: Some("http://127.0.0.1:8080/proxy".parse().unwrap()),
            ..BridgeConfig::default()
        };
        assert_eq!(
            config.effective_base_url().unwrap().as_str(),
            "http://127.0.0.1:8080/proxy/"
        );
    }

    #[test]
    fn transport_uses_configured_timeout() {
        let config = BridgeConfig {
            timeout: Duration::from_secs(5),
            ..BridgeConfig::default()
        };
        assert_eq!(config.transport().timeout, Duration::from_secs(5));
    }
}
