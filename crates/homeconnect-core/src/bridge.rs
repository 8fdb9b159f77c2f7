// ── Bridge ──
//
// Entry point for consumers: wires one account's credential store, token
// manager, REST client and event stream manager together.

use std::sync::Arc;

use homeconnect_api::{
    AccessToken, ApiClient, CredentialStore, Error, EventStreamManager, TokenManager,
};
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::session::ApplianceSession;

/// One API account.
///
/// Cheaply cloneable via `Arc<BridgeInner>`; every clone shares the same
/// token cache and event streams.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    api: ApiClient,
    events: EventStreamManager,
}

impl Bridge {
    /// Build the client stack. Performs no I/O; credentials are checked on
    /// first use.
    pub fn new(config: BridgeConfig) -> Result<Self, Error> {
        let base_url = config.effective_base_url()?;
        let transport = config.transport();

        let store = Arc::new(CredentialStore::new(config.credentials()));
        let tokens = Arc::new(TokenManager::new(
            store,
            transport.build_oauth_client()?,
            base_url.clone(),
            config.oauth.clone(),
        ));
        let api = ApiClient::new(
            transport.build_client()?,
            base_url.clone(),
            Arc::clone(&tokens),
        );
        let events = EventStreamManager::new(
            transport.build_stream_client()?,
            base_url.clone(),
            tokens,
            config.stream.clone(),
        );

        debug!(%base_url, simulation = config.simulation, "bridge created");
        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                api,
                events,
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn events(&self) -> &EventStreamManager {
        &self.inner.events
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.inner.api.tokens().credentials()
    }

    /// Make sure a usable access token is cached, acquiring one if needed.
    pub async fn ensure_valid_credentials(&self) -> Result<Arc<AccessToken>, Error> {
        self.inner.api.tokens().ensure_valid_credentials().await
    }

    /// A new session for `ha_id`, not yet opened.
    pub fn session(&self, ha_id: impl Into<String>) -> ApplianceSession {
        ApplianceSession::new(ha_id, self.inner.api.clone(), self.inner.events.clone())
    }

    /// Close every event stream and wait for the read loops to exit.
    pub async fn shutdown(&self) {
        self.inner.events.dispose_all().await;
        info!("bridge shut down");
    }
}
