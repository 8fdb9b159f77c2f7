// Credential storage
//
// Holds the static client credentials plus the two mutable secrets: the
// refresh token (which the server may rotate) and the cached access token.
// Both mutable slots are `ArcSwapOption`s so readers never block; writes are
// serialized by the `TokenManager`, which is the only writer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Client credentials as configured by the user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Required outside simulation mode.
    pub refresh_token: Option<SecretString>,
    /// Selects the authorization-code flow against the simulator instead of
    /// the refresh-token flow against the production API.
    pub simulation: bool,
}

/// A bearer token obtained from the token endpoint.
#[derive(Debug)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(secret: SecretString, expires_in: Option<Duration>) -> Self {
        Self {
            secret,
            expires_at: expires_in.map(|ttl| Instant::now() + ttl),
        }
    }

    pub fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// `true` once the token is within the expiry skew of its lifetime.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Instant::now() + EXPIRY_SKEW >= at)
    }
}

/// Shared credential state for one API client instance.
#[derive(Debug)]
pub struct CredentialStore {
    client_id: String,
    client_secret: SecretString,
    simulation: bool,
    refresh_token: ArcSwapOption<SecretString>,
    access_token: ArcSwapOption<AccessToken>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        let refresh_token = credentials
            .refresh_token
            .filter(|t| !t.expose_secret().trim().is_empty())
            .map(Arc::new);

        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            simulation: credentials.simulation,
            refresh_token: ArcSwapOption::new(refresh_token),
            access_token: ArcSwapOption::empty(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    pub fn refresh_token(&self) -> Option<Arc<SecretString>> {
        self.refresh_token.load_full()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.load().is_some()
    }

    /// The cached access token, unless it is missing or about to expire.
    pub fn access_token(&self) -> Option<Arc<AccessToken>> {
        self.access_token.load_full().filter(|t| !t.is_expired())
    }

    pub(crate) fn set_refresh_token(&self, token: SecretString) {
        if !token.expose_secret().trim().is_empty() {
            self.refresh_token.store(Some(Arc::new(token)));
        }
    }

    pub(crate) fn store_access_token(&self, token: AccessToken) -> Arc<AccessToken> {
        let token = Arc::new(token);
        self.access_token.store(Some(Arc::clone(&token)));
        token
    }

    /// Drop the cached access token. Idempotent.
    pub fn invalidate(&self) {
        self.access_token.store(None);
    }

    /// Drop the cached access token only if it is still `expected`.
    ///
    /// A request that was rejected with a token that has meanwhile been
    /// replaced must not throw away the replacement. Returns `true` if the
    /// token was cleared by this call.
    pub fn invalidate_if(&self, expected: &Arc<AccessToken>) -> bool {
        let current = Some(Arc::clone(expected));
        let previous = self
            .access_token
            .compare_and_swap(&current, None::<Arc<AccessToken>>);
        matches!(&*previous, Some(prev) if Arc::ptr_eq(prev, expected))
    }
}
