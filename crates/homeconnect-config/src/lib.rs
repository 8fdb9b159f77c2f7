//! Shared configuration for homeconnect tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `homeconnect_core::BridgeConfig`. The CLI adds
//! flag-aware overrides on top.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use homeconnect_core::{BridgeConfig, OAuthConfig, ReconnectConfig, StreamConfig};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Service name secrets are stored under in the system keyring.
pub const KEYRING_SERVICE: &str = "homeconnect";

/// Prefix of environment variables merged over the config file.
/// Nested keys use `__`, e.g. `HOMECONNECT_DEFAULTS__TIMEOUT=10`.
pub const ENV_PREFIX: &str = "HOMECONNECT_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested explicitly.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The requested profile name, else the configured default, else `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.available_profiles(),
            })
    }

    /// Comma-separated, sorted profile names; `(none)` when empty.
    pub fn available_profiles(&self) -> String {
        if self.profiles.is_empty() {
            return "(none)".into();
        }
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds without event-stream traffic before reconnecting.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    120
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// OAuth client id of the registered application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_env: Option<String>,

    /// Refresh token (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Environment variable name containing the refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_env: Option<String>,

    /// Use the simulator and the authorization-code flow.
    #[serde(default)]
    pub simulator: bool,

    /// Override the API host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Override the request timeout (seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override the event-stream idle timeout (seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<u64>,

    /// Give up on an event stream after this many consecutive failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "homeconnect", "homeconnect").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homeconnect");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Stable profile order keeps the file diff-friendly.
    let sorted = SortedConfig {
        default_profile: cfg.default_profile.as_deref(),
        defaults: &cfg.defaults,
        profiles: cfg.profiles.iter().collect(),
    };
    let toml_str = toml::to_string_pretty(&sorted)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

#[derive(Serialize)]
struct SortedConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_profile: Option<&'a str>,
    defaults: &'a Defaults,
    profiles: BTreeMap<&'a String, &'a Profile>,
}

// ── Credential resolution ───────────────────────────────────────────

/// Which secret of a profile to resolve or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    ClientSecret,
    RefreshToken,
}

impl SecretKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecret => "client-secret",
            Self::RefreshToken => "refresh-token",
        }
    }

    fn keyring_account(self, profile_name: &str) -> String {
        format!("{profile_name}/{}", self.as_str())
    }

    fn profile_fields(self, profile: &Profile) -> (Option<&str>, Option<&str>) {
        match self {
            Self::ClientSecret => (
                profile.client_secret_env.as_deref(),
                profile.client_secret.as_deref(),
            ),
            Self::RefreshToken => (
                profile.refresh_token_env.as_deref(),
                profile.refresh_token.as_deref(),
            ),
        }
    }
}

/// Resolve a secret through the chain: the profile's env var, then the
/// system keyring, then plaintext in the config. Blank values are skipped.
pub fn resolve_secret(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
) -> Option<SecretString> {
    resolve_secret_with(
        profile,
        profile_name,
        kind,
        |name| std::env::var(name).ok(),
        keyring_lookup,
    )
}

fn resolve_secret_with(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
    env: impl Fn(&str) -> Option<String>,
    stored: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    let (env_name, plaintext) = kind.profile_fields(profile);
    let non_blank = |v: &String| !v.trim().is_empty();

    // 1. Profile's *_env → env var lookup
    if let Some(value) = env_name.and_then(&env).filter(non_blank) {
        debug!(profile = profile_name, secret = kind.as_str(), "secret from environment");
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(value) = stored(&kind.keyring_account(profile_name)).filter(non_blank) {
        debug!(profile = profile_name, secret = kind.as_str(), "secret from keyring");
        return Some(SecretString::from(value));
    }

    // 3. Plaintext in config
    plaintext
        .map(str::to_owned)
        .filter(non_blank)
        .map(SecretString::from)
}

fn keyring_lookup(account: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, account)
        .ok()?
        .get_password()
        .ok()
}

/// Store a secret for `profile_name` in the system keyring.
pub fn store_secret(profile_name: &str, kind: SecretKind, value: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_account(profile_name))?;
    entry.set_password(value)?;
    Ok(())
}

// ── Translation to BridgeConfig ─────────────────────────────────────

/// Build a `BridgeConfig` from a profile, resolving its secrets.
///
/// A missing refresh token is not an error here: simulator profiles don't
/// need one, and production ones fail with a configuration error on first
/// use.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let client_id = profile
        .client_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: "client id".into(),
        })?;

    let client_secret = match resolve_secret(profile, profile_name, SecretKind::ClientSecret) {
        Some(secret) => secret,
        None if profile.simulator => SecretString::from(String::new()),
        None => {
            return Err(ConfigError::NoCredentials {
                profile: profile_name.into(),
                what: "client secret".into(),
            });
        }
    };

    let base_url = profile
        .base_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|e| ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("{raw}: {e}"),
            })
        })
        .transpose()?;

    let oauth_defaults = OAuthConfig::default();
    let oauth = OAuthConfig {
        redirect_uri: profile
            .redirect_uri
            .clone()
            .unwrap_or(oauth_defaults.redirect_uri),
        scope: profile.scope.clone().unwrap_or(oauth_defaults.scope),
    };

    let stream = StreamConfig {
        reconnect: ReconnectConfig {
            max_retries: profile.max_retries,
            ..ReconnectConfig::default()
        },
        idle_timeout: Duration::from_secs(profile.idle_timeout.unwrap_or(defaults.idle_timeout)),
    };

    Ok(BridgeConfig {
        client_id,
        client_secret,
        refresh_token: resolve_secret(profile, profile_name, SecretKind::RefreshToken),
        simulation: profile.simulator,
        base_url,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        oauth,
        stream,
    })
}
