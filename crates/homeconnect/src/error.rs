//! CLI error types with miette diagnostics.
//!
//! Maps API and config errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homeconnect_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Home Connect API")]
    #[diagnostic(
        code(hc::connection_failed),
        help(
            "{reason}\n\
             Check your network connection, or --base-url if you set one."
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(hc::auth_failed),
        help(
            "The API rejected the access token even after a refresh.\n\
             Your refresh token may have been revoked. Run: hc config init --token <NEW_TOKEN>"
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(hc::no_credentials),
        help(
            "Configure credentials with: hc config init --id <CLIENT_ID> --secret <SECRET>\n\
             Or set HOMECONNECT_CLIENT_ID / HOMECONNECT_CLIENT_SECRET."
        )
    )]
    NoCredentials { profile: String, what: String },

    #[error("Not configured: {message}")]
    #[diagnostic(
        code(hc::not_configured),
        help(
            "Production accounts need a refresh token: hc config init --token <TOKEN>\n\
             Or set HOMECONNECT_REFRESH_TOKEN. Use --simulator for the developer simulator."
        )
    )]
    NotConfigured { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Not found: {message}")]
    #[diagnostic(
        code(hc::not_found),
        help("Run: hc appliances to see the appliances paired with this account")
    )]
    NotFound { message: String },

    #[error("The appliance refused the request (HTTP 409)")]
    #[diagnostic(
        code(hc::conflict),
        help("The appliance may be off, offline, or not allowing remote control.\n{body}")
    )]
    Conflict { body: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(hc::api_error), help("Response body: {body}"))]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hc::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hc::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: hc config init --name {name} --id <CLIENT_ID>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(hc::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(hc::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::NotConfigured { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<homeconnect_core::Error> for CliError {
    fn from(err: homeconnect_core::Error) -> Self {
        use homeconnect_core::Error;

        match err {
            Error::Configuration { message } => Self::NotConfigured { message },
            err @ Error::Disposed => Self::ConnectionFailed {
                reason: err.to_string(),
            },
            Error::InvalidUrl(e) => Self::Validation {
                field: "base URL".into(),
                reason: e.to_string(),
            },
            Error::Communication {
                status: None,
                message,
                ..
            } => Self::ConnectionFailed { reason: message },
            Error::Communication {
                status: Some(401),
                message,
                ..
            } => Self::AuthFailed { message },
            Error::Communication {
                status: Some(404),
                message,
                ..
            } => Self::NotFound { message },
            Error::Communication {
                status: Some(409),
                body,
                ..
            } => Self::Conflict {
                body: body.unwrap_or_default(),
            },
            Error::Communication {
                status: Some(status),
                message,
                body,
            } => Self::Api {
                status,
                message,
                body: body.unwrap_or_default(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile, what } => Self::NoCredentials { profile, what },
            ConfigError::ProfileNotFound { name, available } => {
                Self::ProfileNotFound { name, available }
            }
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn communication(status: Option<u16>) -> homeconnect_core::Error {
        homeconnect_core::Error::Communication {
            status,
            message: "boom".into(),
            body: Some("{}".into()),
        }
    }

    #[test]
    fn exit_codes_follow_http_status() {
        assert_eq!(CliError::from(communication(None)).exit_code(), exit_code::CONNECTION);
        assert_eq!(CliError::from(communication(Some(401))).exit_code(), exit_code::AUTH);
        assert_eq!(CliError::from(communication(Some(404))).exit_code(), exit_code::NOT_FOUND);
        assert_eq!(CliError::from(communication(Some(409))).exit_code(), exit_code::CONFLICT);
        assert_eq!(CliError::from(communication(Some(500))).exit_code(), exit_code::GENERAL);
        assert_eq!(
            CliError::from(homeconnect_core::Error::Disposed).exit_code(),
            exit_code::CONNECTION
        );
    }

    #[test]
    fn configuration_errors_map_to_auth_exit_code() {
        let err = CliError::from(homeconnect_core::Error::Configuration {
            message: "no refresh token".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = CliError::from(ConfigError::NoCredentials {
            profile: "default".into(),
            what: "client id".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
