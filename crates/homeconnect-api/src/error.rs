use thiserror::Error;

/// Top-level error type for the `homeconnect-api` crate.
///
/// Either misconfiguration on our side or a failed exchange with the remote
/// API. A rejected access token surfaces as
/// [`Communication`](Self::Communication) only after the single retry has
/// also been refused.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Missing or unusable credential configuration
    /// (e.g. no refresh token outside simulation mode).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Communication ───────────────────────────────────────────────
    /// Unexpected HTTP status, transport failure, or malformed response body.
    ///
    /// `status` is `None` when no HTTP response was received at all
    /// (connection refused, DNS failure, timeout).
    #[error("Communication error{}: {message}", status_suffix(.status))]
    Communication {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The event streams were disposed while a subscription was being set up.
    #[error("event streams were disposed during subscribe")]
    Disposed,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn communication(
        status: Option<u16>,
        message: impl Into<String>,
        body: Option<String>,
    ) -> Self {
        Self::Communication {
            status,
            message: message.into(),
            body,
        }
    }

    /// Wrap a body that failed to deserialize.
    pub(crate) fn malformed(status: u16, err: &serde_json::Error, body: String) -> Self {
        let preview: String = body.chars().take(200).collect();
        Self::Communication {
            status: Some(status),
            message: format!("malformed response body: {err} (body preview: {preview:?})"),
            body: Some(body),
        }
    }

    /// Returns `true` for errors caused by local configuration
    /// rather than by the remote API.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::InvalidUrl(_))
    }

    /// HTTP status of the failed exchange, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Communication { status, .. } => *status,
            _ => None,
        }
    }

    /// Response body of the failed exchange, if one was read.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Communication { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if the API rejected our credentials even after a refresh.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Communication { status: None, .. } => true,
            Self::Communication {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::Communication {
            status: err.status().map(|s| s.as_u16()),
            message,
            body: None,
        }
    }
}
