use thiserror::Error;

/// Top-level error type for the `tunely-api` crate.
///
/// Covers every failure mode of the Tunes API surface: credentials,
/// transport, upstream status codes, and payload decoding.
/// `tunely-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The access token was rejected (HTTP 401/403).
    #[error("Unauthorized request -- check the access token")]
    Unauthorized,

    /// No access token has been configured yet.
    #[error("No access token configured")]
    MissingCredential,

    // ── Upstream status ─────────────────────────────────────────────
    /// Too many requests (HTTP 429).
    #[error("Too many requests -- retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The addressed resource does not exist (HTTP 404).
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// Any other non-2xx response.
    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the credential is missing or was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingCredential)
    }

    /// Returns `true` if a later attempt of the same call may succeed
    /// without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(Error::RateLimited { retry_after_secs: Some(30) }.is_transient());
        assert!(
            Error::Http {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Http {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
        assert!(!Error::Unauthorized.is_transient());
    }

    #[test]
    fn auth_classification() {
        assert!(Error::Unauthorized.is_auth());
        assert!(Error::MissingCredential.is_auth());
        assert!(!Error::NotFound { path: "/x".into() }.is_auth());
    }
}
