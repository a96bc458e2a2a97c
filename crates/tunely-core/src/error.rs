// ── Core error types ──
//
// Domain errors from tunely-core. Callers never see raw HTTP status codes;
// the `From<tunely_api::Error>` impl translates transport-layer errors into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream errors ──────────────────────────────────────────────
    #[error("Cannot reach the Tunes API: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limited by the Tunes API")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Not found upstream: {path}")]
    NotFound { path: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Room control ─────────────────────────────────────────────────
    #[error("Change not applied: {message}")]
    InvariantViolation { message: String },

    #[error("No room uses node {node_id}")]
    RoomNotFound { node_id: String },

    #[error("Installation {tune_id} has no room with active control")]
    NoActiveRoom { tune_id: String },

    #[error("Installation {tune_id} has no controller node")]
    ControllerNotFound { tune_id: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("Device {id} has been deleted")]
    DeviceDeleted { id: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if a later scheduled tick may succeed without any
    /// user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::RateLimited { .. }
                | Self::Api { status: Some(500..), .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tunely_api::Error> for CoreError {
    fn from(err: tunely_api::Error) -> Self {
        match err {
            tunely_api::Error::Unauthorized => CoreError::AuthenticationFailed {
                message: "access token rejected".into(),
            },
            tunely_api::Error::MissingCredential => CoreError::AuthenticationFailed {
                message: "no access token configured".into(),
            },
            tunely_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            tunely_api::Error::NotFound { path } => CoreError::NotFound { path },
            tunely_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            tunely_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
            tunely_api::Error::Transport(e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            tunely_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid API URL: {e}"),
            },
            tunely_api::Error::Tls(message) => CoreError::Config { message },
            tunely_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response shape: {message}"),
                status: None,
            },
        }
    }
}
