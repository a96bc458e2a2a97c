//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use tunely_config::ConfigError;
use tunely_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const INVARIANT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Tunes API")]
    #[diagnostic(
        code(tunely::connection_failed),
        help("Check your network connection and the api_url in your config.\nCause: {reason}")
    )]
    ConnectionFailed { reason: String },

    #[error("Rate limited by the Tunes API")]
    #[diagnostic(
        code(tunely::rate_limited),
        help("Wait {wait} before retrying.")
    )]
    RateLimited { wait: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(tunely::auth_failed),
        help(
            "The access token was rejected: {message}\n\
             Create a new token in the Ngenic app and store it in the keyring\n\
             (service 'tunely', entry 'access-token') or set access_token_env."
        )
    )]
    AuthFailed { message: String },

    #[error("No access token configured")]
    #[diagnostic(
        code(tunely::no_credentials),
        help(
            "Pass --token, set TUNELY_TOKEN, store it in the system keyring\n\
             (service 'tunely', entry 'access-token'), or add access_token to {path}"
        )
    )]
    NoCredentials { path: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(tunely::not_found),
        help("Run: tunely {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Room control ─────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(tunely::invariant),
        help("Activate another room sensor first; every installation needs at least one.")
    )]
    InvariantViolation { message: String },

    #[error("Operation not supported: {operation}")]
    #[diagnostic(code(tunely::unsupported))]
    Unsupported { operation: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(tunely::api_error))]
    Api { message: String },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tunely::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(tunely::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(tunely::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::RateLimited { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. }
            | Self::NoCredentials { .. }
            | Self::Config(ConfigError::NoCredentials) => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvariantViolation { .. } => exit_code::INVARIANT,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::RateLimited { retry_after_secs } => CliError::RateLimited {
                wait: retry_after_secs.map_or_else(|| "a minute".into(), |s| format!("{s}s")),
            },

            CoreError::NotFound { path } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: path,
                list_command: "pair tune".into(),
            },

            CoreError::RoomNotFound { node_id } => CliError::NotFound {
                resource_type: "room sensor".into(),
                identifier: node_id,
                list_command: "rooms <tune>".into(),
            },

            CoreError::DeviceNotFound { id } | CoreError::DeviceDeleted { id } => {
                CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: id,
                    list_command: "config show".into(),
                }
            }

            CoreError::ControllerNotFound { tune_id } | CoreError::NoActiveRoom { tune_id } => {
                CliError::NotFound {
                    resource_type: "controlled installation".into(),
                    identifier: tune_id,
                    list_command: "pair tune".into(),
                }
            }

            err @ CoreError::InvariantViolation { .. } => CliError::InvariantViolation {
                message: err.to_string(),
            },

            CoreError::Unsupported { operation } => CliError::Unsupported { operation },

            CoreError::Api { message, status } => CliError::Api {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Api { message },
        }
    }
}
