//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tether_config::ConfigError;
use tether_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend")]
    #[diagnostic(
        code(tether::connection_failed),
        help(
            "Check that the backend is running and accessible.\n\
             Set its URL with --url or `url` under [backend] in the config."
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS error: {message}")]
    #[diagnostic(
        code(tether::tls_error),
        help(
            "Use --insecure (-k) to accept a self-signed certificate,\n\
             or set ca_cert under [backend]."
        )
    )]
    Tls { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The backend rejected the request")]
    #[diagnostic(
        code(tether::auth_failed),
        help("Pass a token with --token or TETHER_TOKEN, or set token_env under [backend].")
    )]
    AuthFailed,

    // ── Resources ────────────────────────────────────────────────────

    #[error("Endpoint '{endpoint}' not found")]
    #[diagnostic(
        code(tether::not_found),
        help("Run: tether resolve <view> to see which endpoints a view uses")
    )]
    NotFound { endpoint: String },

    #[error("View '{name}' is not configured")]
    #[diagnostic(
        code(tether::unknown_view),
        help("Configured views: {available}\nAdd one under [views.{name}] in the config.")
    )]
    UnknownView { name: String, available: String },

    // ── Engine ───────────────────────────────────────────────────────

    #[error("API error: {message}")]
    #[diagnostic(code(tether::api_error))]
    Api { status: Option<u16>, message: String },

    #[error("Endpoint resolution failed: {message}")]
    #[diagnostic(
        code(tether::resolution),
        help("Check the view's endpoint templates and the props passed with -P.")
    )]
    Resolution { message: String },

    #[error("{message}")]
    #[diagnostic(code(tether::engine))]
    Engine { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tether::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found")]
    #[diagnostic(
        code(tether::no_config),
        help(
            "Create one with: tether config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(tether::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out")]
    #[diagnostic(
        code(tether::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    #[diagnostic(code(tether::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::NotFound { .. } | Self::UnknownView { .. } | Self::NoConfig { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Resolution { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<tether_api::Error> for CliError {
    fn from(err: tether_api::Error) -> Self {
        match err {
            tether_api::Error::Unauthorized => CliError::AuthFailed,
            tether_api::Error::Tls(message) => CliError::Tls { message },
            tether_api::Error::Transport(e) if e.is_timeout() => CliError::Timeout,
            tether_api::Error::Transport(e) if e.is_connect() => CliError::ConnectionFailed {
                source: Box::new(e),
            },
            tether_api::Error::InvalidUrl(e) => CliError::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },
            tether_api::Error::InvalidToken(reason) => CliError::Validation {
                field: "token".into(),
                reason,
            },
            other => CliError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Resolution { message } => CliError::Resolution { message },
            CoreError::Api { message, status } => CliError::Api { status, message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other => CliError::Engine {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownView { name } => CliError::UnknownView {
                name,
                available: "(none)".into(),
            },
            ConfigError::Serialization(e) => CliError::Toml(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
