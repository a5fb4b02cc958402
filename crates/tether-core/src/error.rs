// ── Core error types ──
//
// Engine-level errors from tether-core. Every variant is scoped to one
// key or one reconciliation cycle; none is fatal to the process.
// The `From<tether_api::Error>` impl translates transport-layer errors.

use thiserror::Error;

use tether_api::{Action, Endpoint};

use crate::mapping::Key;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Resolution errors ────────────────────────────────────────────
    /// The endpoint resolver failed; the reconciliation cycle is aborted.
    #[error("Endpoint resolution failed: {message}")]
    Resolution { message: String },

    // ── Subscription errors ──────────────────────────────────────────
    /// Subscribing one key's endpoint failed; other keys are unaffected.
    #[error("Cannot subscribe to {endpoint}: {reason}")]
    Subscribe { endpoint: Endpoint, reason: String },

    // ── Projection errors ────────────────────────────────────────────
    /// An event is incompatible with the current slice; the slice is unchanged.
    #[error("Cannot apply {action} to slice '{key}': {reason}")]
    Projection {
        key: Key,
        action: Action,
        reason: String,
    },

    // ── Fetch errors ─────────────────────────────────────────────────
    #[error("Fetching {endpoint} failed: {reason}")]
    Fetch { endpoint: Endpoint, reason: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Subscription engine has been torn down")]
    TornDown,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tether_api::Error> for CoreError {
    fn from(err: tether_api::Error) -> Self {
        let status = err.status();
        match err {
            tether_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tether_api::Error::InvalidToken(reason) => CoreError::Config {
                message: format!("Invalid access token: {reason}"),
            },
            tether_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            tether_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api {
                message: other.to_string(),
                status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_their_code() {
        let err = CoreError::from(tether_api::Error::Status {
            status: 404,
            message: "gone".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(404), .. }));
    }

    #[test]
    fn bad_token_is_config_error() {
        let err = CoreError::from(tether_api::Error::InvalidToken("newline".into()));
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn undecodable_body_is_internal() {
        let err = CoreError::from(tether_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        });
        assert!(matches!(err, CoreError::Internal(ref m) if m.contains("expected value")));
        assert!(!err.to_string().contains("<html>"));
    }

    #[test]
    fn server_errors_stay_api_errors() {
        let err = CoreError::from(tether_api::Error::Status {
            status: 500,
            message: "boom".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }
}
