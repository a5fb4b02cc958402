//! Configuration for tether.
//!
//! TOML file + `TETHER_*` environment, loaded with figment, and the
//! translation into `tether_api` transport settings, `tether_core` engine
//! options and per-view endpoint resolvers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tether_api::{ReconnectConfig, TlsMode, TransportConfig};
use tether_core::{EndpointResolver, EngineOptions, Props};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no view named '{name}' is configured")]
    UnknownView { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

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
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub engine: EngineOptions,

    /// Named views: which endpoints feed which slot.
    #[serde(default)]
    pub views: IndexMap<String, ViewProfile>,
}

impl Config {
    pub fn view(&self, name: &str) -> Result<&ViewProfile, ConfigError> {
        self.views.get(name).ok_or_else(|| ConfigError::UnknownView {
            name: name.into(),
        })
    }
}

/// What the CLI falls back to when no flag is given.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// `table`, `json`, `json-compact`, `yaml` or `plain`.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}

/// Where the backend lives and how to reach it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend base URL; endpoints are served under `{url}/api/`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Path of the push event socket, relative to `url`.
    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Bearer token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            websocket_path: default_websocket_path(),
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            token: None,
            token_env: None,
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8082".into()
}
fn default_websocket_path() -> String {
    "api/events".into()
}
fn default_timeout() -> u64 {
    30
}

impl BackendConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        self.url.parse().map_err(|e| ConfigError::Validation {
            field: "backend.url".into(),
            reason: format!("invalid URL '{}': {e}", self.url),
        })
    }

    /// Socket URL: the base URL with a `ws`/`wss` scheme plus `websocket_path`.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        let base = self.base_url()?;
        tether_api::websocket::ws_url(&base, &self.websocket_path).map_err(|e| {
            ConfigError::Validation {
                field: "backend.websocket_path".into(),
                reason: e.to_string(),
            }
        })
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        }
    }

    /// Resolve the bearer token: `token_env` first, then plaintext `token`.
    pub fn resolve_token(&self) -> Option<SecretString> {
        if let Some(ref env_name) = self.token_env {
            if let Ok(val) = std::env::var(env_name) {
                return Some(SecretString::from(val));
            }
        }
        self.token.clone().map(SecretString::from)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls_mode(),
            timeout: Duration::from_secs(self.timeout),
            token: self.resolve_token(),
        }
    }
}

/// Socket reconnection backoff, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Give up after this many attempts. Unset retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: None,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_retries: settings.max_retries,
        }
    }
}

/// A named view: slot → endpoint template, plus default props.
///
/// ```toml
/// [views.account.endpoints]
/// transactions = "account/{code}/transactions"
/// balance = "account/{code}/balance"
///
/// [views.account.props]
/// code = "btc"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ViewProfile {
    #[serde(default)]
    pub endpoints: IndexMap<String, String>,

    #[serde(default)]
    pub props: Props,
}

impl ViewProfile {
    pub fn resolver(&self) -> Result<EndpointResolver, ConfigError> {
        EndpointResolver::templated(self.endpoints.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e| ConfigError::Validation {
                field: "endpoints".into(),
                reason: e.to_string(),
            })
    }

    /// Default props with `overrides` applied on top.
    pub fn props_with(&self, overrides: Props) -> Props {
        let mut props = self.props.clone();
        props.extend(overrides);
        props
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "tether", "tether").map_or_else(
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
    p.push("tether");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: defaults, then the TOML file at `path`, then
/// `TETHER_*` variables (`TETHER_BACKEND__URL` sets `backend.url`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TETHER_").split("__"))
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
