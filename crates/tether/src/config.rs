//! CLI configuration: a thin layer over `tether_config`.
//!
//! Loads the config file selected by `--config` (or the platform default)
//! and applies the `GlobalOpts` overrides (--url, --token, -k, --timeout).

use std::path::PathBuf;

use clap::ValueEnum;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tether_api::{ApiClient, EventHub, TransportConfig};
use tether_core::{Props, Remote};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use tether_config::{BackendConfig, Config, ViewProfile, load_config_from, save_config_to};

// ── Loading ─────────────────────────────────────────────────────────

/// The config file this invocation reads and writes.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(tether_config::config_path)
}

/// Load the config and apply flag overrides to its `[backend]` table.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config_from(&config_path(global))?;
    apply_overrides(&mut cfg.backend, global);
    Ok(cfg)
}

fn apply_overrides(backend: &mut BackendConfig, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        backend.url.clone_from(url);
    }
    if let Some(ref token) = global.token {
        // An explicit token beats any token_env lookup.
        backend.token = Some(token.clone());
        backend.token_env = None;
    }
    if global.insecure {
        backend.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        backend.timeout = timeout;
    }
}

/// `-o` if given, else `output` under `[defaults]`.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> Result<OutputFormat, CliError> {
    if let Some(ref format) = global.output {
        return Ok(format.clone());
    }
    OutputFormat::from_str(&cfg.defaults.output, true).map_err(|reason| CliError::Validation {
        field: "defaults.output".into(),
        reason,
    })
}

/// Look up a view, listing the configured ones when it is missing.
pub fn view<'a>(cfg: &'a Config, name: &str) -> Result<&'a ViewProfile, CliError> {
    cfg.views.get(name).ok_or_else(|| CliError::UnknownView {
        name: name.into(),
        available: if cfg.views.is_empty() {
            "(none)".into()
        } else {
            cfg.views.keys().cloned().collect::<Vec<_>>().join(", ")
        },
    })
}

// ── Props ───────────────────────────────────────────────────────────

/// Parse `-P KEY=VALUE` pairs. A value that parses as JSON is taken as
/// JSON; anything else is a plain string.
pub fn parse_props(pairs: &[String]) -> Result<Props, CliError> {
    let mut props = Props::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| CliError::Validation {
            field: "prop".into(),
            reason: format!("expected KEY=VALUE, got '{pair}'"),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::Validation {
                field: "prop".into(),
                reason: format!("empty key in '{pair}'"),
            });
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        props.insert(key.to_owned(), value);
    }
    Ok(props)
}

// ── Transport ───────────────────────────────────────────────────────

pub fn api_client(backend: &BackendConfig) -> Result<(ApiClient, TransportConfig), CliError> {
    let transport = backend.transport();
    let client = ApiClient::new(backend.base_url()?, &transport)?;
    Ok((client, transport))
}

/// A transport with a live event socket behind it. Must be called from
/// within the runtime; the socket task stops when `cancel` fires.
pub fn connect(cfg: &Config, cancel: CancellationToken) -> Result<Remote, CliError> {
    let (client, transport) = api_client(&cfg.backend)?;
    let hub = EventHub::connect(
        cfg.backend.ws_url()?,
        (&cfg.reconnect).into(),
        cancel,
        transport.authorization()?,
    );
    Ok(Remote::new(client, hub))
}

/// A fetch-only transport: its hub never receives frames.
pub fn detached(cfg: &Config) -> Result<Remote, CliError> {
    let (client, _) = api_client(&cfg.backend)?;
    Ok(Remote::new(client, EventHub::detached(CancellationToken::new())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn props_parse_json_or_string() {
        let props = parse_props(&[
            "code=btc".into(),
            "limit=10".into(),
            "flags={\"a\":true}".into(),
            "empty=".into(),
        ])
        .unwrap();
        assert_eq!(props["code"], json!("btc"));
        assert_eq!(props["limit"], json!(10));
        assert_eq!(props["flags"], json!({ "a": true }));
        assert_eq!(props["empty"], json!(""));
    }

    #[test]
    fn props_without_equals_are_rejected() {
        let err = parse_props(&["code".into()]).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }

    fn opts(output: Option<OutputFormat>) -> GlobalOpts {
        GlobalOpts {
            config: None,
            url: None,
            token: None,
            output,
            color: crate::cli::ColorMode::Never,
            verbose: 0,
            quiet: false,
            yes: false,
            insecure: false,
            timeout: None,
        }
    }

    #[test]
    fn output_falls_back_to_config_default() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json-compact".into();

        assert!(matches!(
            output_format(&opts(None), &cfg).unwrap(),
            OutputFormat::JsonCompact
        ));
        assert!(matches!(
            output_format(&opts(Some(OutputFormat::Yaml)), &cfg).unwrap(),
            OutputFormat::Yaml
        ));
        assert!(matches!(
            output_format(&opts(None), &Config::default()).unwrap(),
            OutputFormat::Table
        ));

        cfg.defaults.output = "xml".into();
        assert!(matches!(
            output_format(&opts(None), &cfg),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn flags_override_backend() {
        let mut backend = BackendConfig {
            token_env: Some("SOME_VAR".into()),
            ..BackendConfig::default()
        };
        let global = GlobalOpts {
            config: None,
            url: Some("http://backend:9000".into()),
            token: Some("abc".into()),
            output: Some(OutputFormat::Plain),
            color: crate::cli::ColorMode::Never,
            verbose: 0,
            quiet: false,
            yes: false,
            insecure: true,
            timeout: Some(5),
        };
        apply_overrides(&mut backend, &global);
        assert_eq!(backend.url, "http://backend:9000");
        assert_eq!(backend.token.as_deref(), Some("abc"));
        assert!(backend.token_env.is_none());
        assert!(backend.insecure);
        assert_eq!(backend.timeout, 5);
    }
}
