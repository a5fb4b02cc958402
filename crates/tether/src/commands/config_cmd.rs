//! Config subcommand handlers.

use dialoguer::Confirm;
use serde_json::json;

use tether_config::ViewProfile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// A config with the given backend URL and one example view.
fn starter_config(url: Option<&str>) -> Config {
    let mut cfg = Config::default();
    if let Some(url) = url {
        cfg.backend.url = url.to_owned();
    }

    let mut account = ViewProfile::default();
    account
        .endpoints
        .insert("transactions".into(), "account/{code}/transactions".into());
    account
        .endpoints
        .insert("balance".into(), "account/{code}/balance".into());
    account.props.insert("code".into(), json!("btc"));
    cfg.views.insert("account".into(), account);
    cfg
}

/// Serialize for display with the plaintext token masked.
fn redacted_toml(cfg: &Config) -> Result<String, CliError> {
    let mut shown = cfg.clone();
    if shown.backend.token.is_some() {
        shown.backend.token = Some("****".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        ConfigCommand::Init => {
            if path.exists() && !global.yes {
                let overwrite = Confirm::new()
                    .with_prompt(format!("{} exists. Overwrite?", path.display()))
                    .default(false)
                    .interact()
                    .map_err(prompt_err)?;
                if !overwrite {
                    return Ok(());
                }
            }

            let cfg = starter_config(global.url.as_deref());
            config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let rendered = match config::output_format(global, &cfg)? {
                crate::cli::OutputFormat::Table | crate::cli::OutputFormat::Plain => {
                    redacted_toml(&cfg)?
                }
                format => {
                    let toml = redacted_toml(&cfg)?;
                    let value: serde_json::Value =
                        toml::from_str(&toml).map_err(|e| CliError::Validation {
                            field: "config".into(),
                            reason: e.to_string(),
                        })?;
                    output::render_value(&format, &value)
                }
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), false);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starter_view_resolves() {
        let cfg = starter_config(Some("http://backend:1234"));
        assert_eq!(cfg.backend.url, "http://backend:1234");
        let view = cfg.view("account").unwrap();
        let mapping = view.resolver().unwrap().resolve(&view.props).unwrap();
        assert_eq!(
            mapping.get("balance").map(ToString::to_string).as_deref(),
            Some("account/btc/balance")
        );
    }

    #[test]
    fn token_is_masked() {
        let mut cfg = Config::default();
        cfg.backend.token = Some("secret".into());
        let shown = redacted_toml(&cfg).unwrap();
        assert!(shown.contains("****"));
        assert!(!shown.contains("secret"));
    }
}
