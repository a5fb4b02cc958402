//! `tether views`: list the views configured under `[views]`.

use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ViewRow {
    #[tabled(rename = "View")]
    name: String,
    #[tabled(rename = "Keys")]
    keys: String,
    #[tabled(rename = "Default props")]
    props: String,
}

pub fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);
    if cfg.views.is_empty() && !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    let rows: Vec<ViewRow> = cfg
        .views
        .iter()
        .map(|(name, profile)| ViewRow {
            name: name.clone(),
            keys: profile.endpoints.keys().cloned().collect::<Vec<_>>().join(", "),
            props: serde_json::to_string(&profile.props).unwrap_or_default(),
        })
        .collect();

    let rendered = match config::output_format(global, cfg)? {
        OutputFormat::Table => tabled::Table::new(&rows)
            .with(tabled::settings::Style::rounded())
            .to_string(),
        OutputFormat::Plain => rows
            .iter()
            .map(|r| r.name.clone())
            .collect::<Vec<_>>()
            .join("\n"),
        format => {
            let value = serde_json::to_value(&cfg.views).unwrap_or_default();
            output::render_value(&format, &value)
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
