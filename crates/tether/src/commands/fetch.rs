//! `tether fetch`: GET one endpoint and print its value.

use tether_api::Endpoint;

use crate::cli::{FetchArgs, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: FetchArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let endpoint = Endpoint::new(&args.endpoint);
    if endpoint.is_empty() {
        return Err(CliError::Validation {
            field: "endpoint".into(),
            reason: "endpoint path cannot be empty".into(),
        });
    }

    let format = config::output_format(global, cfg)?;
    let (client, _) = config::api_client(&cfg.backend)?;
    let value = client.fetch(&endpoint).await.map_err(|e| {
        if e.is_not_found() {
            CliError::NotFound {
                endpoint: endpoint.to_string(),
            }
        } else {
            CliError::from(e)
        }
    })?;

    output::print_output(&output::render_value(&format, &value), global.quiet);
    Ok(())
}
