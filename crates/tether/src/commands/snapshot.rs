//! `tether snapshot`: load a view once and print it.
//!
//! Resolves, fetches every key concurrently and merges the result with the
//! view's props. No subscription is opened.

use tracing::debug;

use tether_core::{MergeGate, MirroredState, SliceFailure, load_all};

use crate::cli::{GlobalOpts, ViewArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: ViewArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = config::view(cfg, &args.view)?;
    let props = profile.props_with(config::parse_props(&args.props)?);
    let mapping = profile.resolver()?.resolve(&props)?;
    let format = config::output_format(global, cfg)?;
    let remote = config::detached(cfg)?;

    let mut mirrored = MirroredState::new();
    let results = load_all(&remote, &mapping).await;
    for ((key, result), (_, endpoint)) in results.into_iter().zip(mapping.iter()) {
        match result {
            Ok(value) => {
                mirrored.write(key, value);
            }
            Err(e) => {
                debug!(key = %key, error = %e, "initial fetch failed");
                mirrored.fail(key, SliceFailure::new(endpoint.clone(), e.to_string()));
            }
        }
    }

    let exposed = MergeGate::merge(&mirrored, &props, true);
    let color = output::should_color(&global.color);
    output::print_output(
        &output::render_exposed(&format, &exposed, color),
        global.quiet,
    );
    Ok(())
}
