//! `tether resolve`: print a view's endpoints without touching the network.

use crate::cli::{GlobalOpts, ViewArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ViewArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = config::view(cfg, &args.view)?;
    let props = profile.props_with(config::parse_props(&args.props)?);
    let mapping = profile.resolver()?.resolve(&props)?;
    let format = config::output_format(global, cfg)?;

    output::print_output(
        &output::render_mapping(&format, &mapping),
        global.quiet,
    );
    Ok(())
}
