//! `tether watch`: mount a view against the live backend and print its
//! state every time it changes.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tether_core::{ExposedState, Subscribed};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = config::view(cfg, &args.view.view)?;
    let props = profile.props_with(config::parse_props(&args.view.props)?);
    let resolver = profile.resolver()?;

    let cancel = CancellationToken::new();
    let remote = Arc::new(config::connect(cfg, cancel.child_token())?);

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = ctrl_c.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                ctrl_c.cancel();
            }
        }
    });

    let format = config::output_format(global, cfg)?;
    let color = output::should_color(&global.color);
    let view = move |state: &ExposedState| output::render_exposed(&format, state, color);
    let engine = Subscribed::new(view, Arc::clone(&remote), resolver, cfg.engine.clone());

    // Held for the whole run: dropping the sender stops the engine.
    let (_props_tx, props_rx) = watch::channel(props);

    let mut spinner = (!global.quiet && std::io::stderr().is_terminal())
        .then(|| loading_spinner(&args.view.view));
    let mut printed = 0usize;
    let limit = args.count;
    let stop = cancel.clone();
    let quiet = global.quiet;

    let result = engine
        .run(props_rx, cancel.clone(), move |rendered: String| {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
            output::print_output(&rendered, quiet);
            printed += 1;
            if limit.is_some_and(|n| printed >= n) {
                stop.cancel();
            }
        })
        .await;

    cancel.cancel();
    remote.shutdown();
    result?;
    info!(view = %args.view.view, "watch finished");
    Ok(())
}

fn loading_spinner(view: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Loading {view}..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
