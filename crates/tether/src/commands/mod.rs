//! Command dispatch: routes parsed CLI commands to their handlers.

pub mod config_cmd;
pub mod fetch;
pub mod resolve;
pub mod snapshot;
pub mod views;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command that reads the config file.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;

    match cmd {
        Command::Watch(args) => watch::handle(args, &cfg, global).await,
        Command::Snapshot(args) => snapshot::handle(args, &cfg, global).await,
        Command::Resolve(args) => resolve::handle(&args, &cfg, global),
        Command::Fetch(args) => fetch::handle(args, &cfg, global).await,
        Command::Views => views::handle(&cfg, global),
        Command::Config(_) | Command::Completions(_) => unreachable!("handled before dispatch"),
    }
}
