//! Clap derive structures for the `tether` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tether -- live views over a push-synchronized backend
#[derive(Debug, Parser)]
#[command(
    name = "tether",
    version,
    about = "Watch live, event-synchronized views of a tether backend",
    long_about = "Resolves a configured view's endpoints from its props, loads them,\n\
        subscribes to their push events and prints the merged state every\n\
        time it changes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TETHER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, short = 'u', env = "TETHER_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long, env = "TETHER_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format (defaults to `output` under [defaults], then table)
    #[arg(long, short = 'o', env = "TETHER_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "TETHER_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "TETHER_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain `key=value` lines (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mount a view and print its state on every change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Load a view once and print its state
    #[command(alias = "snap")]
    Snapshot(ViewArgs),

    /// Print the endpoints a view resolves to (no network access)
    Resolve(ViewArgs),

    /// Fetch one endpoint
    Fetch(FetchArgs),

    /// List configured views
    Views,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── View Arguments ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// Name of a view under `[views]` in the config
    pub view: String,

    /// Set a prop, e.g. `-P code=btc`. Values parse as JSON when they can.
    #[arg(long = "prop", short = 'P', value_name = "KEY=VALUE")]
    pub props: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Exit after printing this many states
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Endpoint path, e.g. `account/btc/status`
    pub endpoint: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
