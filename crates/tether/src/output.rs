//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits `key=value` lines.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use tether_core::{EndpointsMapping, ExposedState};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render one exposed state.
///
/// Table and plain output list each value on its own row; failed keys
/// are listed after them.
pub fn render_exposed(format: &OutputFormat, state: &ExposedState, color: bool) -> String {
    match format {
        OutputFormat::Table => {
            let mut rows: Vec<SlotRow> = state
                .values
                .iter()
                .map(|(key, value)| SlotRow {
                    key: key.clone(),
                    value: inline(value),
                })
                .collect();
            for (key, failure) in &state.failures {
                let message = format!("error: {}", failure.message);
                rows.push(SlotRow {
                    key: key.to_string(),
                    value: if color {
                        message.red().to_string()
                    } else {
                        message
                    },
                });
            }
            render_table(&rows)
        }
        OutputFormat::Json => render_json(state, false),
        OutputFormat::JsonCompact => render_json(state, true),
        OutputFormat::Yaml => render_yaml(state),
        OutputFormat::Plain => {
            let mut lines: Vec<String> = state
                .values
                .iter()
                .map(|(key, value)| format!("{key}={}", inline(value)))
                .collect();
            lines.extend(
                state
                    .failures
                    .iter()
                    .map(|(key, failure)| format!("{key}!={}", failure.message)),
            );
            lines.join("\n")
        }
    }
}

pub fn render_mapping(format: &OutputFormat, mapping: &EndpointsMapping) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<EndpointRow> = mapping
                .iter()
                .map(|(key, endpoint)| EndpointRow {
                    key: key.to_string(),
                    endpoint: endpoint.to_string(),
                })
                .collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(mapping, false),
        OutputFormat::JsonCompact => render_json(mapping, true),
        OutputFormat::Yaml => render_yaml(mapping),
        OutputFormat::Plain => mapping
            .iter()
            .map(|(key, endpoint)| format!("{key}={endpoint}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render an arbitrary JSON value. Tables are used for objects only.
pub fn render_value(format: &OutputFormat, value: &Value) -> String {
    match (format, value) {
        (OutputFormat::Table, Value::Object(map)) => {
            let rows: Vec<SlotRow> = map
                .iter()
                .map(|(key, value)| SlotRow {
                    key: key.clone(),
                    value: inline(value),
                })
                .collect();
            render_table(&rows)
        }
        (OutputFormat::Table | OutputFormat::Json, _) => render_json(value, false),
        (OutputFormat::JsonCompact, _) => render_json(value, true),
        (OutputFormat::Yaml, _) => render_yaml(value),
        (OutputFormat::Plain, _) => inline(value),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

/// Strings print bare, everything else as compact JSON.
fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => render_json_compact(other),
    }
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    if compact {
        render_json_compact(data)
    } else {
        serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
