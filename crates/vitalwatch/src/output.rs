//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`;
//! JSON goes through serde. Arbitrary server payloads are tabulated by
//! shape since the API has no fixed schema.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use vitalwatch_api::Origin;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// One-line note for data that did not come live from the server.
pub fn origin_note(origin: Origin, color: bool) -> Option<String> {
    let text = match origin {
        Origin::Live => return None,
        Origin::Cache => "served from cache",
        Origin::Fallback => "server unavailable, showing offline data",
    };
    Some(if color {
        format!("{}", text.yellow())
    } else {
        text.to_owned()
    })
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render rows in the chosen format. `data` is what JSON formats emit.
pub fn render_rows<T, R>(format: OutputFormat, data: &T, rows: &[R]) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
    R: Tabled,
{
    match format {
        OutputFormat::Table => Ok(render_table(rows)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Render an arbitrary JSON payload in the chosen format.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(value_table(unwrap_envelope(value))),
        OutputFormat::Json => render_json(value, false),
        OutputFormat::JsonCompact => render_json(value, true),
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

/// Print a status note to stderr, respecting quiet mode.
pub fn print_note(note: &str, quiet: bool) {
    if quiet {
        return;
    }
    let _ = writeln!(io::stderr().lock(), "{note}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

/// Most endpoints answer `{success, data}`; tables show just `data`.
pub fn unwrap_envelope(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.contains_key("success") => map.get("data").unwrap_or(value),
        _ => value,
    }
}

/// Tabulate a JSON value by shape.
///
/// Objects become field/value pairs, arrays of objects get one column per
/// key (in first-seen order), anything else is printed as-is.
pub fn value_table(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, v) in map {
                builder.push_record([key.clone(), cell(v)]);
            }
            finish(builder)
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let mut columns: Vec<&str> = Vec::new();
            for item in items.iter().filter_map(Value::as_object) {
                for key in item.keys() {
                    if !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }

            let mut builder = Builder::default();
            builder.push_record(columns.iter().copied());
            for item in items {
                builder.push_record(
                    columns
                        .iter()
                        .map(|col| item.get(*col).map(cell).unwrap_or_default()),
                );
            }
            finish(builder)
        }
        Value::Array(items) => {
            let mut builder = Builder::default();
            builder.push_record(["Value"]);
            for item in items {
                builder.push_record([cell(item)]);
            }
            finish(builder)
        }
        other => cell(other),
    }
}

fn finish(builder: Builder) -> String {
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Strings print bare, `null` prints empty, everything else as compact JSON.
pub fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
