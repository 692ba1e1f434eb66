//! Read commands: `get`, `snapshot`, `health-batch`.

use owo_colors::OwoColorize;
use serde_json::{Value, json};
use tabled::Tabled;

use vitalwatch_api::{ApiClient, ApiResponse, Endpoint, Origin};

use crate::cli::{GetArgs, GlobalOpts, HealthBatchArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── get ──────────────────────────────────────────────────────────────

pub async fn get(
    client: &ApiClient,
    args: GetArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let endpoint = Endpoint::parse(&args.endpoint)?;
    let path = match args.id {
        Some(ref id) => client.endpoints().entity_path(endpoint, id),
        None => client.endpoints().path(endpoint).to_owned(),
    };

    let resp = if args.no_cache {
        client.get_fresh(&path).await?
    } else {
        client.get(&path).await?
    };

    note_origin(&resp, global);
    output::print_output(&output::render_value(format, &resp.data)?, global.quiet);
    Ok(())
}

// ── snapshot ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SectionRow {
    #[tabled(rename = "Section")]
    section: &'static str,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

pub async fn snapshot(
    client: &ApiClient,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let snap = client.dashboard_snapshot().await;
    let color = output::should_color(global.color);

    let sections = [
        ("employees_stats", &snap.employees_stats),
        ("iot_stats", &snap.iot_stats),
        ("locations", &snap.locations),
    ];

    let rows: Vec<SectionRow> = sections
        .iter()
        .map(|&(section, result)| match result {
            Ok(resp) => SectionRow {
                section,
                source: origin_label(resp.origin).into(),
                summary: summarize(&resp.data),
            },
            Err(err) => SectionRow {
                section,
                source: "error".into(),
                summary: if color {
                    err.red().to_string()
                } else {
                    err.to_string()
                },
            },
        })
        .collect();

    let mut data = serde_json::Map::new();
    for &(section, result) in &sections {
        let entry = match result {
            Ok(resp) => json!({ "origin": resp.origin, "data": resp.data }),
            Err(err) => json!({ "error": err.to_string() }),
        };
        data.insert(section.to_owned(), entry);
    }

    output::print_output(&output::render_rows(format, &data, &rows)?, global.quiet);

    // Partial data is still useful; only a total outage is an error.
    if snap.failures() == sections.len() {
        if let Err(err) = snap.employees_stats {
            return Err(err.into());
        }
    }
    Ok(())
}

/// A short description of a payload for the snapshot table.
fn summarize(data: &Value) -> String {
    match output::unwrap_envelope(data) {
        Value::Array(items) => format!("{} items", items.len()),
        Value::Object(map) => format!("{} fields", map.len()),
        other => output::cell(other),
    }
}

// ── health-batch ─────────────────────────────────────────────────────

#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Employee")]
    employee: String,
    #[tabled(rename = "Latest record")]
    record: String,
}

pub async fn health_batch(
    client: &ApiClient,
    args: HealthBatchArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.batch_size == 0 {
        return Err(CliError::Validation {
            field: "batch-size".into(),
            reason: "must be at least 1".into(),
        });
    }

    let latest = client
        .employees_health_batched(&args.ids, args.batch_size)
        .await;

    if latest.is_empty() {
        output::print_note("no health records found", global.quiet);
    }

    let rows: Vec<HealthRow> = latest
        .iter()
        .map(|(employee, record)| HealthRow {
            employee: employee.clone(),
            record: record.to_string(),
        })
        .collect();
    output::print_output(&output::render_rows(format, &latest, &rows)?, global.quiet);
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Live => "live",
        Origin::Cache => "cache",
        Origin::Fallback => "fallback",
    }
}

fn note_origin(resp: &ApiResponse, global: &GlobalOpts) {
    let color = output::should_color(global.color);
    if let Some(note) = output::origin_note(resp.origin, color) {
        output::print_note(&note, global.quiet);
    }
}
