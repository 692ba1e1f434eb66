//! `vitalwatch watch`: follow the realtime event channel.
//!
//! Prints one line (or JSON document) per event until Ctrl-C, until
//! `--count` events have arrived, or until the channel gives up
//! reconnecting.

use chrono::{SecondsFormat, Utc};
use owo_colors::OwoColorize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};

use vitalwatch_api::realtime::{CONNECTED, DISCONNECTED, ERROR};
use vitalwatch_api::{ConnectionState, RealtimeChannel};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

struct Event {
    kind: String,
    data: Value,
    received_at: String,
}

pub async fn handle(
    channel: &RealtimeChannel,
    args: WatchArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let (tx, mut rx) = mpsc::unbounded_channel();

    for kind in &args.types {
        let tx = tx.clone();
        let name = kind.clone();
        channel.on(kind.as_str(), move |data| {
            let _ = tx.send(Event {
                kind: name.clone(),
                data: data.clone(),
                received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            });
        });
    }
    subscribe_lifecycle(channel, global.quiet);

    let url = channel.ws_url().to_string();
    if !channel.connect().await {
        output::print_note("initial connection failed, retrying", global.quiet);
    }

    let mut state = channel.watch_state();
    if *state.borrow_and_update() == ConnectionState::Disconnected {
        return Err(gave_up(channel, url));
    }

    let mut seen = 0_usize;
    let result = loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let line = match render_event(&event, format, color) {
                    Ok(line) => line,
                    Err(err) => break Err(err),
                };
                output::print_output(&line, global.quiet);
                seen += 1;
                if args.count.is_some_and(|n| seen >= n) {
                    break Ok(());
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if *state.borrow_and_update() == ConnectionState::Disconnected {
                    break Err(gave_up(channel, url));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
        }
    };

    channel.disconnect();
    result
}

/// Lifecycle events go to stderr so stdout stays machine-readable.
fn subscribe_lifecycle(channel: &RealtimeChannel, quiet: bool) {
    let url = channel.ws_url().to_string();
    channel.on(CONNECTED, move |_| {
        output::print_note(&format!("connected to {url}"), quiet);
    });
    channel.on(DISCONNECTED, move |data| {
        let code = data.get("code").and_then(Value::as_u64).unwrap_or_default();
        output::print_note(&format!("connection lost (code {code}), reconnecting"), quiet);
    });
    channel.on(ERROR, |data| {
        let message = data.get("error").and_then(Value::as_str).unwrap_or("unknown");
        warn!(error = message, "realtime channel error");
    });
}

fn gave_up(channel: &RealtimeChannel, url: String) -> CliError {
    CliError::RealtimeUnavailable {
        url,
        attempts: channel.reconnect_attempts(),
    }
}

fn render_event(event: &Event, format: OutputFormat, color: bool) -> Result<String, CliError> {
    let doc = || {
        json!({
            "type": event.kind,
            "data": event.data,
            "received_at": event.received_at,
        })
    };

    match format {
        OutputFormat::Table => {
            let data = event.data.to_string();
            Ok(if color {
                format!("{} {} {data}", event.received_at.dimmed(), event.kind.cyan())
            } else {
                format!("{} {} {data}", event.received_at, event.kind)
            })
        }
        OutputFormat::Json => output::render_json(&doc(), false),
        OutputFormat::JsonCompact => output::render_json(&doc(), true),
    }
}
