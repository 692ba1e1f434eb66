//! `vitalwatch send`: submit a health or location reading.

use std::io::Read;

use serde_json::Value;

use vitalwatch_api::ApiClient;

use crate::cli::{GlobalOpts, OutputFormat, ReadingKind, SendArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &ApiClient,
    args: SendArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let payload = parse_payload(&args.payload)?;

    let resp = match args.kind {
        ReadingKind::Health => client.send_health_data(&payload).await?,
        ReadingKind::Location => client.send_location_data(&payload).await?,
    };

    output::print_output(&output::render_value(format, &resp.data)?, global.quiet);
    Ok(())
}

/// Inline JSON, or stdin when the argument is `-`. Must be an object.
fn parse_payload(arg: &str) -> Result<Value, CliError> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        arg.to_owned()
    };

    let value: Value = serde_json::from_str(&text)?;
    if !value.is_object() {
        return Err(CliError::Validation {
            field: "payload".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}
