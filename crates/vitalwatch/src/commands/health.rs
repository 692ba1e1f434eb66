//! `vitalwatch health`: probe the server and report connectivity.

use tabled::Tabled;

use vitalwatch_api::ApiClient;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn handle(
    client: &ApiClient,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let online = client.check_connection().await;
    let status = client.connection_status();

    let rows = [
        StatusRow {
            field: "Online",
            value: String::from(if online { "yes" } else { "no" }),
        },
        StatusRow {
            field: "Server",
            value: status.base_url.clone(),
        },
        StatusRow {
            field: "Checked",
            value: status
                .last_check
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        },
    ];
    output::print_output(&output::render_rows(format, &status, &rows)?, global.quiet);

    if online {
        Ok(())
    } else {
        Err(CliError::Offline {
            url: status.base_url,
        })
    }
}
