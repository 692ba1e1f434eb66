//! `vitalwatch endpoints`: the resolved endpoint table.

use std::collections::BTreeMap;

use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

pub fn handle(cfg: &Config, format: OutputFormat, global: &GlobalOpts) -> Result<(), CliError> {
    let client_config = cfg.to_client_config()?;

    let rows: Vec<EndpointRow> = client_config
        .endpoints
        .entries()
        .map(|(endpoint, path)| EndpointRow {
            name: endpoint.to_string(),
            path: path.to_owned(),
        })
        .collect();
    let data: BTreeMap<&str, &str> = rows
        .iter()
        .map(|row| (row.name.as_str(), row.path.as_str()))
        .collect();

    output::print_output(&output::render_rows(format, &data, &rows)?, global.quiet);
    Ok(())
}
