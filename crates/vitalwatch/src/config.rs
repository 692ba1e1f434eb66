//! CLI-specific config helpers.
//!
//! Layers `GlobalOpts` flags over the shared `vitalwatch-config` loading
//! and builds the API client and realtime channel from the result.

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;

use vitalwatch_api::{ApiClient, RealtimeChannel};
pub use vitalwatch_config::{Config, config_path};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// The config file this invocation reads: `--config`, else the default.
pub fn active_config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config file and environment, then apply CLI flag overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = vitalwatch_config::load_config_from(&active_config_path(global))?;

    if let Some(ref url) = global.base_url {
        cfg.base_url.clone_from(url);
    }
    if let Some(ms) = global.timeout_ms {
        cfg.timeout_ms = ms;
    }
    if let Some(ref path) = global.fallback_file {
        cfg.fallback_file = Some(path.clone());
    }
    if global.insecure {
        cfg.insecure = true;
    }

    tracing::debug!(base_url = %cfg.base_url, timeout_ms = cfg.timeout_ms, "configuration resolved");
    Ok(cfg)
}

/// `--output` if given, else the config's `output`, else table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&cfg.output, true).ok())
        .unwrap_or(OutputFormat::Table)
}

/// Build the HTTP client, attaching the fallback file when configured.
pub fn build_client(cfg: &Config) -> Result<ApiClient, CliError> {
    let client = ApiClient::new(cfg.to_client_config()?)?;
    Ok(match cfg.fallback_table()? {
        Some(table) => {
            tracing::debug!(entries = table.len(), "fallback data loaded");
            client.with_fallback(Arc::new(table))
        }
        None => client,
    })
}

/// Build the realtime channel for the configured server.
pub fn build_channel(cfg: &Config) -> Result<RealtimeChannel, CliError> {
    let base = cfg.base_url()?;
    Ok(RealtimeChannel::new(&base, cfg.to_realtime_config())?)
}
