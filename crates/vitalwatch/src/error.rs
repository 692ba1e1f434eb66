//! CLI error types with miette diagnostics.
//!
//! Maps library and config errors into user-facing errors with
//! actionable help text and a distinct process exit code.

use miette::Diagnostic;
use thiserror::Error;

use vitalwatch_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the telemetry server at {url}")]
    #[diagnostic(
        code(vitalwatch::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             URL: {url}\n\
             Set a different server with --base-url or VITALWATCH_BASE_URL."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Telemetry server at {url} is not healthy")]
    #[diagnostic(
        code(vitalwatch::offline),
        help("The health endpoint did not report status \"healthy\".")
    )]
    Offline { url: String },

    #[error("Realtime channel at {url} gave up after {attempts} reconnect attempts")]
    #[diagnostic(
        code(vitalwatch::realtime_unavailable),
        help("Raise realtime.max_reconnect_attempts or check the server's /ws endpoint.")
    )]
    RealtimeUnavailable { url: String, attempts: u32 },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(vitalwatch::timeout),
        help("Increase the timeout with --timeout-ms or check server responsiveness.")
    )]
    Timeout { timeout_ms: u64 },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Server returned HTTP {code} {status_text}")]
    #[diagnostic(code(vitalwatch::http_status))]
    HttpStatus { code: u16, status_text: String },

    #[error(transparent)]
    #[diagnostic(code(vitalwatch::api))]
    Api(vitalwatch_api::Error),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Unknown endpoint '{name}'")]
    #[diagnostic(
        code(vitalwatch::unknown_endpoint),
        help("Run: vitalwatch endpoints to see available names")
    )]
    UnknownEndpoint { name: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vitalwatch::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(vitalwatch::json), help("Check the payload and try again."))]
    Json(#[from] serde_json::Error),

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(vitalwatch::config),
        help("Run: vitalwatch config show to inspect the resolved configuration")
    )]
    Config(#[from] ConfigError),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(vitalwatch::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. }
            | Self::Offline { .. }
            | Self::RealtimeUnavailable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnknownEndpoint { .. } | Self::Validation { .. } | Self::Json(_) => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::HttpStatus { .. } | Self::Api(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── vitalwatch_api::Error → CliError mapping ─────────────────────────

impl From<vitalwatch_api::Error> for CliError {
    fn from(err: vitalwatch_api::Error) -> Self {
        use vitalwatch_api::Error as ApiError;

        match err {
            ApiError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },

            ApiError::Network(e) if e.is_connect() || e.is_request() => {
                CliError::ConnectionFailed {
                    url: e.url().map(ToString::to_string).unwrap_or_default(),
                    source: Box::new(e),
                }
            }

            ApiError::HttpStatus { code, status_text } => {
                CliError::HttpStatus { code, status_text }
            }

            ApiError::UnknownEndpoint(name) => CliError::UnknownEndpoint { name },

            other => CliError::Api(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let timeout = CliError::from(vitalwatch_api::Error::Timeout { timeout_ms: 10 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let unknown = CliError::from(vitalwatch_api::Error::UnknownEndpoint("x".into()));
        assert_eq!(unknown.exit_code(), exit_code::USAGE);

        let status = CliError::from(vitalwatch_api::Error::HttpStatus {
            code: 500,
            status_text: "Internal Server Error".into(),
        });
        assert_eq!(status.exit_code(), exit_code::GENERAL);

        let offline = CliError::Offline { url: "http://x".into() };
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);

        let config = CliError::from(ConfigError::Validation {
            field: "base_url".into(),
            reason: "bad".into(),
        });
        assert_eq!(config.exit_code(), exit_code::CONFIG);
    }
}
