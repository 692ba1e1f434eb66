//! Clap derive structures for the `vitalwatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vitalwatch -- query and stream workforce telemetry
#[derive(Debug, Parser)]
#[command(
    name = "vitalwatch",
    version,
    about = "Query and stream workforce health telemetry from the command line",
    long_about = "Client for the vitalwatch telemetry API.\n\n\
        Reads are cached and fall back to offline data when the server is\n\
        unreachable; `watch` follows the live event channel and reconnects\n\
        automatically.",
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
    /// Telemetry server URL (overrides config)
    #[arg(long, short = 'u', env = "VITALWATCH_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// JSON file with offline data served when a read fails
    #[arg(long, global = true, value_name = "PATH")]
    pub fallback_file: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the config file's `output`)
    #[arg(long, short = 'o', global = true)]
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Probe the server's health endpoint
    Health,

    /// Fetch one endpoint by name
    Get(GetArgs),

    /// Fetch employee stats, IoT stats and locations together
    #[command(alias = "dash")]
    Snapshot,

    /// Latest health record for each employee
    HealthBatch(HealthBatchArgs),

    /// Submit a health or location reading
    Send(SendArgs),

    /// Follow the realtime event channel
    Watch(WatchArgs),

    /// List endpoint names and their resolved paths
    #[command(alias = "ep")]
    Endpoints,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Data commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Endpoint name, e.g. `stats` or `iot-health` (see `vitalwatch endpoints`)
    pub endpoint: String,

    /// Entity id appended to the path, e.g. EMP001
    pub id: Option<String>,

    /// Always hit the network
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct HealthBatchArgs {
    /// Employee ids
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Maximum requests in flight
    #[arg(long, short = 'b', default_value = "5")]
    pub batch_size: usize,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// What kind of reading the payload is
    pub kind: ReadingKind,

    /// JSON payload, or `-` to read it from stdin
    pub payload: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReadingKind {
    /// POST to the health readings endpoint
    Health,
    /// POST to the location endpoint
    Location,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Event types to print (repeatable)
    #[arg(
        long = "type",
        short = 't',
        value_name = "TYPE",
        default_values_t = [
            "health_update".to_owned(),
            "location_update".to_owned(),
            "alert".to_owned(),
        ]
    )]
    pub types: Vec<String>,

    /// Exit after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
