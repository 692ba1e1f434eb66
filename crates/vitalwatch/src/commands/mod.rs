//! Command dispatch: bridges CLI args -> library calls -> output formatting.

pub mod config_cmd;
pub mod data;
pub mod endpoints;
pub mod health;
pub mod send;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let format = config::output_format(global, cfg);

    match cmd {
        Command::Health => health::handle(&config::build_client(cfg)?, format, global).await,
        Command::Get(args) => data::get(&config::build_client(cfg)?, args, format, global).await,
        Command::Snapshot => data::snapshot(&config::build_client(cfg)?, format, global).await,
        Command::HealthBatch(args) => {
            data::health_batch(&config::build_client(cfg)?, args, format, global).await
        }
        Command::Send(args) => send::handle(&config::build_client(cfg)?, args, format, global).await,
        Command::Watch(args) => watch::handle(&config::build_channel(cfg)?, args, format, global).await,
        Command::Endpoints => endpoints::handle(cfg, format, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
