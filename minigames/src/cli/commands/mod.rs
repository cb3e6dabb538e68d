//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod host;
pub mod questions;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, HostSubcommand};
use crate::error::MinigamesError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is fired by the signal handler; only `host run` observes it.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), MinigamesError> {
    match cli.command {
        Commands::Host(cmd) => match cmd.subcommand {
            HostSubcommand::Run(args) => host::run(&args, cancel).await,
            HostSubcommand::Validate(args) => host::validate(&args),
        },
        Commands::Questions(args) => questions::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
