//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod execute;

pub use execute::ExecuteArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a one-off build with local inputs and stream its output
    Execute(ExecuteArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Returns
/// The exit code the process should end with
pub async fn handle_command(command: Commands, config: &Config) -> Result<i32> {
    match command {
        Commands::Execute(args) => execute::handle_execute_command(args, config).await,
    }
}
