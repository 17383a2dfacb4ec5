//! Skiff CLI
//!
//! Submits a one-off build to a remote build server, uploads local inputs into
//! it and streams the build's output back.

mod archive;
mod cancel;
mod commands;
mod config;
mod inputs;
mod render;
mod upload;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for any local failure: bad config, transport or upload errors
const FATAL_EXIT_CODE: i32 = 1;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Run one-off builds against a remote build server", long_about = None)]
struct Cli {
    /// Build server URL
    #[arg(
        short,
        long,
        env = "SKIFF_TARGET",
        default_value = "http://127.0.0.1:8080"
    )]
    target: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries build output only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skiff=warn,skiff_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        target_url: cli.target,
    };

    let code = match handle_command(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            FATAL_EXIT_CODE
        }
    };

    // Exit without waiting on uploads that may still be in flight
    std::process::exit(code);
}
