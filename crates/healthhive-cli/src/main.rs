//! HealthHive CLI - record community health visits from the terminal
//!
//! Visits are posted to the HealthHive API when it is reachable and kept in a
//! local offline queue otherwise; `healthhive sync` uploads the queue.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::queue::run_queue;
use crate::commands::record::run_record;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "healthhive=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = Context::load(cli.db_path, cli.offline)?;
    match cli.command {
        Commands::Record(args) => run_record(args, &context).await,
        Commands::Queue { command } => run_queue(command, &context).await,
        Commands::Status { json } => run_status(json, &context).await,
        Commands::Sync => run_sync(&context).await,
        Commands::Config { command } => run_config(command, &context),
        Commands::Completions { .. } => Ok(()),
    }
}
