//! Widgetry CI entry point
//!
//! Runs one stage of the registry change-control pipeline: `authorize`,
//! `validate` or `publish`. Failures are reported as a single `::error::`
//! line and a non-zero exit status.

use clap::Parser;
use tracing::info;

mod commands;
mod config;
mod error;
mod git;
mod github;
mod oras;
mod process;
mod tools;

use config::{Cli, Commands};
use error::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "widgetry=info,widgetry_registry=info,widgetry_cli=info".to_string()
        }))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("::error::{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("widgetry {}", widgetry::version());
    match cli.command {
        Commands::Authorize(args) => commands::authorize(args.try_into()?).await,
        Commands::Validate(args) => commands::validate(args.try_into()?).await.map(|_| ()),
        Commands::Publish(args) => commands::publish(args.try_into()?).await,
    }
}
