use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;
mod context;
mod output;

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output
    let default_filter = if cli.verbose {
        "warn,agent_race_sdk=debug,agent_race_core=debug,agent_race_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = match Context::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(api_url = %ctx.api_url(), profile = ?ctx.profile_name, "Starting");

    let result = match cli.command {
        Commands::Race(cmd) => commands::race::execute(&ctx, cmd).await,
        Commands::Run(cmd) => commands::run::execute(&ctx, cmd).await,
        Commands::Config(cmd) => commands::config::execute(&ctx, cmd).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
