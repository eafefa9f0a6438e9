//! tap-duedil - Main entry point

use anyhow::Context;
use clap::Parser;
use std::process;
use tap_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tap_duedil::{Cli, Commands};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Pick up DUEDIL_* and LOG_* from a local .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Stderr)
        .log_file_prefix("tap-duedil")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // Keep the guard alive so buffered file logs are flushed on exit
    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(severity = "critical", "{:#}", e);
        drop(guard);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let schemas_dir = cli.schemas_dir.as_ref();

    match &cli.command {
        Commands::Discover => {
            tap_duedil::commands::discover::run(schemas_dir, &mut std::io::stdout().lock())
                .context("discover failed")
        },

        Commands::Query {
            config,
            catalog,
            companies,
            query,
        } => tap_duedil::commands::query::run(config, catalog, companies, query, schemas_dir)
            .await
            .context("query failed"),

        Commands::Sync {
            config,
            catalog,
            companies,
            state,
            streams,
        } => {
            tap_duedil::commands::sync::run(
                config,
                catalog,
                companies,
                state.as_ref(),
                streams,
                schemas_dir,
            )
            .await
            .context("sync failed")
        },
    }
}
