// ABOUTME: Entry point for the devnet CLI application.
// ABOUTME: Parses arguments, installs logging and Ctrl-C handling, and dispatches commands.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use devnet::error::Result;
use devnet::output::{Output, OutputMode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.global.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.global.json {
        OutputMode::Json
    } else if cli.global.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    if let Err(e) = run(cli, output_mode, cancel).await {
        Output::new(output_mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output_mode: OutputMode, cancel: CancellationToken) -> Result<()> {
    let test_filters = match &cli.command {
        Commands::Test { filters } => filters.clone(),
        _ => Vec::new(),
    };
    let config = cli
        .global
        .config_factory(cli.command.default_mode(), test_filters)
        .build()?;
    tracing::debug!(
        env = %config.env_name,
        mode = %config.mode_name,
        home = %config.home_dir.display(),
        "Configuration loaded"
    );

    let mut ctx = Context {
        config: Arc::new(config),
        stack: cli.global.stack,
        docker: cli.global.docker,
        output: Output::new(output_mode),
        cancel,
    };

    match cli.command {
        Commands::Start => commands::start(&mut ctx).await,
        Commands::Stop => commands::stop(&mut ctx).await,
        Commands::Remove => commands::remove(&mut ctx).await,
        Commands::Spec => commands::spec(&ctx),
        Commands::Test { .. } => commands::test(&mut ctx).await,
    }
}
