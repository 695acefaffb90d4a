//! Link hub builder: Telegram bot and registry CLI.
//!
//! Binary name: `linkhub`
//!
//! Parses CLI arguments, loads configuration and the project registry, then
//! dispatches to a registry command or runs the bot.

mod cli;
mod state;
mod telegram;

use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,linkhub=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve => {
            let data_dir = state.data_dir.clone();
            let client = Arc::new(state.telegram_client()?);
            let engine = Arc::new(state.into_engine(Arc::clone(&client)).await?);

            if !cli.quiet {
                println!();
                println!(
                    "  {} Bot is running. Press Ctrl+C to stop.",
                    console::style("▶").green().bold()
                );
                println!(
                    "  {} {}",
                    console::style("Data:").dim(),
                    data_dir.display()
                );
                println!();
            }

            telegram::serve(engine, client, shutdown_signal()).await;

            if !cli.quiet {
                println!("\n  Bot stopped.");
            }
        }

        Commands::List => {
            cli::project::list_projects(&state, cli.json).await?;
        }

        Commands::Show { key } => {
            cli::project::show_project(&state, &key, cli.json).await?;
        }

        Commands::Redeploy => {
            cli::project::redeploy_all(&state, cli.json).await?;
        }

        Commands::Import { path } => {
            cli::project::import(&state, &path, cli.json).await?;
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
