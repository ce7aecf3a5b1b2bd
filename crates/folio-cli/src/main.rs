//! CLI entry point for Folio.
//!
//! This binary provides the `folio` command: account management, profile
//! edits, and reading, publishing and moderating posts and comments.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::App;
use config::FolioConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = FolioConfig::load(&cli.config)?;
    init_tracing(&config.log.level);
    debug!(path = %cli.config.display(), "configuration loaded");

    let app = App::open(&config).await?;

    match cli.command {
        Commands::Signup {
            email,
            name,
            password,
        } => commands::signup(&app, &email, &name, &password),
        Commands::Login { email, password } => commands::login(&app, &email, &password).await,
        Commands::Logout => commands::logout(&app),
        Commands::Whoami => {
            commands::whoami(&app);
            Ok(())
        }
        Commands::Profile { name, picture } => {
            commands::profile(&app, &name, picture.as_deref()).await
        }
        Commands::Passwd { old, new } => commands::passwd(&app, &old, &new),
        Commands::Posts { action } => commands::posts(&app, action).await,
        Commands::Comments { action } => commands::comments(&app, action),
        Commands::Blobs { action } => commands::blobs(&app, action).await,
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
