//! usersess - Session tracking CLI
//!
//! Operates on the same database and payload engine an application uses,
//! so sessions can be inspected and revoked from the shell.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use usersess_core::Settings;

mod cli;
mod commands;
mod tracker;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("usersess=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(Settings::config_path);
    let settings = Settings::load_from(&config_path)?;

    // Execute command
    match cli.command {
        Commands::Init => commands::init::execute(&settings),
        Commands::List { user, all, json } => commands::sessions::list(&user, all, json, &settings),
        Commands::Show { identifier, json } => commands::sessions::show(&identifier, json, &settings),
        Commands::Revoke { identifier } => commands::sessions::revoke(&identifier, &settings),
        Commands::Gc { max_lifetime } => commands::gc::sweep(max_lifetime, &settings),
        Commands::GcDaemon {
            interval,
            max_lifetime,
        } => commands::gc::daemon(interval, max_lifetime, &settings).await,
        Commands::Stats { json } => commands::stats::execute(json, &settings),
    }
}
