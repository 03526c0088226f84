//! bridge - Cloud/Local model launcher for the coding agent
//!
//! Probes the internet and the local inference server, starts the server and
//! pulls the model when Local is chosen, then hands the terminal to the agent.

use anyhow::Result;
use bridge_core::{JsonFileStore, Orchestrator};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;
mod ui;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout belongs to the menu and the agent.
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("bridge={}", level).parse()?)
                .add_directive(format!("bridge_core={}", level).parse()?),
        )
        .init();

    // Load configuration
    let config = config::Config::load()?;
    tracing::debug!("Launcher settings: {:?}", config);
    let store = JsonFileStore::open_default();
    let mut orchestrator = Orchestrator::new(config.orchestrator_settings(), Box::new(store));

    // Execute command
    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => commands::menu::execute(&mut orchestrator).await,
        Commands::Launch { mode } => commands::launch::execute(&mut orchestrator, mode).await,
        Commands::Settings => commands::settings::execute(orchestrator.store_mut()),
        Commands::Doctor => commands::doctor::execute(&orchestrator).await,
        Commands::Version => {
            println!("bridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
