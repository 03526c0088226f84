//! CLI argument definitions using clap derive macros.

use bridge_core::BackendMode;
use clap::{Parser, Subcommand};

/// Bridge - pick a cloud or local model and hand off to the coding agent
///
/// Run without a subcommand to open the interactive menu.
#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging (stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive mode menu (default)
    Menu,

    /// Launch the agent in one mode without the menu
    Launch {
        /// Backend mode: cloud or local
        mode: BackendMode,
    },

    /// Edit API key and model ids
    Settings,

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}
