// Entrypoint for the `moltbook` CLI.
// - Resolves configuration once and passes it down; no globals.
// - Returns `anyhow::Result` so any failure exits non-zero with a message.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use moltbook_cli::{config::AppConfig, logging, ui};

#[derive(Parser)]
#[command(name = "moltbook")]
#[command(about = "Register and run a Moltbook agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register (or reuse) an agent, wait for verification, then open the menu
    Setup,
    /// Check whether the stored agent has been claimed
    Status,
    /// Show the five hottest posts
    Feed,
    /// Check status, DMs and new posts, and record the check time
    Heartbeat {
        /// State file (default: heartbeat-state.json)
        state_file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init_default();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Some(Commands::Setup) => {
            if let Some(client) = ui::run_setup(&config)? {
                ui::interactive_menu(&client)?;
            }
        }
        Some(Commands::Status) => {
            ui::check_stored(&config)?;
        }
        Some(Commands::Feed) => {
            if let Some(client) = ui::stored_client(&config)? {
                ui::browse_feed(&client)?;
            }
        }
        Some(Commands::Heartbeat { state_file }) => {
            if let Some(client) = ui::stored_client(&config)? {
                let path = state_file.unwrap_or_else(|| config.heartbeat_state_path.clone());
                ui::run_heartbeat(&client, &path)?;
            }
        }
        None => {
            // menu straight away when already verified, otherwise setup first
            let client = match ui::resume_session(&config)? {
                Some(client) => Some(client),
                None => ui::run_setup(&config)?,
            };
            if let Some(client) = client {
                ui::interactive_menu(&client)?;
            }
        }
    }
    Ok(())
}
