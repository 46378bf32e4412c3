// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Murmur - an on-device conversation store.
//!
//! This is the binary entry point: a small CLI over the conversation
//! orchestrator for inspecting, searching and maintaining local history.

mod commands;
mod doctor;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use murmur_config::MurmurConfig;
use murmur_conversation::{ConversationOrchestrator, NoopMirror};
use murmur_core::MurmurError;
use murmur_storage::SqliteStore;

/// Murmur - an on-device conversation store.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List conversations, most recent activity first.
    List {
        /// Show archived conversations instead of active ones.
        #[arg(long)]
        archived: bool,
        /// Only show favorites.
        #[arg(long)]
        favorites: bool,
    },
    /// Print one conversation with all of its messages.
    Show { id: String },
    /// Find conversations whose title, messages or tags contain a query.
    Search { query: String },
    /// Print aggregate statistics.
    Stats,
    /// Write every conversation to an export file.
    Export { file: PathBuf },
    /// Add conversations from an export file, skipping known ids.
    Import { file: PathBuf },
    /// Read, save or clear the draft of a conversation.
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Check storage health and index consistency.
    Doctor {
        /// Rebuild the index from stored records if it is inconsistent.
        #[arg(long)]
        repair: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DraftAction {
    Get { id: String },
    Set { id: String, text: String },
    Clear { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => murmur_config::load_and_validate_path(path),
        None => murmur_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            murmur_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);
    debug!(database = %config.storage.database_path, "config loaded");

    let Some(command) = cli.command else {
        println!("murmur: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, &config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &MurmurConfig) -> Result<(), MurmurError> {
    if let Commands::Doctor { repair } = command {
        return doctor::run_doctor(config, repair).await;
    }

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    let orchestrator =
        ConversationOrchestrator::open(store, Arc::new(NoopMirror), config).await?;

    let result = dispatch(command, &orchestrator).await;
    orchestrator.close().await?;
    result
}

async fn dispatch(
    command: Commands,
    orchestrator: &ConversationOrchestrator,
) -> Result<(), MurmurError> {
    let output = match command {
        Commands::List {
            archived,
            favorites,
        } => commands::list(orchestrator, archived, favorites).await,
        Commands::Show { id } => commands::show(orchestrator, &id).await?,
        Commands::Search { query } => commands::search(orchestrator, &query).await?,
        Commands::Stats => commands::stats(orchestrator).await?,
        Commands::Export { file } => commands::export(orchestrator, &file).await?,
        Commands::Import { file } => commands::import(orchestrator, &file).await?,
        Commands::Draft { action } => match action {
            DraftAction::Get { id } => orchestrator.get_draft(&id).await?,
            DraftAction::Set { id, text } => {
                let draft = orchestrator.save_draft(&id, &text).await?;
                format!("draft saved for {id} at {}", draft.saved_at)
            }
            DraftAction::Clear { id } => {
                if orchestrator.clear_draft(&id).await? {
                    format!("draft cleared for {id}")
                } else {
                    format!("no draft for {id}")
                }
            }
        },
        Commands::Doctor { .. } => {
            return Err(MurmurError::Internal(
                "doctor runs without an open orchestrator".into(),
            ));
        }
    };
    println!("{output}");
    Ok(())
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("murmur={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_draft_set() {
        let cli = Cli::try_parse_from(["murmur", "draft", "set", "c1", "hello"]).unwrap();
        match cli.command {
            Some(Commands::Draft {
                action: DraftAction::Set { id, text },
            }) => {
                assert_eq!(id, "c1");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_accepts_global_config_flag() {
        let cli =
            Cli::try_parse_from(["murmur", "list", "--favorites", "--config", "/tmp/m.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::List {
                archived: false,
                favorites: true
            })
        ));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = murmur_config::load_and_validate_str("").unwrap();
        assert_eq!(config.cache.capacity, 50);
    }
}
