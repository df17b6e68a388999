//! Operator CLI for inspecting and maintaining a task store.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::config::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Parser, Debug)]
#[command(name = "durable-tasks")]
#[command(about = "Inspect and maintain durable agent tasks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .durable-tasks/config.yaml plus env overrides)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tasks
    List {
        /// Only show tasks in this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a task's metadata and checkpoint
    Show {
        task_id: String,
    },

    /// Print a task's journal
    Events {
        task_id: String,

        /// Only show the last N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Pause tasks left running by a crashed process
    Recover,

    /// Delete a finished task from the store
    Purge {
        task_id: String,

        /// Delete even if the task is not in a terminal state
        #[arg(short, long)]
        force: bool,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = ".durable-tasks/config.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Load configuration from `--config` or the standard hierarchy.
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print an error in the selected output mode and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "chain": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
