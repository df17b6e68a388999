//! durable-tasks CLI entry point.

use anyhow::Result;
use clap::Parser;

use durable_tasks::cli::commands::{config, task};
use durable_tasks::cli::{handle_error, load_config, Cli, Commands};
use durable_tasks::infrastructure::logging::{LogConfig, LoggerImpl};
use durable_tasks::services::DurableTaskService;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig { path, force } = &cli.command {
        return config::init_config(path, *force, cli.json);
    }

    let config = load_config(cli.config.as_ref())?;
    let mut log_config = LogConfig::from(&config.logging);
    // Keep stdout clean for command output
    if cli.json {
        log_config.enable_stdout = false;
    }
    let _logger = LoggerImpl::init(&log_config)?;

    let service = DurableTaskService::from_config(&config)?;

    match cli.command {
        Commands::List { status } => task::list(&service, status.as_deref(), cli.json).await,
        Commands::Show { task_id } => task::show(&service, &task_id, cli.json).await,
        Commands::Events { task_id, limit } => {
            task::events(&service, &task_id, limit, cli.json).await
        }
        Commands::Recover => task::recover(&service, cli.json).await,
        Commands::Purge { task_id, force } => {
            task::purge(&service, &task_id, force, cli.json).await
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}
