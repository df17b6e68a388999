use clap::Parser;
use durable_tasks::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_parse_list_with_status() {
    let cli = Cli::try_parse_from(["durable-tasks", "list", "--status", "paused"]).unwrap();
    match cli.command {
        Commands::List { status } => assert_eq!(status.as_deref(), Some("paused")),
        _ => panic!("Wrong command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_parse_events_with_limit_and_global_flags() {
    let cli = Cli::try_parse_from([
        "durable-tasks",
        "events",
        "task-1",
        "--limit",
        "5",
        "--json",
        "--config",
        "custom.yaml",
    ])
    .unwrap();

    match cli.command {
        Commands::Events { task_id, limit } => {
            assert_eq!(task_id, "task-1");
            assert_eq!(limit, Some(5));
        }
        _ => panic!("Wrong command"),
    }
    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
}

#[test]
fn test_parse_purge_force() {
    let cli = Cli::try_parse_from(["durable-tasks", "purge", "task-2", "--force"]).unwrap();
    match cli.command {
        Commands::Purge { task_id, force } => {
            assert_eq!(task_id, "task-2");
            assert!(force);
        }
        _ => panic!("Wrong command"),
    }
}

#[test]
fn test_init_config_default_path() {
    let cli = Cli::try_parse_from(["durable-tasks", "init-config"]).unwrap();
    match cli.command {
        Commands::InitConfig { path, force } => {
            assert_eq!(path, PathBuf::from(".durable-tasks/config.yaml"));
            assert!(!force);
        }
        _ => panic!("Wrong command"),
    }
}

#[test]
fn test_show_requires_task_id() {
    assert!(Cli::try_parse_from(["durable-tasks", "show"]).is_err());
}
