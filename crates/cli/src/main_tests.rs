// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn parses_workflow_start() {
    let cli = Cli::parse_from([
        "dc", "workflow", "start", "Add hello endpoint", "--repo", "/tmp/demo", "--live",
    ]);
    match cli.command {
        Command::Workflow(args) => match args.command {
            commands::workflow::WorkflowCommand::Start { task, repo, live, mode, definition } => {
                assert_eq!(task, "Add hello endpoint");
                assert_eq!(repo, PathBuf::from("/tmp/demo"));
                assert!(live);
                assert_eq!(mode, "in-place");
                assert_eq!(definition, "dev-cycle");
            }
            _ => panic!("wrong subcommand"),
        },
        _ => panic!("wrong command"),
    }
}

#[test]
fn parses_memory_facts_trace() {
    let cli = Cli::parse_from(["dc", "memory", "facts", "trace", "kubernetes", "--role", "guest"]);
    match cli.command {
        Command::Memory(args) => {
            let commands::memory::MemoryCommand::Facts(facts) = args.command;
            match facts.command {
                commands::memory::FactsCommand::Trace { query, role } => {
                    assert_eq!(query, "kubernetes");
                    assert_eq!(role.as_deref(), Some("guest"));
                }
                _ => panic!("wrong facts subcommand"),
            }
        }
        _ => panic!("wrong command"),
    }
}

#[test]
fn cleanup_flags_parse() {
    let cli = Cli::parse_from([
        "dc", "workflow", "cleanup", "--dry-run", "--logs-only", "--older-than", "7", "--max", "3",
    ]);
    match cli.command {
        Command::Workflow(args) => match args.command {
            commands::workflow::WorkflowCommand::Cleanup {
                dry_run,
                logs_only,
                artifacts_only,
                older_than,
                max,
                ..
            } => {
                assert!(dry_run);
                assert!(logs_only);
                assert!(!artifacts_only);
                assert_eq!(older_than, Some(7));
                assert_eq!(max, Some(3));
            }
            _ => panic!("wrong subcommand"),
        },
        _ => panic!("wrong command"),
    }
}

#[test]
fn data_dir_default_applies() {
    let cli = Cli::parse_from(["dc", "workflow", "list"]);
    assert_eq!(cli.data_dir, PathBuf::from(".devcycle"));
}
