// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The devcycle (`dc`) command line.

mod commands;
mod context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dc", version, about = "Local agent-centric automation platform")]
struct Cli {
    /// Data directory (runs, facts database, logs).
    #[arg(long, global = true, default_value = ".devcycle")]
    data_dir: PathBuf,

    /// Optional TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage workflow runs
    Workflow(commands::workflow::WorkflowArgs),
    /// Memory subsystems
    Memory(commands::memory::MemoryArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = match context::AppContext::load(&cli.data_dir, cli.config.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Command::Workflow(args) => commands::workflow::handle(args, &app).await,
        Command::Memory(args) => commands::memory::handle(args, &app).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// 2 for invalid input, 1 for operational failures.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    use dc_engine::OrchestratorError;
    if let Some(orchestrator) = error.downcast_ref::<OrchestratorError>() {
        return match orchestrator {
            OrchestratorError::Validation(_)
            | OrchestratorError::UnknownDefinition(_)
            | OrchestratorError::RunNotFound(_) => 2,
            _ => 1,
        };
    }
    1
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
