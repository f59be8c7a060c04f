// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dc memory facts` command handlers.

use crate::context::AppContext;
use anyhow::Result;
use clap::{Args, Subcommand};
use dc_core::Clock;
use dc_facts::{
    export_jsonl, get_relevant_context_with_trace, import_jsonl, rebuild_fts, run_consolidation,
    run_integrity_check, vacuum, ExportOptions, FactsScheduler, ImportMode, ListOptions,
    MemoryType, RetrievalOptions, Role,
};
use std::path::PathBuf;

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Facts memory engine
    Facts(FactsArgs),
}

#[derive(Args)]
pub struct FactsArgs {
    #[command(subcommand)]
    pub command: FactsCommand,
}

#[derive(Subcommand)]
pub enum FactsCommand {
    /// Show store status and scheduler state
    Status,
    /// Run consolidation and pruning now
    Cleanup,
    /// Show memory counts per type
    Stats,
    /// Integrity check, optional FTS rebuild and vacuum
    Repair {
        /// Rebuild the full-text index
        #[arg(long)]
        fts: bool,
        /// Reclaim free pages
        #[arg(long)]
        vacuum: bool,
    },
    /// Export the store as JSONL
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Apply the default redaction patterns
        #[arg(long)]
        redact: bool,
        /// Exclude a memory type (repeatable)
        #[arg(long = "exclude-type")]
        exclude_types: Vec<String>,
        /// Export under a role's visibility
        #[arg(long)]
        role: Option<String>,
    },
    /// Import a JSONL export
    Import {
        file: PathBuf,
        /// merge or replace
        #[arg(long, default_value = "merge")]
        mode: String,
    },
    /// Show the highest-scored memories
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Explain a retrieval
    Trace {
        query: String,
        /// Apply a role's type gating
        #[arg(long)]
        role: Option<String>,
    },
    /// Run a health check and print the summary
    Health,
    /// Show recent health alerts
    Alerts {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn parse_type(s: &str) -> Result<MemoryType> {
    MemoryType::parse(s).ok_or_else(|| anyhow::anyhow!("invalid memory type: {s}"))
}

fn parse_mode(s: &str) -> Result<ImportMode> {
    match s {
        "merge" => Ok(ImportMode::Merge),
        "replace" => Ok(ImportMode::Replace),
        other => anyhow::bail!("invalid import mode: {other}"),
    }
}

pub async fn handle(args: MemoryArgs, app: &AppContext) -> Result<()> {
    let MemoryCommand::Facts(facts) = args.command;
    let store = app.facts_store()?;
    let now_ms = app.clock.epoch_ms();

    match facts.command {
        FactsCommand::Status => {
            println!("db:        {}", app.facts_db_path().display());
            println!("memories:  {}", store.count()?);
            println!("fts:       {}", if store.fts_available() { "available" } else { "unavailable" });
            println!("daily:     {}", store.count_daily_summaries()?);
            println!("weekly:    {}", store.count_weekly_summaries()?);

            let scheduler = FactsScheduler::new(
                app.config.facts_memory.scheduler.clone(),
                app.config.facts_memory.alerts.clone(),
                dc_facts::scheduler::SchedulerContext {
                    store: std::sync::Arc::new(store),
                    retention: app.config.facts_memory.retention.clone(),
                    markdown_root: app.markdown_root(),
                    summarizer: None,
                    telemetry: app.telemetry(),
                    health: app.health_monitor(),
                },
            );
            for job in scheduler.status() {
                let next = job
                    .next_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("job {:<7} enabled={} next={}", job.name, job.enabled, next);
            }
            Ok(())
        }

        FactsCommand::Cleanup => {
            let telemetry = app.telemetry();
            let report = run_consolidation(
                &store,
                &app.config.facts_memory.retention,
                app.clock.today(),
                None,
                app.markdown_root().as_deref(),
                &telemetry,
                now_ms,
            )?;
            match report.daily {
                Some(date) => println!("daily summary written for {date}"),
                None => println!("no memories today, no daily summary"),
            }
            if let Some(week) = report.weekly {
                println!("weekly summary written for {week}");
            }
            println!(
                "pruned: {} expired, {} low-importance, {} bytes freed",
                report.prune.expired, report.prune.deleted, report.prune.bytes_freed
            );
            Ok(())
        }

        FactsCommand::Stats => {
            println!("total: {}", store.count()?);
            for memory_type in MemoryType::ALL {
                let count = store
                    .list(&ListOptions { memory_type: Some(memory_type), limit: None })?
                    .len();
                println!("{:<11} {}", memory_type.to_string(), count);
            }
            Ok(())
        }

        FactsCommand::Repair { fts, vacuum: do_vacuum } => {
            let report = run_integrity_check(&store)?;
            println!("integrity: {}", if report.ok { "ok" } else { "FAILED" });
            for message in &report.messages {
                if message != "ok" {
                    println!("  {message}");
                }
            }
            if fts {
                match rebuild_fts(&store) {
                    Ok(rows) => println!("fts rebuilt: {rows} rows reindexed"),
                    Err(e) => println!("fts rebuild failed: {e}"),
                }
            }
            if do_vacuum {
                vacuum(&store)?;
                println!("vacuum complete");
            }
            if !report.ok {
                anyhow::bail!("integrity check failed");
            }
            Ok(())
        }

        FactsCommand::Export { out, redact, exclude_types, role } => {
            let opts = ExportOptions {
                redact,
                exclude_types: exclude_types
                    .iter()
                    .map(|s| parse_type(s))
                    .collect::<Result<Vec<_>>>()?,
                role: role.as_deref().map(Role::named),
            };
            let report = match out {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)?;
                    let report = export_jsonl(&store, &mut file, &opts)?;
                    println!("exported to {}", path.display());
                    report
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    export_jsonl(&store, &mut stdout, &opts)?
                }
            };
            eprintln!(
                "{} memories, {} blocks, {} summaries{}",
                report.memories,
                report.blocks,
                report.summaries,
                if report.redacted { " (redacted)" } else { "" }
            );
            Ok(())
        }

        FactsCommand::Import { file, mode } => {
            let mode = parse_mode(&mode)?;
            let mut reader = std::io::BufReader::new(std::fs::File::open(&file)?);
            let report = import_jsonl(&store, &mut reader, mode, now_ms)?;
            println!(
                "imported: {} inserted, {} updated, {} skipped, {} blocks, {} summaries",
                report.inserted, report.updated, report.skipped, report.blocks, report.summaries
            );
            Ok(())
        }

        FactsCommand::Top { limit } => {
            let entries = store.list(&ListOptions { memory_type: None, limit: Some(limit) })?;
            for entry in entries {
                let score = dc_facts::retrieval::score_memory(&entry, now_ms);
                println!(
                    "{:.3}  [{}] {}  ({}x accessed)",
                    score, entry.memory_type, entry.content, entry.access_count
                );
            }
            Ok(())
        }

        FactsCommand::Trace { query, role } => {
            let opts = RetrievalOptions {
                role: role.as_deref().map(Role::named),
                ..Default::default()
            };
            let (results, trace) =
                get_relevant_context_with_trace(&store, &query, now_ms, &opts)?;
            println!(
                "query: {:?} considered={} returned={} excluded={}",
                trace.query, trace.considered, trace.returned, trace.excluded
            );
            if !trace.excluded_types.is_empty() {
                let types: Vec<String> =
                    trace.excluded_types.iter().map(|t| t.to_string()).collect();
                println!("excluded types: {}", types.join(", "));
            }
            for (result, reason) in results.iter().zip(&trace.reasons) {
                println!(
                    "{:.3}  via {:<10} [{}] {}",
                    reason.score, reason.source.to_string(), result.entry.memory_type, result.entry.content
                );
            }
            Ok(())
        }

        FactsCommand::Health => {
            let monitor = app.health_monitor();
            let telemetry = app.telemetry();
            monitor.run_health_check(&store, &telemetry, now_ms)?;
            let summary = monitor.get_health_summary(now_ms);
            println!("status: {}", summary.status);
            if let Some(snapshot) = summary.snapshot {
                println!("db size:    {:.2} MB", snapshot.db_size_mb);
                println!("memories:   {}", snapshot.total_memories);
                println!("fts:        {}", snapshot.fts_available);
                println!("errors/24h: {}", snapshot.extraction_errors);
            }
            for alert in summary.active_alerts {
                println!("[{}] {}: {}", alert.severity, alert.alert_type, alert.message);
            }
            Ok(())
        }

        FactsCommand::Alerts { limit } => {
            let monitor = app.health_monitor();
            let telemetry = app.telemetry();
            monitor.run_health_check(&store, &telemetry, now_ms)?;
            let alerts = monitor.recent_alerts(limit);
            if alerts.is_empty() {
                println!("no alerts");
            }
            for alert in alerts {
                println!("{}  [{}] {}: {}", alert.timestamp, alert.severity, alert.alert_type, alert.message);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
