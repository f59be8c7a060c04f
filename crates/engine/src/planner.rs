// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner engine: workspace analysis and plan/task-list production.

use crate::engine::{Engine, EngineContext, EngineResult, Validation};
use crate::markers::{extract_json_artifact, extract_section};
use crate::runner::{session_id, RunnerRequest};
use crate::tasks::{PlanTask, TaskList, TaskStatus};
use async_trait::async_trait;
use dc_core::EngineKind;
use serde::Serialize;
use std::path::Path;

/// What the planner learned about the workspace.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceAnalysis {
    pub package_name: Option<String>,
    pub frameworks: Vec<String>,
    pub top_level: Vec<String>,
}

/// Best-effort: an unreadable manifest just yields an empty analysis.
pub fn analyze_workspace(workspace: &Path) -> WorkspaceAnalysis {
    let mut analysis = WorkspaceAnalysis::default();

    if let Ok(raw) = std::fs::read_to_string(workspace.join("package.json")) {
        if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&raw) {
            analysis.package_name =
                manifest.get("name").and_then(|n| n.as_str()).map(str::to_string);
            let mut dependency_names: Vec<String> = Vec::new();
            for key in ["dependencies", "devDependencies"] {
                if let Some(deps) = manifest.get(key).and_then(|d| d.as_object()) {
                    dependency_names.extend(deps.keys().cloned());
                }
            }
            for framework in ["react", "next", "express", "fastify", "vue", "svelte"] {
                if dependency_names.iter().any(|d| d == framework) {
                    analysis.frameworks.push(framework.to_string());
                }
            }
        }
    }
    if workspace.join("Cargo.toml").exists() {
        analysis.frameworks.push("cargo".to_string());
    }

    if let Ok(entries) = std::fs::read_dir(workspace) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    analysis.top_level.push(name.to_string());
                }
            }
        }
        analysis.top_level.sort();
    }
    analysis
}

fn stub_tasks(task: &str) -> TaskList {
    let mk = |n: u32, title: &str, description: String, depends_on: Vec<String>| PlanTask {
        id: format!("task-{n}"),
        title: title.to_string(),
        description,
        status: TaskStatus::Pending,
        priority: n,
        depends_on,
        files: vec![],
        summary: None,
    };
    TaskList {
        version: "1".to_string(),
        tasks: vec![
            mk(1, "Analyze requirements", format!("Break down: {task}"), vec![]),
            mk(2, "Implement changes", "Apply the planned code changes".to_string(), vec!["task-1".to_string()]),
            mk(3, "Add tests", "Cover the new behavior with tests".to_string(), vec!["task-2".to_string()]),
            mk(4, "Verify and document", "Run checks and update docs".to_string(), vec!["task-3".to_string()]),
        ],
    }
}

fn render_plan(task: &str, analysis: &WorkspaceAnalysis, tasks: &TaskList) -> String {
    let mut out = format!("# Plan\n\n## Task\n{task}\n\n## Workspace\n");
    match &analysis.package_name {
        Some(name) => out.push_str(&format!("- package: {name}\n")),
        None => out.push_str("- package: (none detected)\n"),
    }
    if !analysis.frameworks.is_empty() {
        out.push_str(&format!("- frameworks: {}\n", analysis.frameworks.join(", ")));
    }
    out.push_str("\n## Steps\n");
    for plan_task in &tasks.tasks {
        out.push_str(&format!(
            "{}. {}: {}\n",
            plan_task.priority, plan_task.title, plan_task.description
        ));
    }
    out
}

fn build_prompt(ctx: &EngineContext, analysis: &WorkspaceAnalysis) -> String {
    format!(
        concat!(
            "You are the planning agent for a dev-cycle workflow.\n\n",
            "Task:\n{task}\n\n",
            "Workspace: package={package} frameworks={frameworks}\n\n",
            "Respond with exactly two marker-delimited sections:\n",
            "--- BEGIN plan.md ---\n<markdown plan>\n--- END plan.md ---\n",
            "--- BEGIN tasks.json ---\n",
            "{{\"version\": \"1\", \"tasks\": [{{\"id\", \"title\", \"description\", ",
            "\"status\", \"priority\", \"dependsOn\"}}]}}\n",
            "--- END tasks.json ---\n"
        ),
        task = ctx.task,
        package = analysis.package_name.as_deref().unwrap_or("unknown"),
        frameworks = analysis.frameworks.join(","),
    )
}

pub struct PlannerEngine;

#[async_trait]
impl Engine for PlannerEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Planner
    }

    fn validate(&self, ctx: &EngineContext) -> Validation {
        let mut errors = Vec::new();
        if ctx.task.trim().is_empty() {
            errors.push("task is empty".to_string());
        }
        if !ctx.workspace.is_dir() {
            errors.push(format!("workspace does not exist: {}", ctx.workspace.display()));
        }
        if errors.is_empty() {
            Validation::ok()
        } else {
            Validation::fail(errors)
        }
    }

    async fn execute(&self, ctx: &EngineContext) -> EngineResult {
        let start = std::time::Instant::now();
        ctx.progress.status("analyzing workspace");
        let analysis = analyze_workspace(&ctx.workspace);

        let (plan, tasks) = if ctx.live {
            let request = RunnerRequest {
                session_id: session_id(&ctx.run_id, &ctx.phase_id, ctx.iteration),
                prompt: build_prompt(ctx, &analysis),
                workspace_path: ctx.workspace.clone(),
                timeout_ms: ctx.timeout_ms,
                provider: ctx.agent.provider.clone(),
                model: ctx.agent.model.clone(),
            };
            let outcome = match ctx.runner.run(request, &ctx.cancel, &ctx.progress).await {
                Ok(outcome) => outcome,
                Err(e) => return EngineResult::failure(e.to_string(), elapsed_ms(start)),
            };
            if let Err(e) = ctx.write_log("planner.log", &outcome.output) {
                tracing::warn!(error = %e, "failed to write planner log");
            }

            // Strict parse: a plan without a valid task list is a failure,
            // never a silent fallback.
            let Some(tasks_value) = extract_json_artifact(&outcome.output, "tasks.json") else {
                return EngineResult::failure(
                    "planner output missing tasks.json section",
                    elapsed_ms(start),
                );
            };
            let tasks = match TaskList::validate(&tasks_value) {
                Ok(tasks) => tasks,
                Err(e) => return EngineResult::failure(e, elapsed_ms(start)),
            };
            let plan = extract_section(&outcome.output, "plan.md")
                .map(str::to_string)
                .unwrap_or_else(|| outcome.output.clone());
            (plan, tasks)
        } else {
            let tasks = stub_tasks(&ctx.task);
            (render_plan(&ctx.task, &analysis, &tasks), tasks)
        };

        let tasks_json = match serde_json::to_vec_pretty(&tasks) {
            Ok(json) => json,
            Err(e) => return EngineResult::failure(e.to_string(), elapsed_ms(start)),
        };
        if let Err(e) = ctx
            .write_artifact("plan.md", plan.as_bytes())
            .and_then(|()| ctx.write_artifact("tasks.json", &tasks_json))
        {
            return EngineResult::failure(e.to_string(), elapsed_ms(start));
        }

        EngineResult {
            success: true,
            artifacts: vec!["plan.md".to_string(), "tasks.json".to_string()],
            output: None,
            error: None,
            metrics: dc_core::PhaseMetrics { duration_ms: elapsed_ms(start) },
        }
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
