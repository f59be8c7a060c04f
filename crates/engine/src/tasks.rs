// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task list schema produced by planning and consumed by execution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

dc_core::simple_display! {
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Lower runs earlier among independent tasks.
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub version: String,
    pub tasks: Vec<PlanTask>,
}

impl TaskList {
    /// Validate a parsed `tasks.json` document. Strict: `version` present,
    /// `tasks` a non-empty array with the expected fields, and every
    /// `dependsOn` entry naming a real task id.
    pub fn validate(value: &serde_json::Value) -> Result<TaskList, String> {
        if value.get("version").and_then(|v| v.as_str()).is_none() {
            return Err("tasks.json: missing version".to_string());
        }
        let Some(tasks) = value.get("tasks").and_then(|v| v.as_array()) else {
            return Err("tasks.json: tasks is not an array".to_string());
        };
        if tasks.is_empty() {
            return Err("tasks.json: tasks is empty".to_string());
        }
        for (index, task) in tasks.iter().enumerate() {
            for field in ["id", "title"] {
                if task.get(field).and_then(|v| v.as_str()).is_none() {
                    return Err(format!("tasks.json: task {index} missing {field}"));
                }
            }
        }
        let list: TaskList =
            serde_json::from_value(value.clone()).map_err(|e| format!("tasks.json: {e}"))?;
        for task in &list.tasks {
            for dep in &task.depends_on {
                if list.task(dep).is_none() {
                    return Err(format!(
                        "tasks.json: task {} depends on unknown task {dep}",
                        task.id
                    ));
                }
            }
        }
        Ok(list)
    }

    pub fn task(&self, id: &str) -> Option<&PlanTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut PlanTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Execution order: topological by `depends_on`, priority as the
    /// tie-break (then id for determinism). Tasks on a dependency cycle
    /// or depending on an unknown id are never ready and are left out of
    /// the returned order.
    pub fn execution_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.tasks.len());
        let mut placed: Vec<&str> = Vec::new();

        let mut remaining: Vec<&PlanTask> = self.tasks.iter().collect();
        while !remaining.is_empty() {
            let mut ready: Vec<&PlanTask> = remaining
                .iter()
                .copied()
                .filter(|t| t.depends_on.iter().all(|dep| placed.contains(&dep.as_str())))
                .collect();
            if ready.is_empty() {
                tracing::warn!(
                    stuck = remaining.len(),
                    "unresolvable dependencies in task list, leaving remaining tasks unordered"
                );
                break;
            }
            ready.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
            let next = ready[0];
            placed.push(&next.id);
            order.push(next.id.clone());
            remaining.retain(|t| t.id != next.id);
        }
        order
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
