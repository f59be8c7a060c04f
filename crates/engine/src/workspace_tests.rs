// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn validate_missing_target_fails() {
    let spec = WorkspaceSpec::in_place("/nonexistent/repo");
    assert!(matches!(validate(&spec), Err(WorkspaceError::MissingTarget(_))));
}

#[test]
fn validate_worktree_requires_git() {
    let dir = tempdir().unwrap();
    let spec = WorkspaceSpec {
        mode: WorkspaceMode::Worktree,
        target_repo: dir.path().to_path_buf(),
        branch: None,
        base_branch: None,
        require_git: false,
    };
    assert!(matches!(validate(&spec), Err(WorkspaceError::NotGit(_))));
}

#[tokio::test]
async fn in_place_returns_target() {
    let dir = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let spec = WorkspaceSpec::in_place(dir.path());
    let paths = RunPaths::new(runs.path(), "run-x");

    let workspace = prepare(&spec, &paths).await.unwrap();
    assert_eq!(workspace, dir.path());
}

#[tokio::test]
async fn copy_mode_snapshots_tree_without_git_dir() {
    let source = tempdir().unwrap();
    std::fs::write(source.path().join("file.txt"), "data").unwrap();
    std::fs::create_dir(source.path().join("src")).unwrap();
    std::fs::write(source.path().join("src/main.rs"), "fn main() {}").unwrap();
    std::fs::create_dir(source.path().join(".git")).unwrap();
    std::fs::write(source.path().join(".git/HEAD"), "ref").unwrap();

    let runs = tempdir().unwrap();
    let paths = RunPaths::new(runs.path(), "run-x");
    std::fs::create_dir_all(paths.root()).unwrap();
    let spec = WorkspaceSpec {
        mode: WorkspaceMode::Copy,
        target_repo: source.path().to_path_buf(),
        branch: None,
        base_branch: None,
        require_git: false,
    };

    let workspace = prepare(&spec, &paths).await.unwrap();
    assert!(workspace.join("file.txt").exists());
    assert!(workspace.join("src/main.rs").exists());
    assert!(!workspace.join(".git").exists());
}
