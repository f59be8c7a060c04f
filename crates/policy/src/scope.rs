// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path and network scope checks.

use crate::policy::{NetworkBehavior, NetworkScope, PathScope, PathScopeMode};
use std::path::{Component, Path, PathBuf};

/// Resolve a target path against the workspace root and check it against
/// the path scope. Returns a denial reason, or `None` when in scope.
pub fn check_path(scope: &PathScope, workspace_root: &Path, target: &Path) -> Option<String> {
    let resolved = resolve(workspace_root, target);

    let in_workspace = resolved.starts_with(workspace_root);
    let in_temp = resolved.starts_with(std::env::temp_dir());
    let in_scope = match scope.mode {
        PathScopeMode::WorkspaceOnly => in_workspace,
        PathScopeMode::WorkspaceAndTemp => in_workspace || in_temp,
    };
    if !in_scope {
        return Some(format!("path outside workspace scope: {}", resolved.display()));
    }

    for prefix in &scope.denied_prefixes {
        let denied = resolve(workspace_root, prefix);
        if resolved.starts_with(&denied) {
            return Some(format!("path is on the denied list: {}", resolved.display()));
        }
    }

    if scope.block_symlink_escape {
        if let Some(real) = canonicalize_existing(&resolved) {
            let real_root = workspace_root.canonicalize().unwrap_or_else(|_| workspace_root.to_path_buf());
            let real_in_scope = match scope.mode {
                PathScopeMode::WorkspaceOnly => real.starts_with(&real_root),
                PathScopeMode::WorkspaceAndTemp => {
                    let real_temp = std::env::temp_dir()
                        .canonicalize()
                        .unwrap_or_else(|_| std::env::temp_dir());
                    real.starts_with(&real_root) || real.starts_with(&real_temp)
                }
            };
            if !real_in_scope {
                return Some(format!(
                    "symlink escapes workspace scope: {} -> {}",
                    resolved.display(),
                    real.display()
                ));
            }
        }
    }

    None
}

/// Join relative targets onto the root, then normalize `.`/`..` lexically.
fn resolve(workspace_root: &Path, target: &Path) -> PathBuf {
    let joined = if target.is_absolute() {
        target.to_path_buf()
    } else {
        workspace_root.join(target)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor, reattaching the missing tail.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            let mut real = existing.canonicalize().ok()?;
            for part in tail.iter().rev() {
                real.push(part);
            }
            return Some(real);
        }
        tail.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
}

/// Network check result: `Some(decision-reason)` when the scope decides,
/// `None` is unreachable by construction (the default always decides).
pub fn check_network(scope: &NetworkScope, url: &str) -> Result<String, String> {
    let Some(host) = host_of(url) else {
        return Err(format!("invalid URL: {url}"));
    };

    for pattern in &scope.denied_domains {
        if domain_matches(pattern, &host) {
            return Err(format!("domain is denied: {host}"));
        }
    }
    for pattern in &scope.allowed_domains {
        if domain_matches(pattern, &host) {
            return Ok(format!("domain is allowed: {host}"));
        }
    }
    for pattern in &scope.allowed_urls {
        if let Ok(glob) = glob::Pattern::new(pattern) {
            if glob.matches(url) {
                return Ok(format!("URL matches allowed pattern: {pattern}"));
            }
        }
    }

    match scope.default_behavior {
        NetworkBehavior::Allow => Ok("network default: allow".to_string()),
        NetworkBehavior::Deny => Err("network default: deny".to_string()),
    }
}

/// Extract the lowercase host from `scheme://host[:port]/...`.
pub fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    // Strip credentials and port.
    let host = authority.rsplit('@').next()?.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Exact match, or `*.suffix` matching any subdomain (not the apex).
fn domain_matches(pattern: &str, host: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host.len() > suffix.len() + 1
            && host.ends_with(suffix)
            && host.as_bytes()[host.len() - suffix.len() - 1] == b'.';
    }
    pattern.eq_ignore_ascii_case(host)
}

/// True when the URL points somewhere other than the local host.
pub fn is_external_url(url: &str) -> bool {
    match host_of(url) {
        Some(host) => !matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1" | "[::1]"),
        None => false,
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
