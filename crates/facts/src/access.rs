// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role-gated access to memory types and unredacted exports.

use crate::model::MemoryType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub allowed_types: Vec<MemoryType>,
    pub can_see_unredacted: bool,
}

impl Role {
    pub fn new(name: impl Into<String>, allowed_types: Vec<MemoryType>, can_see_unredacted: bool) -> Self {
        Self { name: name.into(), allowed_types, can_see_unredacted }
    }

    /// Unrestricted access.
    pub fn admin() -> Self {
        Self::new("admin", MemoryType::ALL.to_vec(), true)
    }

    /// Everything except raw secrets in exports.
    pub fn user() -> Self {
        Self::new("user", MemoryType::ALL.to_vec(), false)
    }

    /// Facts only, redacted.
    pub fn guest() -> Self {
        Self::new("guest", vec![MemoryType::Fact], false)
    }

    /// Resolve a configured role name; unknown names fall back to guest.
    pub fn named(name: &str) -> Self {
        match name {
            "admin" => Self::admin(),
            "user" => Self::user(),
            "guest" => Self::guest(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to guest");
                Self::guest()
            }
        }
    }

    pub fn allows(&self, memory_type: MemoryType) -> bool {
        self.allowed_types.contains(&memory_type)
    }
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;
