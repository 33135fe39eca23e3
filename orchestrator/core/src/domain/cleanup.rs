// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Cleanup Domain Model
//!
//! A `CleanupScope` names the environment tag whose resources are to be
//! destroyed. The scope must never resolve to a production stage; the
//! coordinator enforces that before enumerating anything.

use serde::{Deserialize, Serialize};

// ============================================================================
// Scope
// ============================================================================

/// Scope of a cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupScope {
    /// Environment tag matched against each resource's recorded tag.
    pub environment_tag: String,
    /// When true, candidates are reported and nothing is deleted.
    pub dry_run: bool,
}

impl CleanupScope {
    pub fn new(environment_tag: impl Into<String>, dry_run: bool) -> Self {
        Self {
            environment_tag: environment_tag.into(),
            dry_run,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Kind of a cleanup candidate resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Workspace,
    Connection,
    /// A data pipeline item inside a matched workspace. Listed and deleted
    /// ahead of its workspace so pipeline-level failures are attributable.
    Pipeline,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Workspace => f.write_str("workspace"),
            ResourceKind::Connection => f.write_str("connection"),
            ResourceKind::Pipeline => f.write_str("pipeline"),
        }
    }
}

/// Reference to a remote resource considered for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

/// Aggregate result of one cleanup pass. Individual delete failures are
/// collected here, never raised on first occurrence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub candidates: Vec<ResourceRef>,
    pub deleted: Vec<ResourceRef>,
    pub failures: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub resource: ResourceRef,
    pub reason: String,
}

impl CleanupReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
