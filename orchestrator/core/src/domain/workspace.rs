// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Workspace Domain Model
//!
//! Entities and value objects for analytics workspaces and their position in
//! the promotion pipeline.
//!
//! # Invariants
//!
//! - A `WorkspaceId` is opaque, immutable, and never reused after deletion.
//! - At most one non-unmanaged workspace is bound per stage within a project
//!   (enforced by the Environment Registry).
//! - A git-integrated stage binds to exactly one branch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

macro_rules! remote_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

remote_id! {
    /// Opaque remote identifier of a workspace. Stage-local, never portable.
    WorkspaceId
}
remote_id! {
    /// Identifier of a compute capacity a workspace is assigned to.
    CapacityId
}
remote_id! {
    /// Identifier of a tenant-level connection resource.
    ConnectionId
}
remote_id! {
    /// Identifier of a managed identity attached to a workspace.
    IdentityId
}

// ============================================================================
// Value Object: Stage
// ============================================================================

/// A named position in the promotion sequence.
///
/// `Unmanaged` marks a workspace that exists remotely but is not governed by
/// the pipeline; promotions refuse to touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dev,
    Test,
    Prod,
    Unmanaged,
}

impl Stage {
    /// Parse a stage name, case-insensitive.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Stage::Dev),
            "test" => Ok(Stage::Test),
            "prod" | "production" => Ok(Stage::Prod),
            "unmanaged" => Ok(Stage::Unmanaged),
            other => Err(EngineError::UnknownStage(other.to_string())),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Stage::Prod)
    }

    pub fn is_managed(&self) -> bool {
        !matches!(self, Stage::Unmanaged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dev => "dev",
            Stage::Test => "test",
            Stage::Prod => "prod",
            Stage::Unmanaged => "unmanaged",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A managed identity attached to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedIdentity {
    pub id: IdentityId,
    /// Directory application id, when the remote exposes one.
    pub application_id: Option<String>,
}

/// An analytics workspace as seen through the Remote Gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    /// Unique within the tenant; mutable, unlike `id`.
    pub name: String,
    pub stage: Stage,
    /// Environment tag recorded on the remote resource. Cleanup matches on
    /// this, never on the display name.
    pub environment_tag: Option<String>,
    pub capacity: Option<CapacityId>,
    pub identity: Option<ManagedIdentity>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: WorkspaceId::new(),
            name: name.into(),
            stage,
            environment_tag: if stage.is_managed() {
                Some(stage.as_str().to_string())
            } else {
                None
            },
            capacity: None,
            identity: None,
        }
    }
}

/// A tenant-level connection resource (distinct from `connection` items that
/// live inside a workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub name: String,
    pub environment_tag: Option<String>,
}

/// A compute capacity available to workspaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capacity {
    pub id: CapacityId,
    pub name: String,
}

// ============================================================================
// Stage Binding
// ============================================================================

/// Git integration details of a stage binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitBinding {
    pub repository: String,
    pub branch: String,
}

/// The registry's record tying a stage to a concrete workspace plus its
/// stage-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBinding {
    pub stage: Stage,
    pub workspace_id: WorkspaceId,
    pub git: Option<GitBinding>,
    /// Stage-specific parameter values, substituted into item placeholders at
    /// import time. Always wins over source-embedded defaults.
    pub parameter_overrides: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parsing_is_case_insensitive() {
        assert_eq!(Stage::parse("DEV").unwrap(), Stage::Dev);
        assert_eq!(Stage::parse("Production").unwrap(), Stage::Prod);
        assert_eq!(Stage::parse("test").unwrap(), Stage::Test);
        assert!(Stage::parse("staging").is_err());
    }

    #[test]
    fn production_guard_helper() {
        assert!(Stage::Prod.is_production());
        assert!(!Stage::Test.is_production());
        assert!(!Stage::Unmanaged.is_managed());
    }

    #[test]
    fn managed_workspace_gets_environment_tag() {
        let ws = Workspace::new("proj-dev", Stage::Dev);
        assert_eq!(ws.environment_tag.as_deref(), Some("dev"));

        let orphan = Workspace::new("scratch", Stage::Unmanaged);
        assert!(orphan.environment_tag.is_none());
    }
}
