// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! # Remote Gateway Interface
//!
//! Typed contract over the external REST surface, following the
//! interface-in-domain / implementation-in-infrastructure split:
//!
//! | Trait | Implementations |
//! |-------|-----------------|
//! | `RemoteGateway` | `HttpRemoteGateway` (production), `InMemoryGateway` (tests, dry runs) |
//!
//! Implementations own all retry and rate-limit handling; callers of this
//! trait see either a typed result or a terminal [`EngineError`]. The only
//! state an implementation may keep between calls is short-lived
//! connection/session context.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::item::{ItemDefinition, ItemKey};
use crate::domain::workspace::{
    Capacity, CapacityId, Connection, ConnectionId, ManagedIdentity, Workspace, WorkspaceId,
};
use crate::error::EngineError;

// ============================================================================
// Long-running operations
// ============================================================================

/// Handle to an asynchronous remote operation, polled to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub id: Uuid,
    /// Server-suggested delay before the first poll, when provided.
    pub retry_after: Option<Duration>,
}

impl OperationHandle {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            retry_after: None,
        }
    }
}

/// Observed state of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed(String),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Running)
    }
}

// ============================================================================
// Gateway contract
// ============================================================================

/// One operation per remote entity kind. Inputs are validated identifiers or
/// names; outputs mirror the domain entities.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    // Workspaces
    async fn create_workspace(
        &self,
        name: &str,
        capacity: Option<CapacityId>,
    ) -> Result<Workspace, EngineError>;
    async fn get_workspace(&self, id: WorkspaceId) -> Result<Workspace, EngineError>;
    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, EngineError>;
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, EngineError>;
    async fn update_workspace(&self, workspace: &Workspace) -> Result<(), EngineError>;
    async fn delete_workspace(&self, id: WorkspaceId) -> Result<(), EngineError>;

    // Items
    async fn list_items(&self, workspace: WorkspaceId) -> Result<Vec<ItemKey>, EngineError>;
    async fn get_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<ItemDefinition, EngineError>;
    async fn create_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError>;
    async fn update_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError>;
    async fn delete_item(&self, workspace: WorkspaceId, key: &ItemKey)
        -> Result<(), EngineError>;
    /// Start execution of a callable item (pipeline, function).
    async fn invoke_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<OperationHandle, EngineError>;

    // Tenant-level resources
    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError>;
    async fn delete_connection(&self, id: ConnectionId) -> Result<(), EngineError>;
    async fn list_capacities(&self) -> Result<Vec<Capacity>, EngineError>;

    // Managed identity
    async fn get_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<Option<ManagedIdentity>, EngineError>;
    async fn provision_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<OperationHandle, EngineError>;

    // Long-running operations
    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, EngineError>;
}
