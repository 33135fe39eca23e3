// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! In-memory Remote Gateway
//!
//! Backs the application-service tests and local dry runs with a hashmap
//! behind the [`RemoteGateway`] trait. Supports fault injection so partial
//! failure paths (flaky item reads, rejected writes, failing deletes) can be
//! exercised deterministically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::item::{ItemDefinition, ItemKey};
use crate::domain::remote::{OperationHandle, OperationStatus, RemoteGateway};
use crate::domain::workspace::{
    Capacity, CapacityId, Connection, ConnectionId, IdentityId, ManagedIdentity, Stage, Workspace,
    WorkspaceId,
};
use crate::error::EngineError;

#[derive(Default)]
struct State {
    workspaces: HashMap<WorkspaceId, Workspace>,
    items: HashMap<WorkspaceId, BTreeMap<ItemKey, ItemDefinition>>,
    connections: HashMap<ConnectionId, Connection>,
    capacities: Vec<Capacity>,
    operations: HashMap<Uuid, OperationStatus>,
    /// Operation id -> workspace awaiting identity attachment.
    pending_identities: HashMap<Uuid, WorkspaceId>,
    identity_creations: u32,
    /// Number of polls an identity attachment stays invisible for.
    identity_attach_after_polls: u32,
    failing_reads: HashSet<(WorkspaceId, ItemKey)>,
    failing_writes: HashSet<(WorkspaceId, ItemKey)>,
    failing_workspace_deletes: HashSet<WorkspaceId>,
    /// Latency applied to item writes before anything lands.
    item_write_delay: Option<Duration>,
}

/// Hashmap-backed [`RemoteGateway`].
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<State>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workspace(&self, workspace: Workspace) -> WorkspaceId {
        let id = workspace.id;
        self.state.lock().workspaces.insert(id, workspace);
        id
    }

    pub fn insert_item(&self, workspace: WorkspaceId, item: ItemDefinition) {
        self.state
            .lock()
            .items
            .entry(workspace)
            .or_default()
            .insert(item.key.clone(), item);
    }

    pub fn insert_connection(&self, connection: Connection) {
        self.state
            .lock()
            .connections
            .insert(connection.id, connection);
    }

    pub fn insert_capacity(&self, capacity: Capacity) {
        self.state.lock().capacities.push(capacity);
    }

    /// Make reads of this item fail with a transient-looking error.
    pub fn fail_item_read(&self, workspace: WorkspaceId, key: ItemKey) {
        self.state.lock().failing_reads.insert((workspace, key));
    }

    /// Make writes of this item be rejected by the "remote".
    pub fn fail_item_write(&self, workspace: WorkspaceId, key: ItemKey) {
        self.state.lock().failing_writes.insert((workspace, key));
    }

    pub fn fail_workspace_delete(&self, workspace: WorkspaceId) {
        self.state
            .lock()
            .failing_workspace_deletes
            .insert(workspace);
    }

    /// Make every item write take `delay` before it lands. A write future
    /// dropped during the delay leaves no trace in the workspace.
    pub fn set_item_write_delay(&self, delay: Duration) {
        self.state.lock().item_write_delay = Some(delay);
    }

    /// Delay identity attachment visibility by `polls` status polls.
    pub fn set_identity_attach_after_polls(&self, polls: u32) {
        self.state.lock().identity_attach_after_polls = polls;
    }

    pub fn identity_creation_count(&self) -> u32 {
        self.state.lock().identity_creations
    }

    pub fn items_of(&self, workspace: WorkspaceId) -> Vec<ItemDefinition> {
        self.state
            .lock()
            .items
            .get(&workspace)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn workspace_count(&self) -> usize {
        self.state.lock().workspaces.len()
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn create_workspace(
        &self,
        name: &str,
        capacity: Option<CapacityId>,
    ) -> Result<Workspace, EngineError> {
        let mut ws = Workspace::new(name, Stage::Unmanaged);
        ws.capacity = capacity;
        self.state.lock().workspaces.insert(ws.id, ws.clone());
        Ok(ws)
    }

    async fn get_workspace(&self, id: WorkspaceId) -> Result<Workspace, EngineError> {
        self.state
            .lock()
            .workspaces
            .get(&id)
            .cloned()
            .ok_or(EngineError::RemoteRejected {
                status: 404,
                message: format!("workspace {id} not found"),
            })
    }

    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, EngineError> {
        Ok(self
            .state
            .lock()
            .workspaces
            .values()
            .find(|w| w.name == name)
            .cloned())
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>, EngineError> {
        Ok(self.state.lock().workspaces.values().cloned().collect())
    }

    async fn update_workspace(&self, workspace: &Workspace) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match state.workspaces.get_mut(&workspace.id) {
            Some(existing) => {
                *existing = workspace.clone();
                Ok(())
            }
            None => Err(EngineError::RemoteRejected {
                status: 404,
                message: format!("workspace {} not found", workspace.id),
            }),
        }
    }

    async fn delete_workspace(&self, id: WorkspaceId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.failing_workspace_deletes.contains(&id) {
            return Err(EngineError::RemoteRejected {
                status: 409,
                message: "workspace has active sessions".into(),
            });
        }
        state.items.remove(&id);
        state
            .workspaces
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::RemoteRejected {
                status: 404,
                message: format!("workspace {id} not found"),
            })
    }

    async fn list_items(&self, workspace: WorkspaceId) -> Result<Vec<ItemKey>, EngineError> {
        Ok(self
            .state
            .lock()
            .items
            .get(&workspace)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<ItemDefinition, EngineError> {
        let state = self.state.lock();
        if state.failing_reads.contains(&(workspace, key.clone())) {
            return Err(EngineError::RemoteUnavailable {
                attempts: 5,
                reason: "simulated read fault".into(),
            });
        }
        state
            .items
            .get(&workspace)
            .and_then(|m| m.get(key))
            .cloned()
            .ok_or(EngineError::RemoteRejected {
                status: 404,
                message: format!("item {key} not found"),
            })
    }

    async fn create_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError> {
        let delay = self.state.lock().item_write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if state.failing_writes.contains(&(workspace, item.key.clone())) {
            return Err(EngineError::RemoteRejected {
                status: 400,
                message: "simulated write rejection".into(),
            });
        }
        state
            .items
            .entry(workspace)
            .or_default()
            .insert(item.key.clone(), item.clone());
        Ok(())
    }

    async fn update_item(
        &self,
        workspace: WorkspaceId,
        item: &ItemDefinition,
    ) -> Result<(), EngineError> {
        // Same upsert semantics the remote applies on update-by-key.
        self.create_item(workspace, item).await
    }

    async fn delete_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .items
            .get_mut(&workspace)
            .and_then(|m| m.remove(key))
            .map(|_| ())
            .ok_or(EngineError::RemoteRejected {
                status: 404,
                message: format!("item {key} not found"),
            })
    }

    async fn invoke_item(
        &self,
        workspace: WorkspaceId,
        key: &ItemKey,
    ) -> Result<OperationHandle, EngineError> {
        let mut state = self.state.lock();
        if state
            .items
            .get(&workspace)
            .map(|m| !m.contains_key(key))
            .unwrap_or(true)
        {
            return Err(EngineError::RemoteRejected {
                status: 404,
                message: format!("item {key} not found"),
            });
        }
        let op = Uuid::new_v4();
        state.operations.insert(op, OperationStatus::Succeeded);
        Ok(OperationHandle::new(op))
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, EngineError> {
        Ok(self.state.lock().connections.values().cloned().collect())
    }

    async fn delete_connection(&self, id: ConnectionId) -> Result<(), EngineError> {
        self.state
            .lock()
            .connections
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::RemoteRejected {
                status: 404,
                message: format!("connection {id} not found"),
            })
    }

    async fn list_capacities(&self) -> Result<Vec<Capacity>, EngineError> {
        Ok(self.state.lock().capacities.clone())
    }

    async fn get_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<Option<ManagedIdentity>, EngineError> {
        Ok(self
            .state
            .lock()
            .workspaces
            .get(&workspace)
            .and_then(|w| w.identity.clone()))
    }

    async fn provision_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<OperationHandle, EngineError> {
        let mut state = self.state.lock();
        if !state.workspaces.contains_key(&workspace) {
            return Err(EngineError::RemoteRejected {
                status: 404,
                message: format!("workspace {workspace} not found"),
            });
        }
        state.identity_creations += 1;
        let op = Uuid::new_v4();
        state.operations.insert(op, OperationStatus::Running);
        state.pending_identities.insert(op, workspace);
        Ok(OperationHandle::new(op))
    }

    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, EngineError> {
        let mut state = self.state.lock();
        let Some(status) = state.operations.get(&handle.id).cloned() else {
            return Err(EngineError::RemoteRejected {
                status: 404,
                message: format!("operation {} not found", handle.id),
            });
        };
        if status == OperationStatus::Running {
            if state.identity_attach_after_polls > 0 {
                state.identity_attach_after_polls -= 1;
                return Ok(OperationStatus::Running);
            }
            // Complete pending identity attachments on poll.
            if let Some(ws) = state.pending_identities.remove(&handle.id) {
                let identity = ManagedIdentity {
                    id: IdentityId::new(),
                    application_id: None,
                };
                if let Some(workspace) = state.workspaces.get_mut(&ws) {
                    workspace.identity = Some(identity);
                }
            }
            state
                .operations
                .insert(handle.id, OperationStatus::Succeeded);
            return Ok(OperationStatus::Succeeded);
        }
        Ok(status)
    }
}
