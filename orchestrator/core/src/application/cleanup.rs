// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Cleanup Coordinator (Application Service)
//!
//! Destroys non-production resources matching an environment scope. The
//! production guard runs before any enumeration and cannot be bypassed by
//! `dry_run` or any caller flag. Individual delete failures are collected
//! into the report; the pass never stops at the first failure.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::registry::EnvironmentRegistry;
use crate::domain::cleanup::{
    CleanupFailure, CleanupReport, CleanupScope, ResourceKind, ResourceRef,
};
use crate::domain::item::{ItemKey, ItemType};
use crate::domain::remote::RemoteGateway;
use crate::domain::workspace::{ConnectionId, WorkspaceId};
use crate::error::EngineError;
use uuid::Uuid;

pub struct CleanupCoordinator {
    gateway: Arc<dyn RemoteGateway>,
    registry: Arc<EnvironmentRegistry>,
}

impl CleanupCoordinator {
    pub fn new(gateway: Arc<dyn RemoteGateway>, registry: Arc<EnvironmentRegistry>) -> Self {
        Self { gateway, registry }
    }

    pub async fn cleanup(&self, scope: &CleanupScope) -> Result<CleanupReport, EngineError> {
        // Guard first: nothing is even enumerated for a production tag.
        if self.registry.tag_is_production(&scope.environment_tag) {
            return Err(EngineError::ProductionDeleteRefused {
                tag: scope.environment_tag.clone(),
            });
        }

        let mut report = CleanupReport::default();

        let matched: Vec<_> = self
            .gateway
            .list_workspaces()
            .await?
            .into_iter()
            .filter(|w| w.environment_tag.as_deref() == Some(scope.environment_tag.as_str()))
            .collect();

        // Pipelines of a matched workspace inherit its tag. They go first so
        // a pipeline that refuses deletion is reported on its own, not folded
        // into a workspace-level failure. A pipeline candidate carries its
        // workspace id; the key is reconstructed from `(name, dataPipeline)`.
        for workspace in &matched {
            for key in self.gateway.list_items(workspace.id).await? {
                if key.item_type == ItemType::DataPipeline {
                    report.candidates.push(ResourceRef {
                        kind: ResourceKind::Pipeline,
                        id: workspace.id.to_string(),
                        name: key.name,
                    });
                }
            }
        }
        for workspace in &matched {
            report.candidates.push(ResourceRef {
                kind: ResourceKind::Workspace,
                id: workspace.id.to_string(),
                name: workspace.name.clone(),
            });
        }
        for connection in self.gateway.list_connections().await? {
            if connection.environment_tag.as_deref() == Some(scope.environment_tag.as_str()) {
                report.candidates.push(ResourceRef {
                    kind: ResourceKind::Connection,
                    id: connection.id.to_string(),
                    name: connection.name.clone(),
                });
            }
        }

        if scope.dry_run {
            for candidate in &report.candidates {
                info!(kind = %candidate.kind, name = %candidate.name, "cleanup candidate (dry run)");
            }
            return Ok(report);
        }

        for candidate in report.candidates.clone() {
            let result = match (candidate.kind, candidate.id.parse::<Uuid>()) {
                (ResourceKind::Workspace, Ok(raw)) => {
                    self.gateway.delete_workspace(WorkspaceId::from_uuid(raw)).await
                }
                (ResourceKind::Connection, Ok(raw)) => {
                    self.gateway
                        .delete_connection(ConnectionId::from_uuid(raw))
                        .await
                }
                (ResourceKind::Pipeline, Ok(raw)) => {
                    let key = ItemKey::new(candidate.name.clone(), ItemType::DataPipeline);
                    self.gateway
                        .delete_item(WorkspaceId::from_uuid(raw), &key)
                        .await
                }
                (_, Err(err)) => Err(EngineError::InvalidConfig(format!(
                    "malformed resource id {}: {err}",
                    candidate.id
                ))),
            };
            match result {
                Ok(()) => {
                    info!(kind = %candidate.kind, name = %candidate.name, "deleted");
                    report.deleted.push(candidate);
                }
                Err(err) => {
                    warn!(kind = %candidate.kind, name = %candidate.name, error = %err, "delete failed");
                    report.failures.push(CleanupFailure {
                        resource: candidate,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::ItemDefinition;
    use crate::domain::workspace::{Connection, ConnectionId, Stage, Workspace};
    use crate::infrastructure::config_loader::StageSettings;
    use crate::infrastructure::memory::InMemoryGateway;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn registry() -> Arc<EnvironmentRegistry> {
        let mut settings = BTreeMap::new();
        for (stage, ws, tag) in [
            (Stage::Dev, "proj-dev", "dev"),
            (Stage::Test, "proj-test", "test"),
            (Stage::Prod, "proj-prod", "live"),
        ] {
            settings.insert(
                stage,
                StageSettings {
                    workspace: ws.to_string(),
                    environment_tag: tag.to_string(),
                    capacity: None,
                    parameter_overrides: BTreeMap::new(),
                    git: None,
                },
            );
        }
        Arc::new(EnvironmentRegistry::new(settings, None))
    }

    fn populated_gateway() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        let test = gateway.insert_workspace(Workspace::new("proj-test", Stage::Test));
        gateway.insert_workspace(Workspace::new("proj-test-scratch", Stage::Test));
        gateway.insert_workspace(Workspace::new("proj-prod", Stage::Prod));
        gateway.insert_item(
            test,
            ItemDefinition::new(
                ItemKey::new("nightly-etl", ItemType::DataPipeline),
                json!({ "activities": [] }),
            ),
        );
        gateway.insert_item(
            test,
            ItemDefinition::new(ItemKey::new("scratch-nb", ItemType::Notebook), json!({})),
        );
        gateway.insert_connection(Connection {
            id: ConnectionId::new(),
            name: "test-db".into(),
            environment_tag: Some("test".into()),
        });
        gateway
    }

    fn coordinator(gateway: &InMemoryGateway) -> CleanupCoordinator {
        CleanupCoordinator::new(Arc::new(gateway.clone()), registry())
    }

    #[tokio::test]
    async fn production_tag_is_refused_for_all_dry_run_values() {
        let gateway = populated_gateway();
        for dry_run in [true, false] {
            for tag in ["prod", "live"] {
                let err = coordinator(&gateway)
                    .cleanup(&CleanupScope::new(tag, dry_run))
                    .await
                    .unwrap_err();
                assert!(matches!(err, EngineError::ProductionDeleteRefused { .. }));
            }
        }
        // Nothing was deleted by any refused attempt.
        assert_eq!(gateway.workspace_count(), 3);
        assert_eq!(gateway.connection_count(), 1);
    }

    #[tokio::test]
    async fn dry_run_lists_candidates_without_deleting() {
        let gateway = populated_gateway();
        let report = coordinator(&gateway)
            .cleanup(&CleanupScope::new("test", true))
            .await
            .unwrap();

        let workspaces: Vec<_> = report
            .candidates
            .iter()
            .filter(|c| c.kind == ResourceKind::Workspace)
            .collect();
        assert_eq!(workspaces.len(), 2);
        // The tagged workspace's pipeline is its own candidate; its other
        // item kinds are covered by the workspace deletion itself.
        let pipelines: Vec<_> = report
            .candidates
            .iter()
            .filter(|c| c.kind == ResourceKind::Pipeline)
            .collect();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name, "nightly-etl");
        assert!(report.deleted.is_empty());
        assert_eq!(gateway.workspace_count(), 3);
    }

    #[tokio::test]
    async fn delete_continues_past_individual_failures() {
        let gateway = populated_gateway();
        let stuck = gateway
            .find_workspace_by_name("proj-test-scratch")
            .await
            .unwrap()
            .unwrap();
        gateway.fail_workspace_delete(stuck.id);

        let report = coordinator(&gateway)
            .cleanup(&CleanupScope::new("test", false))
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource.name, "proj-test-scratch");
        // The pipeline, the other test workspace, and the test connection
        // were deleted.
        assert_eq!(report.deleted.len(), 3);
        assert!(report
            .deleted
            .iter()
            .any(|r| r.kind == ResourceKind::Pipeline && r.name == "nightly-etl"));
        assert_eq!(gateway.workspace_count(), 2);
        assert_eq!(gateway.connection_count(), 0);
    }

    #[tokio::test]
    async fn untagged_resources_are_never_candidates() {
        let gateway = populated_gateway();
        gateway.insert_workspace(Workspace::new("scratch", Stage::Unmanaged));

        let report = coordinator(&gateway)
            .cleanup(&CleanupScope::new("test", true))
            .await
            .unwrap();
        assert!(report.candidates.iter().all(|c| c.name != "scratch"));
    }
}
