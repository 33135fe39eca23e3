// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Item Definition Store (Application Service)
//!
//! Reads and writes the set of logical items belonging to a workspace as a
//! portable, diffable bundle.
//!
//! Export tolerates individual item read failures by recording them; it
//! never silently drops one and never aborts the whole export for one bad
//! item. Import is best-effort across items (each item write is atomic, the
//! loop always continues) and upserts by `(name, type)` so re-imports never
//! duplicate.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::item::{ItemDefinition, ItemFailure, ItemKey};
use crate::domain::promotion::{ItemOutcome, PromotionPhase};
use crate::domain::remote::RemoteGateway;
use crate::domain::workspace::WorkspaceId;
use crate::error::EngineError;

// ============================================================================
// Bundles and reports
// ============================================================================

/// A consistent-as-possible snapshot of a workspace's items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub workspace: WorkspaceId,
    pub items: Vec<ItemDefinition>,
    /// Items that could not be read. Reported, never dropped.
    pub failures: Vec<ItemOutcome>,
}

impl ExportBundle {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Per-item outcomes of one import pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub outcomes: Vec<ItemOutcome>,
}

// ============================================================================
// Store
// ============================================================================

pub struct ItemDefinitionStore {
    gateway: Arc<dyn RemoteGateway>,
    max_in_flight: usize,
}

impl ItemDefinitionStore {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            gateway,
            max_in_flight: 4,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Read every item of `workspace`. Individual read failures are recorded
    /// in the bundle; only the item listing itself is fatal.
    pub async fn export(&self, workspace: WorkspaceId) -> Result<ExportBundle, EngineError> {
        let keys = self.gateway.list_items(workspace).await?;
        debug!(%workspace, count = keys.len(), "exporting items");

        let reads: Vec<(ItemKey, Result<ItemDefinition, EngineError>)> = stream::iter(keys)
            .map(|key| {
                let gateway = Arc::clone(&self.gateway);
                async move {
                    let result = gateway.get_item(workspace, &key).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (key, result) in reads {
            match result {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(item = %key, error = %err, "item export failed");
                    failures.push(ItemOutcome::failed(
                        key,
                        PromotionPhase::Export,
                        ItemFailure::ReadFailed {
                            reason: err.to_string(),
                        },
                    ));
                }
            }
        }
        // Deterministic ordering for reports and bundle diffs.
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(ExportBundle {
            workspace,
            items,
            failures,
        })
    }

    /// Write `items` into `workspace`, substituting parameter placeholders
    /// from `overrides` first. Upserts by `(name, type)`; a failure on one
    /// item never stops the others.
    pub async fn import(
        &self,
        workspace: WorkspaceId,
        items: &[ItemDefinition],
        overrides: &BTreeMap<String, String>,
    ) -> Result<ImportReport, EngineError> {
        let mut outcomes = Vec::new();
        self.import_into(workspace, items, overrides, &mut outcomes)
            .await?;
        Ok(ImportReport { outcomes })
    }

    /// Like [`import`](Self::import), but pushes each outcome into `outcomes`
    /// the moment its write resolves. A caller that abandons the pass midway
    /// (run timeout, cancellation) keeps the record of every item that had
    /// already landed; only writes still in flight are lost.
    pub async fn import_into(
        &self,
        workspace: WorkspaceId,
        items: &[ItemDefinition],
        overrides: &BTreeMap<String, String>,
        outcomes: &mut Vec<ItemOutcome>,
    ) -> Result<(), EngineError> {
        let existing: HashSet<ItemKey> = self
            .gateway
            .list_items(workspace)
            .await?
            .into_iter()
            .collect();

        let start = outcomes.len();
        let mut writes = stream::iter(items)
            .map(|item| {
                let gateway = Arc::clone(&self.gateway);
                let update = existing.contains(&item.key);
                async move {
                    let key = item.key.clone();
                    let bound = match item.bind_parameters(overrides) {
                        Ok(bound) => bound,
                        Err(failure) => {
                            return ItemOutcome::failed(key, PromotionPhase::Import, failure)
                        }
                    };
                    let write = if update {
                        gateway.update_item(workspace, &bound).await
                    } else {
                        gateway.create_item(workspace, &bound).await
                    };
                    match write {
                        Ok(()) => ItemOutcome::ok(key, PromotionPhase::Import),
                        Err(EngineError::RemoteRejected { status, message }) => ItemOutcome::failed(
                            key,
                            PromotionPhase::Import,
                            ItemFailure::RemoteRejected { status, message },
                        ),
                        Err(other) => ItemOutcome::failed(
                            key,
                            PromotionPhase::Import,
                            ItemFailure::RemoteRejected {
                                status: 0,
                                message: other.to_string(),
                            },
                        ),
                    }
                }
            })
            .buffer_unordered(self.max_in_flight);

        while let Some(outcome) = writes.next().await {
            outcomes.push(outcome);
        }

        outcomes[start..].sort_by(|a, b| a.key.cmp(&b.key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{ItemType, ParameterBinding};
    use crate::domain::workspace::{Stage, Workspace};
    use crate::infrastructure::memory::InMemoryGateway;
    use serde_json::json;

    fn notebook(name: &str) -> ItemDefinition {
        ItemDefinition::new(
            ItemKey::new(name, ItemType::Notebook),
            json!({ "cells": [] }),
        )
    }

    fn store(gateway: &InMemoryGateway) -> ItemDefinitionStore {
        ItemDefinitionStore::new(Arc::new(gateway.clone()))
    }

    #[tokio::test]
    async fn export_records_partial_failures_and_keeps_going() {
        let gateway = InMemoryGateway::new();
        let ws = gateway.insert_workspace(Workspace::new("proj-dev", Stage::Dev));
        for i in 0..10 {
            gateway.insert_item(ws, notebook(&format!("nb-{i}")));
        }
        gateway.fail_item_read(ws, ItemKey::new("nb-3", ItemType::Notebook));
        gateway.fail_item_read(ws, ItemKey::new("nb-7", ItemType::Notebook));

        let bundle = store(&gateway).export(ws).await.unwrap();
        assert_eq!(bundle.items.len(), 8);
        assert_eq!(bundle.failures.len(), 2);
        assert!(bundle
            .failures
            .iter()
            .all(|o| o.phase == PromotionPhase::Export && !o.is_ok()));
    }

    #[tokio::test]
    async fn import_continues_past_missing_bindings() {
        let gateway = InMemoryGateway::new();
        let ws = gateway.insert_workspace(Workspace::new("proj-test", Stage::Test));

        let good = notebook("good");
        let bad = ItemDefinition::new(
            ItemKey::new("bad", ItemType::Connection),
            json!({ "endpoint": "{{param:EP}}" }),
        )
        .with_parameter(ParameterBinding {
            name: "EP".into(),
            default: None,
            required: true,
        });

        let report = store(&gateway)
            .import(ws, &[bad, good], &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        let bad_outcome = report
            .outcomes
            .iter()
            .find(|o| o.key.name == "bad")
            .unwrap();
        assert_eq!(
            bad_outcome.failure,
            Some(ItemFailure::MissingParameterBinding {
                parameter: "EP".into()
            })
        );
        let good_outcome = report
            .outcomes
            .iter()
            .find(|o| o.key.name == "good")
            .unwrap();
        assert!(good_outcome.is_ok());
        // The good item actually landed.
        assert_eq!(gateway.items_of(ws).len(), 1);
    }

    #[tokio::test]
    async fn import_upserts_by_name_and_type() {
        let gateway = InMemoryGateway::new();
        let ws = gateway.insert_workspace(Workspace::new("proj-test", Stage::Test));

        let v1 = notebook("daily");
        store(&gateway)
            .import(ws, &[v1], &BTreeMap::new())
            .await
            .unwrap();

        let mut v2 = notebook("daily");
        v2.payload = json!({ "cells": ["updated"] });
        store(&gateway)
            .import(ws, &[v2], &BTreeMap::new())
            .await
            .unwrap();

        let items = gateway.items_of(ws);
        assert_eq!(items.len(), 1, "re-import must not duplicate");
        assert_eq!(items[0].payload["cells"][0], "updated");
    }

    #[tokio::test]
    async fn bundle_round_trips_through_json() {
        let gateway = InMemoryGateway::new();
        let ws = gateway.insert_workspace(Workspace::new("proj-dev", Stage::Dev));
        gateway.insert_item(ws, notebook("nb"));

        let bundle = store(&gateway).export(ws).await.unwrap();
        let restored = ExportBundle::from_json(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(restored.items, bundle.items);
        assert_eq!(restored.workspace, ws);
    }
}
