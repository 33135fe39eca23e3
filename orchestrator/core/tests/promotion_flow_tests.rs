// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! End-to-end promotion runs over the in-memory gateway: a populated dev
//! workspace promoted into test, with parameter rebinding, idempotent
//! re-runs, and partial-failure reporting.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stagehand_core::domain::remote::RemoteGateway;

use stagehand_core::application::{EnvironmentRegistry, ItemDefinitionStore, PromotionEngine};
use stagehand_core::domain::item::{ItemDefinition, ItemKey, ItemType, ParameterBinding};
use stagehand_core::domain::promotion::{PromotionPhase, RunState};
use stagehand_core::domain::workspace::{Stage, Workspace, WorkspaceId};
use stagehand_core::infrastructure::config_loader::{EmptyExportPolicy, StageSettings};
use stagehand_core::infrastructure::InMemoryGateway;
use stagehand_core::EngineError;

fn stage_settings(workspace: &str, tag: &str, overrides: &[(&str, &str)]) -> StageSettings {
    StageSettings {
        workspace: workspace.to_string(),
        environment_tag: tag.to_string(),
        capacity: None,
        parameter_overrides: overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        git: None,
    }
}

fn notebook(name: &str) -> ItemDefinition {
    ItemDefinition::new(
        ItemKey::new(name, ItemType::Notebook),
        json!({ "cells": [{ "source": format!("run {name}") }] }),
    )
}

fn db_connection(name: &str) -> ItemDefinition {
    ItemDefinition::new(
        ItemKey::new(name, ItemType::Connection),
        json!({ "endpoint": "{{param:DB_ENDPOINT}}" }),
    )
    .with_parameter(ParameterBinding {
        name: "DB_ENDPOINT".into(),
        default: Some("dev-db.example".into()),
        required: true,
    })
}

struct Harness {
    gateway: InMemoryGateway,
    registry: Arc<EnvironmentRegistry>,
    dev: WorkspaceId,
    test: WorkspaceId,
}

impl Harness {
    async fn new() -> Self {
        let gateway = InMemoryGateway::new();
        let dev = gateway.insert_workspace(Workspace::new("proj-dev", Stage::Dev));
        let test = gateway.insert_workspace(Workspace::new("proj-test", Stage::Test));

        let mut settings = BTreeMap::new();
        settings.insert(Stage::Dev, stage_settings("proj-dev", "dev", &[]));
        settings.insert(
            Stage::Test,
            stage_settings("proj-test", "test", &[("DB_ENDPOINT", "test-db.example")]),
        );
        let registry = Arc::new(EnvironmentRegistry::new(settings, None));
        let dev_ws = gateway.find_workspace_by_name("proj-dev").await.unwrap().unwrap();
        let test_ws = gateway.find_workspace_by_name("proj-test").await.unwrap().unwrap();
        registry.bind(Stage::Dev, dev_ws).await.unwrap();
        registry.bind(Stage::Test, test_ws).await.unwrap();

        Self {
            gateway,
            registry,
            dev,
            test,
        }
    }

    fn engine(&self) -> PromotionEngine {
        let gateway = Arc::new(self.gateway.clone());
        PromotionEngine::new(
            Arc::clone(&self.registry),
            Arc::new(ItemDefinitionStore::new(gateway.clone())),
            gateway,
        )
    }
}

#[tokio::test]
async fn dev_to_test_rebinds_parameters_and_commits() {
    let h = Harness::new().await;
    for name in ["ingest", "transform", "report"] {
        h.gateway.insert_item(h.dev, notebook(name));
    }
    h.gateway.insert_item(h.dev, db_connection("warehouse"));

    let record = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap();

    assert_eq!(record.run_state, RunState::Committed);
    assert_eq!(record.items_attempted(), 4);
    assert_eq!(record.items_succeeded(), 4);
    assert!(!record.has_failures());

    // The connection's endpoint was rebound to the test override, not the
    // dev-embedded default.
    let promoted = h.gateway.items_of(h.test);
    let connection = promoted
        .iter()
        .find(|i| i.key.item_type == ItemType::Connection)
        .unwrap();
    assert_eq!(connection.payload["endpoint"], "test-db.example");
    // Source items are untouched.
    assert_eq!(h.gateway.items_of(h.dev).len(), 4);
}

#[tokio::test]
async fn repeated_promotion_is_idempotent() {
    let h = Harness::new().await;
    for name in ["ingest", "transform"] {
        h.gateway.insert_item(h.dev, notebook(name));
    }

    let first = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap();
    let second = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap();

    assert_eq!(first.run_state, RunState::Committed);
    assert_eq!(second.run_state, RunState::Committed);
    assert_eq!(h.gateway.items_of(h.test).len(), 2, "re-run must upsert, not duplicate");
}

#[tokio::test]
async fn partial_export_failures_are_reported_not_fatal() {
    let h = Harness::new().await;
    for name in ["ok-1", "ok-2", "broken"] {
        h.gateway.insert_item(h.dev, notebook(name));
    }
    h.gateway
        .fail_item_read(h.dev, ItemKey::new("broken", ItemType::Notebook));

    let record = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap();

    assert_eq!(record.run_state, RunState::Committed);
    assert!(record.has_failures());
    assert_eq!(record.items_succeeded(), 2);
    let export_failures: Vec<_> = record
        .failures()
        .into_iter()
        .filter(|o| o.phase == PromotionPhase::Export)
        .collect();
    assert_eq!(export_failures.len(), 1);
    assert_eq!(export_failures[0].key.name, "broken");
    assert_eq!(h.gateway.items_of(h.test).len(), 2);
}

#[tokio::test]
async fn rejected_import_keeps_the_rest_of_the_run() {
    let h = Harness::new().await;
    for name in ["a", "b", "c"] {
        h.gateway.insert_item(h.dev, notebook(name));
    }
    h.gateway
        .fail_item_write(h.test, ItemKey::new("b", ItemType::Notebook));

    let record = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap();

    assert_eq!(record.run_state, RunState::Committed);
    assert_eq!(record.items_attempted(), 3);
    assert_eq!(record.items_succeeded(), 2);
    assert_eq!(h.gateway.items_of(h.test).len(), 2);
}

#[tokio::test]
async fn unbound_stage_aborts_before_any_mutation() {
    let gateway = InMemoryGateway::new();
    let dev = gateway.insert_workspace(Workspace::new("proj-dev", Stage::Dev));
    gateway.insert_item(dev, notebook("nb"));

    let mut settings = BTreeMap::new();
    settings.insert(Stage::Dev, stage_settings("proj-dev", "dev", &[]));
    settings.insert(Stage::Test, stage_settings("proj-test", "test", &[]));
    let registry = Arc::new(EnvironmentRegistry::new(settings, None));
    let dev_ws = gateway.find_workspace_by_name("proj-dev").await.unwrap().unwrap();
    registry.bind(Stage::Dev, dev_ws).await.unwrap();
    // Test stage is configured but never bound.

    let g = Arc::new(gateway.clone());
    let engine = PromotionEngine::new(
        registry,
        Arc::new(ItemDefinitionStore::new(g.clone())),
        g,
    );
    let err = engine.promote(Stage::Dev, Stage::Test).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownStage(_)));
    assert_eq!(gateway.items_of(dev).len(), 1);
}

#[tokio::test]
async fn timed_out_run_records_every_item_that_landed() {
    let h = Harness::new().await;
    for i in 0..12 {
        h.gateway.insert_item(h.dev, notebook(&format!("nb-{i:02}")));
    }
    h.gateway.set_item_write_delay(Duration::from_millis(30));

    let gateway = Arc::new(h.gateway.clone());
    let engine = PromotionEngine::new(
        Arc::clone(&h.registry),
        Arc::new(ItemDefinitionStore::new(gateway.clone()).with_max_in_flight(1)),
        gateway,
    )
    .with_run_timeout(Some(Duration::from_millis(140)));

    let record = engine.promote(Stage::Dev, Stage::Test).await.unwrap();

    assert_eq!(record.run_state, RunState::Failed);
    assert!(record.error.is_some());
    let landed = h.gateway.items_of(h.test).len();
    assert!(landed >= 1, "some writes finish before the timeout");
    assert!(landed < 12, "the timeout cuts the run short");
    // Every item that landed at the target has its outcome in the record,
    // even though the run was abandoned mid-import.
    assert_eq!(record.items_attempted(), landed);
    assert_eq!(record.items_succeeded(), landed);
}

#[tokio::test]
async fn empty_export_refused_by_default_and_allowed_by_policy() {
    let h = Harness::new().await;

    let err = h.engine().promote(Stage::Dev, Stage::Test).await.unwrap_err();
    assert!(matches!(err, EngineError::ExportFailed { .. }));

    let record = h
        .engine()
        .with_empty_export_policy(EmptyExportPolicy::AllowEmpty)
        .promote(Stage::Dev, Stage::Test)
        .await
        .unwrap();
    assert_eq!(record.run_state, RunState::Committed);
    assert!(record.outcomes.is_empty());
}
