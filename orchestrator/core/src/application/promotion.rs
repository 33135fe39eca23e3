// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Promotion Engine (Application Service)
//!
//! Drives one promotion run through its state machine:
//!
//! ```text
//! Resolving -> Exporting -> Transforming -> Importing -> Verifying
//!                                                        -> Committed | Failed
//! ```
//!
//! Items are matched between stages by `(name, type)`; remote ids never
//! cross a stage boundary. Stage-specific parameter values are rebound at
//! import time, target overrides always winning over source-embedded
//! defaults. The remote offers no multi-item rollback, so the run commits a
//! per-item outcome set and never un-applies finished items.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::promotion::{ItemOutcome, PromotionPhase, PromotionRecord, RunState};
use crate::domain::remote::RemoteGateway;
use crate::domain::workspace::{Stage, Workspace};
use crate::error::EngineError;
use crate::application::registry::EnvironmentRegistry;
use crate::application::store::ItemDefinitionStore;
use crate::domain::item::ItemFailure;
use crate::infrastructure::config_loader::EmptyExportPolicy;

pub struct PromotionEngine {
    registry: Arc<EnvironmentRegistry>,
    store: Arc<ItemDefinitionStore>,
    gateway: Arc<dyn RemoteGateway>,
    empty_export_policy: EmptyExportPolicy,
    run_timeout: Option<Duration>,
}

impl PromotionEngine {
    pub fn new(
        registry: Arc<EnvironmentRegistry>,
        store: Arc<ItemDefinitionStore>,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Self {
        Self {
            registry,
            store,
            gateway,
            empty_export_policy: EmptyExportPolicy::default(),
            run_timeout: None,
        }
    }

    pub fn with_empty_export_policy(mut self, policy: EmptyExportPolicy) -> Self {
        self.empty_export_policy = policy;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Run one promotion from `source` to `target`.
    ///
    /// Structural faults (unknown or unmanaged stages) and a refused empty
    /// export abort with an error before any remote mutation. Faults after
    /// mutation has begun terminate the run in `Failed`, with every
    /// already-completed item kept in the record.
    pub async fn promote(
        &self,
        source: Stage,
        target: Stage,
    ) -> Result<PromotionRecord, EngineError> {
        let started_at = Utc::now();
        let mut outcomes: Vec<ItemOutcome> = Vec::new();

        info!(%source, %target, state = %RunState::Resolving, "promotion run started");
        let result = match self.run_timeout {
            Some(timeout) => {
                tokio::select! {
                    res = self.run_phases(source, target, &mut outcomes) => res,
                    _ = tokio::time::sleep(timeout) => {
                        warn!(%source, %target, ?timeout, "promotion run timed out");
                        Err(EngineError::Cancelled)
                    }
                }
            }
            None => self.run_phases(source, target, &mut outcomes).await,
        };

        let (run_state, error) = match result {
            Ok(()) => (RunState::Committed, None),
            Err(err) if pre_mutation_abort(&err) => return Err(err),
            Err(err) => (RunState::Failed, Some(err.to_string())),
        };

        let record = PromotionRecord {
            source,
            target,
            run_state,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            error,
        };
        info!(
            %source, %target, state = %record.run_state,
            attempted = record.items_attempted(),
            succeeded = record.items_succeeded(),
            "promotion run finished"
        );
        Ok(record)
    }

    async fn run_phases(
        &self,
        source: Stage,
        target: Stage,
        outcomes: &mut Vec<ItemOutcome>,
    ) -> Result<(), EngineError> {
        // Resolving
        let source_ws = self.resolve_managed(source)?;
        let target_ws = self.resolve_managed(target)?;

        // Exporting
        info!(%source, state = %RunState::Exporting, workspace = %source_ws.id, "exporting source items");
        let bundle = self.store.export(source_ws.id).await?;
        outcomes.extend(bundle.failures.iter().cloned());
        if bundle.items.is_empty() {
            match self.empty_export_policy {
                EmptyExportPolicy::Fail => {
                    // An empty result is indistinguishable from a transient
                    // fault; refuse to continue unless configured otherwise.
                    return Err(EngineError::ExportFailed {
                        workspace: source_ws.id,
                    });
                }
                EmptyExportPolicy::AllowEmpty => {
                    info!(%source, "source workspace is empty; committing an empty run");
                    return Ok(());
                }
            }
        }

        // Transforming: the target's overrides are the substitution table;
        // source-embedded defaults only apply where the target is silent.
        info!(%target, state = %RunState::Transforming, items = bundle.items.len(), "computing target overrides");
        let overrides = self.registry.binding(target)?.parameter_overrides;

        // Importing. Outcomes are recorded item by item so a run timeout
        // keeps everything that had already landed at the target.
        info!(%target, state = %RunState::Importing, workspace = %target_ws.id, "importing items");
        self.store
            .import_into(target_ws.id, &bundle.items, &overrides, outcomes)
            .await?;

        // Verifying: imports are all terminal here (the import pass joins
        // every in-flight write before returning).
        info!(%target, state = %RunState::Verifying, "verifying target item set");
        let present: HashSet<_> = self
            .gateway
            .list_items(target_ws.id)
            .await?
            .into_iter()
            .collect();
        let verified: Vec<ItemOutcome> = outcomes
            .iter()
            .filter(|o| o.phase == PromotionPhase::Import && o.is_ok())
            .filter(|o| !present.contains(&o.key))
            .map(|o| {
                warn!(item = %o.key, "imported item missing from target listing");
                ItemOutcome::failed(o.key.clone(), PromotionPhase::Verify, ItemFailure::VerifyMismatch)
            })
            .collect();
        outcomes.extend(verified);

        Ok(())
    }

    fn resolve_managed(&self, stage: Stage) -> Result<Workspace, EngineError> {
        let workspace = self.registry.resolve(stage)?;
        if !workspace.stage.is_managed() {
            return Err(EngineError::StageNotReady(stage.to_string()));
        }
        Ok(workspace)
    }
}

/// Errors that abort the run before any remote mutation, surfaced to the
/// caller instead of being folded into a `Failed` record.
fn pre_mutation_abort(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::UnknownStage(_)
            | EngineError::StageNotReady(_)
            | EngineError::ExportFailed { .. }
            | EngineError::InvalidConfig(_)
    )
}
