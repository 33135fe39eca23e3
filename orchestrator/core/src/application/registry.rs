// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Environment Registry (Application Service)
//!
//! The single source of truth for the stage -> workspace mapping. Other
//! components query it and never cache workspace identity on their own.
//!
//! Resolution is a pure lookup: it never triggers remote creation (that is
//! the Promotion Engine's responsibility). Binding is caller-synchronized;
//! no component mutates bindings concurrently with a running promotion.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::domain::workspace::{Stage, StageBinding, Workspace};
use crate::error::EngineError;
use crate::infrastructure::config_loader::StageSettings;
use crate::infrastructure::git::GitCollaborator;

pub struct EnvironmentRegistry {
    settings: BTreeMap<Stage, StageSettings>,
    bindings: RwLock<BTreeMap<Stage, (Workspace, StageBinding)>>,
    git: Option<Arc<dyn GitCollaborator>>,
}

impl EnvironmentRegistry {
    pub fn new(
        settings: BTreeMap<Stage, StageSettings>,
        git: Option<Arc<dyn GitCollaborator>>,
    ) -> Self {
        Self {
            settings,
            bindings: RwLock::new(BTreeMap::new()),
            git,
        }
    }

    /// Stage-scoped configuration, independent of whether the stage is bound.
    pub fn settings(&self, stage: Stage) -> Result<&StageSettings, EngineError> {
        self.settings
            .get(&stage)
            .ok_or_else(|| EngineError::UnknownStage(stage.to_string()))
    }

    /// Resolve a stage to its bound workspace. Pure lookup.
    pub fn resolve(&self, stage: Stage) -> Result<Workspace, EngineError> {
        self.bindings
            .read()
            .get(&stage)
            .map(|(workspace, _)| workspace.clone())
            .ok_or_else(|| EngineError::UnknownStage(stage.to_string()))
    }

    /// The stage's binding record (overrides, git integration).
    pub fn binding(&self, stage: Stage) -> Result<StageBinding, EngineError> {
        self.bindings
            .read()
            .get(&stage)
            .map(|(_, binding)| binding.clone())
            .ok_or_else(|| EngineError::UnknownStage(stage.to_string()))
    }

    /// Bind `workspace` to `stage`, provisioning the stage branch when the
    /// stage declares git integration.
    ///
    /// Fails with [`EngineError::StageAlreadyBound`] when a binding already
    /// exists, preventing accidental double-provisioning.
    pub async fn bind(&self, stage: Stage, workspace: Workspace) -> Result<(), EngineError> {
        let settings = self.settings(stage)?.clone();
        if let Some((existing, _)) = self.bindings.read().get(&stage) {
            return Err(EngineError::StageAlreadyBound {
                stage: stage.to_string(),
                workspace: existing.id,
            });
        }

        if let (Some(git), Some(integration)) = (self.git.as_ref(), settings.git.as_ref()) {
            // An already-existing branch is fine; binding must be idempotent
            // across partially provisioned repositories.
            match git
                .create_branch(&integration.repository, &integration.branch)
                .await
            {
                Ok(()) | Err(EngineError::RemoteRejected { status: 409, .. }) => {}
                Err(other) => return Err(other),
            }
            git.set_default_branch(&integration.repository, &integration.branch)
                .await?;
        }

        let mut workspace = workspace;
        workspace.stage = stage;
        workspace.environment_tag = Some(settings.environment_tag.clone());
        let binding = StageBinding {
            stage,
            workspace_id: workspace.id,
            git: settings.git.clone(),
            parameter_overrides: settings.parameter_overrides.clone(),
        };
        info!(%stage, workspace = %workspace.id, name = %workspace.name, "stage bound");
        self.bindings
            .write()
            .insert(stage, (workspace, binding));
        Ok(())
    }

    /// Whether a cleanup tag resolves to any production stage. Used as the
    /// non-bypassable guard before destructive operations.
    pub fn tag_is_production(&self, tag: &str) -> bool {
        if matches!(Stage::parse(tag), Ok(s) if s.is_production()) {
            return true;
        }
        self.settings
            .iter()
            .any(|(stage, s)| stage.is_production() && s.environment_tag == tag)
    }

    pub fn bound_stages(&self) -> Vec<Stage> {
        self.bindings.read().keys().copied().collect()
    }
}
