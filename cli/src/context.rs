// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Engine wiring for CLI commands
//!
//! Builds the remote gateway, credential provider, and environment registry
//! from the loaded configuration. Commands that operate on bound stages call
//! [`EngineContext::bind_existing`] first; `bind` manages its stage itself.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stagehand_core::application::{
    CleanupCoordinator, EnvironmentRegistry, IdentityProvisioner, ItemDefinitionStore,
    PromotionEngine,
};
use stagehand_core::domain::remote::RemoteGateway;
use stagehand_core::infrastructure::auth::{
    ClientSecretTokenProvider, CredentialMode, StaticTokenProvider, TokenProvider,
};
use stagehand_core::infrastructure::config_loader::{load_config, AuthConfig, OrchestratorConfig};
use stagehand_core::infrastructure::git::{GitCollaborator, HttpGitCollaborator};
use stagehand_core::infrastructure::HttpRemoteGateway;

/// Environment variable holding the delegated bearer token in
/// user-delegated mode.
const DELEGATED_TOKEN_ENV: &str = "STAGEHAND_ACCESS_TOKEN";

pub struct EngineContext {
    pub config: OrchestratorConfig,
    gateway: Arc<HttpRemoteGateway>,
    pub registry: Arc<EnvironmentRegistry>,
    pub cancel: CancellationToken,
}

impl EngineContext {
    pub async fn build(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path).context("failed to load configuration")?;
        let tokens = token_provider(&config.auth)?;

        let cancel = CancellationToken::new();
        let gateway = Arc::new(
            HttpRemoteGateway::new(&config.api.base_url, Arc::clone(&tokens), &config.api.scope)
                .with_retry(config.retry)
                .with_cancellation(cancel.clone()),
        );

        let git: Option<Arc<dyn GitCollaborator>> = config.git.as_ref().map(|g| {
            Arc::new(HttpGitCollaborator::new(
                &g.base_url,
                &g.organization,
                Arc::clone(&tokens),
                &g.scope,
            )
            .with_retry(config.retry)) as Arc<dyn GitCollaborator>
        });

        let registry = Arc::new(EnvironmentRegistry::new(config.stages.clone(), git));

        // Ctrl-C cancels in-flight retries and polls.
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling in-flight work");
                ctrl_c_cancel.cancel();
            }
        });

        Ok(Self {
            config,
            gateway,
            registry,
            cancel,
        })
    }

    pub fn remote(&self) -> Arc<dyn RemoteGateway> {
        self.gateway.clone()
    }

    /// Bind every configured stage whose workspace already exists remotely.
    /// Stages without a remote workspace stay unbound and resolve to
    /// `UnknownStage` later.
    pub async fn bind_existing(&self) -> Result<()> {
        for (stage, settings) in self.config.stages.clone() {
            match self.gateway.find_workspace_by_name(&settings.workspace).await? {
                Some(workspace) => {
                    debug!(%stage, workspace = %settings.workspace, "binding stage");
                    self.registry.bind(stage, workspace).await?;
                }
                None => {
                    warn!(%stage, workspace = %settings.workspace, "workspace not found, stage left unbound");
                }
            }
        }
        Ok(())
    }

    pub fn promotion_engine(&self) -> PromotionEngine {
        let store = ItemDefinitionStore::new(self.remote())
            .with_max_in_flight(self.config.promotion.max_in_flight);
        PromotionEngine::new(Arc::clone(&self.registry), Arc::new(store), self.remote())
            .with_empty_export_policy(self.config.promotion.empty_export_policy)
            .with_run_timeout(self.config.promotion.run_timeout)
    }

    pub fn item_store(&self) -> ItemDefinitionStore {
        ItemDefinitionStore::new(self.remote())
            .with_max_in_flight(self.config.promotion.max_in_flight)
    }

    pub fn identity_provisioner(&self) -> IdentityProvisioner {
        IdentityProvisioner::new(self.remote()).with_budget(self.config.poll)
    }

    pub fn cleanup_coordinator(&self) -> CleanupCoordinator {
        CleanupCoordinator::new(self.remote(), Arc::clone(&self.registry))
    }
}

fn token_provider(auth: &AuthConfig) -> Result<Arc<dyn TokenProvider>> {
    match auth.mode {
        CredentialMode::ServicePrincipal => {
            let secret = std::env::var(&auth.client_secret_env).with_context(|| {
                format!(
                    "client secret environment variable '{}' is not set",
                    auth.client_secret_env
                )
            })?;
            Ok(Arc::new(ClientSecretTokenProvider::new(
                &auth.token_url,
                &auth.client_id,
                secret,
                auth.mode,
            )))
        }
        CredentialMode::UserDelegated => {
            let token = std::env::var(DELEGATED_TOKEN_ENV).unwrap_or_default();
            Ok(Arc::new(StaticTokenProvider::new(token)))
        }
    }
}
