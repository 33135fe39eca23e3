// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Identity Provisioner (Application Service)
//!
//! Ensures a workspace has an attached managed identity, idempotently: an
//! existing identity is returned unchanged and no second creation call is
//! ever issued. A fresh provisioning is verified by re-reading the
//! attachment through a bounded poll before it is reported as done.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::remote::RemoteGateway;
use crate::domain::workspace::{ManagedIdentity, WorkspaceId};
use crate::error::EngineError;
use crate::infrastructure::gateway::wait_operation;
use crate::infrastructure::retry::{poll_until, PollBudget};

pub struct IdentityProvisioner {
    gateway: Arc<dyn RemoteGateway>,
    budget: PollBudget,
}

impl IdentityProvisioner {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            gateway,
            budget: PollBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn ensure_identity(
        &self,
        workspace: WorkspaceId,
    ) -> Result<ManagedIdentity, EngineError> {
        if let Some(identity) = self.gateway.get_identity(workspace).await? {
            info!(%workspace, identity = %identity.id, "identity already attached");
            return Ok(identity);
        }

        info!(%workspace, "provisioning managed identity");
        let handle = self.gateway.provision_identity(workspace).await?;
        let cancel = CancellationToken::new();
        wait_operation(
            self.gateway.as_ref(),
            &handle,
            &self.budget,
            &cancel,
            "provision managed identity",
        )
        .await
        .map_err(|err| self.as_provisioning_failure(workspace, err))?;

        // The remote is eventually consistent; the attachment may trail the
        // operation's terminal state.
        let identity = poll_until(&self.budget, &cancel, "verify identity attachment", || async {
            self.gateway.get_identity(workspace).await
        })
        .await
        .map_err(|err| self.as_provisioning_failure(workspace, err))?;

        info!(%workspace, identity = %identity.id, "identity attached and verified");
        Ok(identity)
    }

    fn as_provisioning_failure(&self, workspace: WorkspaceId, err: EngineError) -> EngineError {
        match err {
            EngineError::OperationTimedOut { .. } => {
                EngineError::IdentityProvisioningFailed { workspace }
            }
            other => other,
        }
    }
}
