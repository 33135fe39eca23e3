// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Engine error taxonomy
//!
//! Run-fatal and structural faults live here. Per-item faults (a missing
//! parameter binding, a single rejected import) are **not** `EngineError`s:
//! they are [`crate::domain::item::ItemFailure`] values collected into the
//! run's report, because one bad item must never abort a promotion run.
//!
//! # Propagation policy
//!
//! - Transient remote faults are retried inside the gateway and surface as
//!   `RemoteUnavailable` only after the retry budget is exhausted.
//! - Structural faults (`UnknownStage`, `ProductionDeleteRefused`, ...) abort
//!   before any remote mutation is issued.
//! - Per-item faults are reported, never raised.

use std::time::Duration;

use crate::domain::workspace::WorkspaceId;

/// Fatal and structural errors produced by the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown stage '{0}': no binding exists")]
    UnknownStage(String),

    #[error("stage '{stage}' is already bound to workspace {workspace}")]
    StageAlreadyBound {
        stage: String,
        workspace: WorkspaceId,
    },

    #[error("stage '{0}' is not ready: workspace is unmanaged")]
    StageNotReady(String),

    #[error("remote service unavailable after {attempts} attempts: {reason}")]
    RemoteUnavailable { attempts: u32, reason: String },

    #[error("remote rejected request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("'{operation}' did not reach a terminal state within {timeout:?}")]
    OperationTimedOut {
        operation: String,
        timeout: Duration,
    },

    #[error("export from workspace {workspace} yielded no items")]
    ExportFailed { workspace: WorkspaceId },

    #[error("managed identity attachment not observed on workspace {workspace}")]
    IdentityProvisioningFailed { workspace: WorkspaceId },

    #[error("cleanup tag '{tag}' resolves to a production stage; refusing to delete")]
    ProductionDeleteRefused { tag: String },

    #[error("authentication failed for scope '{scope}': {reason}")]
    AuthenticationFailed { scope: String, reason: String },

    #[error("run cancelled before completion")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the error is a refusal/structural fault that must map to a
    /// distinct process exit code at the CLI boundary.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            EngineError::ProductionDeleteRefused { .. }
                | EngineError::UnknownStage(_)
                | EngineError::StageAlreadyBound { .. }
                | EngineError::AuthenticationFailed { .. }
                | EngineError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_are_classified() {
        assert!(EngineError::ProductionDeleteRefused { tag: "prod".into() }.is_refusal());
        assert!(EngineError::UnknownStage("qa".into()).is_refusal());
        assert!(!EngineError::RemoteUnavailable {
            attempts: 5,
            reason: "503".into()
        }
        .is_refusal());
    }

    #[test]
    fn display_names_the_stage() {
        let err = EngineError::StageNotReady("test".into());
        assert!(err.to_string().contains("'test'"));
    }
}
