// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Configuration Loader
//!
//! Reads the stage-scoped orchestrator configuration (`stagehand.yaml`):
//! remote API endpoint, authentication, retry/poll tuning, and one
//! `StageSettings` record per pipeline stage (workspace name, environment
//! tag, capacity, parameter overrides, optional git integration).
//!
//! Secrets are never stored in the file; the auth section names the
//! environment variable holding the client secret.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::workspace::{GitBinding, Stage};
use crate::error::EngineError;
use crate::infrastructure::auth::CredentialMode;
use crate::infrastructure::retry::{PollBudget, RetryPolicy};

const DEFAULT_CONFIG_FILE: &str = "stagehand.yaml";

// ============================================================================
// Schema
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token_url: String,
    pub client_id: String,
    /// Name of the environment variable carrying the client secret.
    pub client_secret_env: String,
    #[serde(default = "default_mode")]
    pub mode: CredentialMode,
}

fn default_mode() -> CredentialMode {
    CredentialMode::ServicePrincipal
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    pub base_url: String,
    pub organization: String,
    pub scope: String,
}

/// What a zero-item export means for a promotion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyExportPolicy {
    /// Treat as a transient fault and abort the run. Default: an empty
    /// managed workspace is far rarer than a flaky export.
    #[default]
    Fail,
    /// Accept the empty set and commit a run with zero items.
    AllowEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default)]
    pub empty_export_policy: EmptyExportPolicy,
    #[serde(default, with = "humantime_serde::option")]
    pub run_timeout: Option<Duration>,
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            empty_export_policy: EmptyExportPolicy::default(),
            run_timeout: None,
        }
    }
}

/// Per-stage settings keyed by stage name in the `stages` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSettings {
    /// Display name of the workspace bound to this stage.
    pub workspace: String,
    /// Tag recorded on remote resources; cleanup matches against it.
    pub environment_tag: String,
    #[serde(default)]
    pub capacity: Option<Uuid>,
    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub git: Option<GitBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub git: Option<GitConfig>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub poll: PollBudget,
    #[serde(default)]
    pub promotion: PromotionConfig,
    pub stages: BTreeMap<Stage, StageSettings>,
}

impl OrchestratorConfig {
    pub fn stage(&self, stage: Stage) -> Result<&StageSettings, EngineError> {
        self.stages
            .get(&stage)
            .ok_or_else(|| EngineError::UnknownStage(stage.to_string()))
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.api.base_url.is_empty() {
            return Err(EngineError::InvalidConfig("api.base_url is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.promotion.max_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "promotion.max_in_flight must be at least 1".into(),
            ));
        }
        for (stage, settings) in &self.stages {
            if !stage.is_managed() {
                return Err(EngineError::InvalidConfig(format!(
                    "stage table must not contain '{stage}'"
                )));
            }
            if settings.workspace.is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "stage '{stage}' has an empty workspace name"
                )));
            }
            if let Some(git) = &settings.git {
                if git.branch.is_empty() {
                    return Err(EngineError::InvalidConfig(format!(
                        "stage '{stage}' declares git integration without a branch"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load configuration from `path`, or discover `stagehand.yaml` in the
/// current directory when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig, EngineError> {
    let path: PathBuf = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        EngineError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
    })?;
    let config: OrchestratorConfig = serde_yaml::from_str(&raw)
        .map_err(|e| EngineError::InvalidConfig(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
api:
  base_url: https://api.northlake.example
  scope: https://api.northlake.example/.default
auth:
  token_url: https://login.example/oauth2/token
  client_id: 11111111-2222-3333-4444-555555555555
  client_secret_env: STAGEHAND_CLIENT_SECRET
  mode: service-principal
retry:
  max_attempts: 5
  base_delay: 400ms
  max_delay: 30s
poll:
  timeout: 10m
  interval: 5s
promotion:
  max_in_flight: 4
  empty_export_policy: fail
  run_timeout: 30m
stages:
  dev:
    workspace: proj-dev
    environment_tag: dev
    parameter_overrides:
      DB_ENDPOINT: dev-db.example
  test:
    workspace: proj-test
    environment_tag: test
    parameter_overrides:
      DB_ENDPOINT: test-db.example
    git:
      repository: analytics
      branch: test
  prod:
    workspace: proj-prod
    environment_tag: prod
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn sample_config_round_trips() {
        let file = write_config(SAMPLE);
        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(400));
        assert_eq!(config.poll.timeout, Duration::from_secs(600));
        assert_eq!(
            config.promotion.run_timeout,
            Some(Duration::from_secs(1800))
        );
        assert_eq!(config.promotion.empty_export_policy, EmptyExportPolicy::Fail);

        let test = config.stage(Stage::Test).unwrap();
        assert_eq!(test.workspace, "proj-test");
        assert_eq!(
            test.parameter_overrides.get("DB_ENDPOINT").unwrap(),
            "test-db.example"
        );
        assert_eq!(test.git.as_ref().unwrap().branch, "test");
        assert!(config.stage(Stage::Prod).is_ok());
    }

    #[test]
    fn unmanaged_stage_entries_are_rejected() {
        let bad = SAMPLE.replace("  prod:", "  unmanaged:");
        let file = write_config(&bad);
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn missing_file_is_invalid_config() {
        let err = load_config(Some(Path::new("/nonexistent/stagehand.yaml"))).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_stage_lookup_fails() {
        let file = write_config(SAMPLE);
        let mut config = load_config(Some(file.path())).unwrap();
        config.stages.remove(&Stage::Prod);
        assert!(matches!(
            config.stage(Stage::Prod),
            Err(EngineError::UnknownStage(_))
        ));
    }
}
