// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! `stagehand bind` - attach a remote workspace to a pipeline stage
//!
//! Creates the workspace when it does not exist yet (on the stage's
//! configured capacity), registers the binding, and only then stamps the
//! environment tag on the remote resource. A bind that is refused (stage
//! already bound, git provisioning fault) must leave the remote workspace
//! untouched.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use stagehand_core::application::EnvironmentRegistry;
use stagehand_core::domain::remote::RemoteGateway;
use stagehand_core::domain::workspace::{CapacityId, Stage, Workspace};
use stagehand_core::infrastructure::config_loader::StageSettings;
use stagehand_core::EngineError;

use crate::commands::parse_stage;
use crate::context::EngineContext;
use crate::output::{ExitOutcome, OutputFormat};

#[derive(Args)]
pub struct BindArgs {
    /// Stage to bind
    #[arg(long, value_name = "STAGE")]
    pub stage: String,

    /// Workspace name (defaults to the stage's configured workspace)
    #[arg(long, value_name = "NAME")]
    pub workspace: Option<String>,
}

pub async fn handle_command(
    args: BindArgs,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitOutcome> {
    let stage = parse_stage(&args.stage)?;

    let ctx = EngineContext::build(config_path.as_deref()).await?;
    let settings = ctx.config.stage(stage)?.clone();
    let name = args.workspace.unwrap_or_else(|| settings.workspace.clone());
    let gateway = ctx.remote();

    let workspace = bind_stage_workspace(&gateway, &ctx.registry, stage, &settings, &name).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&workspace)?);
    } else {
        println!(
            "{} stage {} bound to workspace {} ({})",
            "ok:".green().bold(),
            stage,
            workspace.name,
            workspace.id
        );
    }
    Ok(ExitOutcome::Success)
}

/// Find or create the stage's workspace, bind it, then stamp its environment
/// tag on the remote.
///
/// The registry bind comes first: it is the step that can refuse (already
/// bound, git provisioning failure), and a refused bind must not leave the
/// remote workspace retagged.
pub(crate) async fn bind_stage_workspace(
    gateway: &Arc<dyn RemoteGateway>,
    registry: &EnvironmentRegistry,
    stage: Stage,
    settings: &StageSettings,
    name: &str,
) -> Result<Workspace, EngineError> {
    if let Ok(existing) = registry.resolve(stage) {
        return Err(EngineError::StageAlreadyBound {
            stage: stage.to_string(),
            workspace: existing.id,
        });
    }

    let mut workspace = match gateway.find_workspace_by_name(name).await? {
        Some(existing) => {
            info!(%stage, workspace = %existing.id, "workspace exists");
            existing
        }
        None => {
            let capacity = settings.capacity.map(CapacityId::from_uuid);
            info!(%stage, name = %name, "creating workspace");
            gateway.create_workspace(name, capacity).await?
        }
    };

    workspace.stage = stage;
    workspace.environment_tag = Some(settings.environment_tag.clone());
    registry.bind(stage, workspace.clone()).await?;

    // Persist the stage tag remotely so cleanup can match on it later.
    gateway.update_workspace(&workspace).await?;
    Ok(workspace)
}
