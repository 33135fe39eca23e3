// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! `stagehand identity` - managed identity operations

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::commands::parse_stage;
use crate::context::EngineContext;
use crate::output::{ExitOutcome, OutputFormat};

#[derive(Subcommand)]
pub enum IdentityCommand {
    /// Ensure the stage's workspace has a managed identity attached
    Ensure {
        /// Stage whose workspace gets the identity
        #[arg(long, value_name = "STAGE")]
        stage: String,
    },
}

pub async fn handle_command(
    command: IdentityCommand,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitOutcome> {
    match command {
        IdentityCommand::Ensure { stage } => {
            let stage = parse_stage(&stage)?;
            let ctx = EngineContext::build(config_path.as_deref()).await?;
            ctx.bind_existing().await?;

            let workspace = ctx.registry.resolve(stage)?;
            let identity = ctx
                .identity_provisioner()
                .ensure_identity(workspace.id)
                .await?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                println!(
                    "{} identity {} attached to workspace {}",
                    "ok:".green().bold(),
                    identity.id,
                    workspace.name
                );
            }
            Ok(ExitOutcome::Success)
        }
    }
}
