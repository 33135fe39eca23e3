// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! `stagehand export` - write a stage's item bundle to a file or stdout

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::commands::parse_stage;
use crate::context::EngineContext;
use crate::output::{bundle_outcome, ExitOutcome, OutputFormat};

#[derive(Args)]
pub struct ExportArgs {
    /// Stage whose workspace is exported
    #[arg(long, value_name = "STAGE")]
    pub stage: String,

    /// Write the bundle to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub async fn handle_command(
    args: ExportArgs,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitOutcome> {
    let stage = parse_stage(&args.stage)?;

    let ctx = EngineContext::build(config_path.as_deref()).await?;
    ctx.bind_existing().await?;

    let workspace = ctx.registry.resolve(stage)?;
    info!(%stage, workspace = %workspace.id, "exporting items");
    let bundle = ctx.item_store().export(workspace.id).await?;
    let json = bundle.to_json()?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("cannot write bundle to {}", path.display()))?;
            if format == OutputFormat::Text {
                println!(
                    "{} {} item(s) written to {}",
                    "exported".green().bold(),
                    bundle.items.len(),
                    path.display()
                );
            }
        }
        None => println!("{json}"),
    }

    for failure in &bundle.failures {
        eprintln!("{} {}", "export failed:".red(), failure.key);
    }
    Ok(bundle_outcome(&bundle))
}
