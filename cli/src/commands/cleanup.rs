// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! `stagehand cleanup` - delete non-production resources by environment tag

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use stagehand_core::domain::cleanup::CleanupScope;

use crate::context::EngineContext;
use crate::output::{render_cleanup, ExitOutcome, OutputFormat};

#[derive(Args)]
pub struct CleanupArgs {
    /// Environment tag whose resources are removed
    #[arg(long, value_name = "TAG")]
    pub tag: String,

    /// List candidates without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Confirm the destructive pass (required unless --dry-run)
    #[arg(long)]
    pub yes: bool,
}

pub async fn handle_command(
    args: CleanupArgs,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitOutcome> {
    if !args.dry_run && !args.yes {
        bail!("cleanup deletes resources; pass --yes to confirm or --dry-run to preview");
    }

    let ctx = EngineContext::build(config_path.as_deref()).await?;
    let scope = CleanupScope::new(&args.tag, args.dry_run);

    info!(tag = %args.tag, dry_run = args.dry_run, "running cleanup");
    let report = ctx.cleanup_coordinator().cleanup(&scope).await?;
    render_cleanup(&report, args.dry_run, format)
}
