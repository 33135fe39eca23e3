// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! `stagehand promote` - run one promotion between adjacent stages

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::commands::parse_stage;
use crate::context::EngineContext;
use crate::output::{render_promotion, ExitOutcome, OutputFormat};

#[derive(Args)]
pub struct PromoteArgs {
    /// Source stage (dev, test, prod)
    #[arg(long = "from", value_name = "STAGE")]
    pub from: String,

    /// Target stage (dev, test, prod)
    #[arg(long = "to", value_name = "STAGE")]
    pub to: String,

    /// Abort the run after this long (e.g. 30m, 90s)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

pub async fn handle_command(
    args: PromoteArgs,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitOutcome> {
    let source = parse_stage(&args.from)?;
    let target = parse_stage(&args.to)?;

    let ctx = EngineContext::build(config_path.as_deref()).await?;
    ctx.bind_existing().await?;

    let mut engine = ctx.promotion_engine();
    if args.timeout.is_some() {
        engine = engine.with_run_timeout(args.timeout);
    }

    info!(%source, %target, "starting promotion");
    let record = engine.promote(source, target).await?;
    render_promotion(&record, format)
}
