// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! # Stagehand CLI
//!
//! The `stagehand` binary drives workspace promotion across pipeline stages.
//!
//! ## Commands
//!
//! - `stagehand promote --from dev --to test` - run one promotion
//! - `stagehand export --stage dev --out bundle.json` - export an item bundle
//! - `stagehand identity ensure --stage prod` - attach a managed identity
//! - `stagehand cleanup --tag test --yes` - delete non-production resources
//! - `stagehand bind --stage test` - bind a workspace to a stage
//!
//! ## Exit codes
//!
//! `0` full success, `1` partial success (per-item failures in the report),
//! `2` refused or fatal (production guard, unknown stage, auth/config).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod context;
mod output;

use commands::{BindArgs, CleanupArgs, ExportArgs, IdentityCommand, PromoteArgs};
use output::{ExitOutcome, OutputFormat};

/// Stagehand - deployment orchestration for staged analytics workspaces
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery of stagehand.yaml)
    #[arg(
        short,
        long,
        global = true,
        env = "STAGEHAND_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STAGEHAND_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Report format
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Promote items from one stage's workspace into the next
    Promote {
        #[command(flatten)]
        args: PromoteArgs,
    },

    /// Export a stage's items as a portable bundle
    Export {
        #[command(flatten)]
        args: ExportArgs,
    },

    /// Managed identity operations
    Identity {
        #[command(subcommand)]
        command: IdentityCommand,
    },

    /// Delete resources carrying a non-production environment tag
    Cleanup {
        #[command(flatten)]
        args: CleanupArgs,
    },

    /// Bind a remote workspace to a pipeline stage
    Bind {
        #[command(flatten)]
        args: BindArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(ExitOutcome::Refused.code());
    }

    let outcome = match run(cli).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitOutcome::Refused
        }
    };
    std::process::exit(outcome.code());
}

async fn run(cli: Cli) -> Result<ExitOutcome> {
    match cli.command {
        Some(Commands::Promote { args }) => {
            commands::promote::handle_command(args, cli.config, cli.output).await
        }
        Some(Commands::Export { args }) => {
            commands::export::handle_command(args, cli.config, cli.output).await
        }
        Some(Commands::Identity { command }) => {
            commands::identity::handle_command(command, cli.config, cli.output).await
        }
        Some(Commands::Cleanup { args }) => {
            commands::cleanup::handle_command(args, cli.config, cli.output).await
        }
        Some(Commands::Bind { args }) => {
            commands::bind::handle_command(args, cli.config, cli.output).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            Ok(ExitOutcome::Refused)
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
