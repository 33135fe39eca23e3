// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Report rendering and exit-code mapping
//!
//! Every command resolves to an [`ExitOutcome`]: full success, partial
//! success (some per-item failures in an otherwise committed run), or a
//! refused/fatal condition. `main` maps the outcome to the process exit
//! code, so scripts can distinguish "done", "done with casualties", and
//! "nothing happened".

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;

use stagehand_core::application::ExportBundle;
use stagehand_core::domain::cleanup::CleanupReport;
use stagehand_core::domain::promotion::{PromotionRecord, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored tables.
    Text,
    /// Machine-readable JSON report.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Partial,
    Refused,
}

impl ExitOutcome {
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Partial => 1,
            ExitOutcome::Refused => 2,
        }
    }
}

pub fn render_promotion(record: &PromotionRecord, format: OutputFormat) -> Result<ExitOutcome> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(promotion_outcome(record));
    }

    let state = match record.run_state {
        RunState::Committed => "committed".green().bold(),
        _ => record.run_state.to_string().red().bold(),
    };
    println!(
        "Promotion {} -> {}: {}",
        record.source, record.target, state
    );
    println!(
        "  attempted: {}  succeeded: {}",
        record.items_attempted(),
        record.items_succeeded()
    );
    if let Some(error) = &record.error {
        println!("  {} {error}", "error:".red().bold());
    }
    if !record.outcomes.is_empty() {
        println!();
        println!("  {:<40} {:<8} STATUS", "ITEM", "PHASE");
        for outcome in &record.outcomes {
            let status = match &outcome.failure {
                None => "ok".green().to_string(),
                Some(failure) => format!("{} {failure}", "failed:".red()),
            };
            println!("  {:<40} {:<8} {status}", outcome.key.to_string(), outcome.phase.to_string());
        }
    }
    Ok(promotion_outcome(record))
}

fn promotion_outcome(record: &PromotionRecord) -> ExitOutcome {
    match record.run_state {
        RunState::Committed if !record.has_failures() => ExitOutcome::Success,
        RunState::Committed => ExitOutcome::Partial,
        _ => ExitOutcome::Refused,
    }
}

pub fn render_cleanup(report: &CleanupReport, dry_run: bool, format: OutputFormat) -> Result<ExitOutcome> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        if dry_run {
            println!(
                "{} {} resource(s) would be deleted:",
                "dry run:".yellow().bold(),
                report.candidates.len()
            );
            for candidate in &report.candidates {
                println!("  {:<12} {}", candidate.kind.to_string(), candidate.name);
            }
        } else {
            for deleted in &report.deleted {
                println!("  {} {:<12} {}", "deleted".green(), deleted.kind.to_string(), deleted.name);
            }
            for failure in &report.failures {
                println!(
                    "  {} {:<12} {}: {}",
                    "failed".red(),
                    failure.resource.kind.to_string(),
                    failure.resource.name,
                    failure.reason
                );
            }
        }
    }
    if report.has_failures() {
        Ok(ExitOutcome::Partial)
    } else {
        Ok(ExitOutcome::Success)
    }
}

pub fn bundle_outcome(bundle: &ExportBundle) -> ExitOutcome {
    if bundle.failures.is_empty() {
        ExitOutcome::Success
    } else {
        ExitOutcome::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stagehand_core::domain::item::{ItemFailure, ItemKey, ItemType};
    use stagehand_core::domain::promotion::{ItemOutcome, PromotionPhase};
    use stagehand_core::domain::workspace::Stage;

    fn record(run_state: RunState, outcomes: Vec<ItemOutcome>) -> PromotionRecord {
        PromotionRecord {
            source: Stage::Dev,
            target: Stage::Test,
            run_state,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes,
            error: None,
        }
    }

    #[test]
    fn committed_clean_run_is_success() {
        let rec = record(
            RunState::Committed,
            vec![ItemOutcome::ok(
                ItemKey::new("nb", ItemType::Notebook),
                PromotionPhase::Import,
            )],
        );
        assert_eq!(promotion_outcome(&rec), ExitOutcome::Success);
    }

    #[test]
    fn committed_with_item_failures_is_partial() {
        let rec = record(
            RunState::Committed,
            vec![ItemOutcome::failed(
                ItemKey::new("nb", ItemType::Notebook),
                PromotionPhase::Export,
                ItemFailure::ReadFailed {
                    reason: "boom".into(),
                },
            )],
        );
        assert_eq!(promotion_outcome(&rec), ExitOutcome::Partial);
    }

    #[test]
    fn failed_run_is_refused() {
        let rec = record(RunState::Failed, vec![]);
        assert_eq!(promotion_outcome(&rec), ExitOutcome::Refused);
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ExitOutcome::Success.code(), 0);
        assert_eq!(ExitOutcome::Partial.code(), 1);
        assert_eq!(ExitOutcome::Refused.code(), 2);
    }
}
