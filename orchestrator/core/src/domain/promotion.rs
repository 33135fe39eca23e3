// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Promotion Domain Model
//!
//! A promotion run is a finite state machine over two adjacent stages:
//!
//! ```text
//! Resolving -> Exporting -> Transforming -> Importing -> Verifying
//!                                                        |      \
//!                                                   Committed   Failed
//! ```
//!
//! The remote service has no multi-item transactional rollback, so a run's
//! outcome is a *set of independent per-item results*, never a single
//! boolean. Callers must inspect the set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::item::{ItemFailure, ItemKey};
use crate::domain::workspace::Stage;

// ============================================================================
// Run state machine
// ============================================================================

/// States of a promotion run. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Resolving,
    Exporting,
    Transforming,
    Importing,
    Verifying,
    Committed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Committed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Resolving => "resolving",
            RunState::Exporting => "exporting",
            RunState::Transforming => "transforming",
            RunState::Importing => "importing",
            RunState::Verifying => "verifying",
            RunState::Committed => "committed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Phase in which an item outcome was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionPhase {
    Export,
    Import,
    Verify,
}

impl std::fmt::Display for PromotionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PromotionPhase::Export => "export",
            PromotionPhase::Import => "import",
            PromotionPhase::Verify => "verify",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Per-item outcomes
// ============================================================================

/// Outcome of a single item in a single phase of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub key: ItemKey,
    pub phase: PromotionPhase,
    /// `None` is success; `Some` carries the item-scoped failure.
    pub failure: Option<ItemFailure>,
}

impl ItemOutcome {
    pub fn ok(key: ItemKey, phase: PromotionPhase) -> Self {
        Self {
            key,
            phase,
            failure: None,
        }
    }

    pub fn failed(key: ItemKey, phase: PromotionPhase, failure: ItemFailure) -> Self {
        Self {
            key,
            phase,
            failure: Some(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

// ============================================================================
// Promotion record
// ============================================================================

/// Report of one promotion run. Ephemeral: produced per run, never persisted
/// remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub source: Stage,
    pub target: Stage,
    pub run_state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ItemOutcome>,
    /// Run-fatal fault that put the machine into `Failed`, when one occurred
    /// after remote mutation had begun.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PromotionRecord {
    /// Items for which an import was attempted.
    pub fn items_attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.phase == PromotionPhase::Import)
            .count()
    }

    /// Items that imported and verified cleanly.
    pub fn items_succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.phase == PromotionPhase::Import && o.is_ok())
            .filter(|o| {
                !self.outcomes.iter().any(|v| {
                    v.phase == PromotionPhase::Verify && v.key == o.key && !v.is_ok()
                })
            })
            .count()
    }

    /// Every recorded failure, across all phases.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::ItemType;

    fn record(outcomes: Vec<ItemOutcome>) -> PromotionRecord {
        PromotionRecord {
            source: Stage::Dev,
            target: Stage::Test,
            run_state: RunState::Committed,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes,
            error: None,
        }
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Committed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Verifying.is_terminal());
    }

    #[test]
    fn accounting_counts_import_phase_only() {
        let nb = ItemKey::new("a", ItemType::Notebook);
        let pl = ItemKey::new("b", ItemType::DataPipeline);
        let rec = record(vec![
            ItemOutcome::ok(nb.clone(), PromotionPhase::Export),
            ItemOutcome::ok(nb.clone(), PromotionPhase::Import),
            ItemOutcome::ok(pl.clone(), PromotionPhase::Import),
            ItemOutcome::failed(pl.clone(), PromotionPhase::Verify, ItemFailure::VerifyMismatch),
        ]);

        assert_eq!(rec.items_attempted(), 2);
        // The pipeline imported but failed verification, so only the notebook
        // counts as succeeded.
        assert_eq!(rec.items_succeeded(), 1);
        assert!(rec.has_failures());
    }

    #[test]
    fn clean_record_has_no_failures() {
        let nb = ItemKey::new("a", ItemType::Notebook);
        let rec = record(vec![ItemOutcome::ok(nb, PromotionPhase::Import)]);
        assert!(!rec.has_failures());
        assert_eq!(rec.items_succeeded(), 1);
    }
}
