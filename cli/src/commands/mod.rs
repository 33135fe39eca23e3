// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Command implementations for the stagehand CLI

pub mod bind;
pub mod cleanup;
pub mod export;
pub mod identity;
pub mod promote;

pub use self::bind::BindArgs;
pub use self::cleanup::CleanupArgs;
pub use self::export::ExportArgs;
pub use self::identity::IdentityCommand;
pub use self::promote::PromoteArgs;

use anyhow::Result;
use stagehand_core::domain::workspace::Stage;

pub(crate) fn parse_stage(raw: &str) -> Result<Stage> {
    Ok(Stage::parse(raw)?)
}
