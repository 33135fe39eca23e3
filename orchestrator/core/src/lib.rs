// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0
//! Stagehand Core
//!
//! Deployment orchestration for staged analytics workspaces.
//!
//! # Architecture
//!
//! - **domain** — workspaces, items, promotion records, cleanup reports,
//!   and the [`domain::remote::RemoteGateway`] trait
//! - **application** — the registry, item store, promotion engine,
//!   identity provisioner, and cleanup coordinator
//! - **infrastructure** — HTTP gateway, auth, git, config loading, and
//!   the retry/poll primitives

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::EngineError;
