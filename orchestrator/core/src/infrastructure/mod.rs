// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Infrastructure Layer
//!
//! Concrete adapters behind the domain's trait seams: the HTTP gateway, the
//! in-memory gateway, token providers, the git collaborator, configuration
//! loading, and the shared retry/poll primitive.

pub mod auth;
pub mod config_loader;
pub mod gateway;
pub mod git;
pub mod memory;
pub mod retry;

pub use gateway::{wait_operation, HttpRemoteGateway};
pub use memory::InMemoryGateway;
