// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0
//! Domain Layer
//!
//! Entities, value objects and the Remote Gateway contract for the
//! deployment orchestration engine.

pub mod cleanup;
pub mod item;
pub mod promotion;
pub mod remote;
pub mod workspace;
