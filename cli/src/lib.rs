// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0
//! Stagehand CLI library - exposes testable components

pub mod commands;
pub mod context;
pub mod output;
