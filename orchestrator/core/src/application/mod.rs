// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

pub mod cleanup;
pub mod identity;
pub mod promotion;
pub mod registry;
pub mod store;

// Re-export the services for convenience
pub use cleanup::CleanupCoordinator;
pub use identity::IdentityProvisioner;
pub use promotion::PromotionEngine;
pub use registry::EnvironmentRegistry;
pub use store::{ExportBundle, ImportReport, ItemDefinitionStore};
