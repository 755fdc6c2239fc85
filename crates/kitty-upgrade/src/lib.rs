//! # kitty-upgrade
//!
//! Migration engine for kitty projects. Brings project directories written by
//! older tool versions up to the current layout without losing user content.
//!
//! ## Architecture
//!
//! - [`VersionDetector`] infers a project's schema version from its structure.
//! - [`Migration`] is one idempotent transformation toward a target version.
//! - [`MigrationRegistry`] is the ordered catalog of migrations.
//! - [`ProjectMetadata`] records which migrations have been applied.
//! - [`MigrationRunner`] plans and applies migrations as a resumable chain.
//! - [`upgrade_project`] runs the built-in chain from loaded [`Settings`](kitty_core::Settings).
//!
//! ## Module Overview
//!
//! - [`version`] - `Version`
//! - [`layout`] - `ProjectLayout`, well-known paths and integrations
//! - [`assets`] - `AssetProvider` and its implementations
//! - [`migration`] - `Migration` trait, `MigrationContext`, `MigrationResult`
//! - [`migrations`] - the built-in migrations
//! - [`registry`] - `MigrationRegistry`
//! - [`detector`] - `VersionDetector`
//! - [`metadata`] - `ProjectMetadata`, `MetadataStore`
//! - [`runner`] - `MigrationRunner`, `UpgradeResult`
//! - [`upgrade`] - settings-driven entry point
//! - [`fsutil`] - atomic writes and directory helpers
//!
//! ## Example
//!
//! ```no_run
//! use kitty_upgrade::{MigrationRegistry, MigrationRunner, NoAssets};
//!
//! let registry = MigrationRegistry::builtin().expect("built-in migrations are valid");
//! let runner = MigrationRunner::new("/work/my-project", &registry, &NoAssets);
//! let result = runner
//!     .upgrade(registry.latest_version(), false, false)
//!     .expect("project metadata is readable");
//! for error in &result.errors {
//!     eprintln!("{error}");
//! }
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod assets;
pub mod detector;
pub mod fsutil;
pub mod layout;
pub mod metadata;
pub mod migration;
pub mod migrations;
pub mod registry;
pub mod runner;
pub mod upgrade;
pub mod version;

// Re-export key types at the crate root.
pub use assets::{assets_from_settings, AssetProvider, DirectoryAssets, InMemoryAssets, NoAssets};
pub use detector::VersionDetector;
pub use layout::ProjectLayout;
pub use metadata::{MetadataStore, MigrationRecord, MigrationStatus, ProjectMetadata};
pub use migration::{Migration, MigrationContext, MigrationResult};
pub use registry::MigrationRegistry;
pub use runner::{MigrationRunner, RunnerState, UpgradePlan, UpgradeResult};
pub use upgrade::{load_settings, upgrade_project, UpgradeOptions};
pub use version::Version;
