//! The migration abstraction.
//!
//! A [`Migration`] is one self-contained transformation of a project's
//! on-disk schema to a target [`Version`]. It exposes a cheap `detect`
//! predicate and an `apply` step that honors dry runs, and reports its
//! outcome as a [`MigrationResult`]. Migrations hold no state; everything they
//! need is read from the project through a [`MigrationContext`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::assets::AssetProvider;
use crate::layout::ProjectLayout;
use crate::version::Version;

/// What a migration can see of the project it runs against.
#[derive(Clone, Copy)]
pub struct MigrationContext<'a> {
    /// Path resolution for the project.
    pub layout: &'a ProjectLayout,
    /// Packaged assets for provisioning migrations.
    pub assets: &'a dyn AssetProvider,
}

impl<'a> MigrationContext<'a> {
    /// Creates a context.
    pub fn new(layout: &'a ProjectLayout, assets: &'a dyn AssetProvider) -> Self {
        Self { layout, assets }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }
}

/// The outcome of a single [`Migration::apply`] call.
///
/// `changed_paths` lists what was (or, in a dry run, would be) created, moved
/// or rewritten. A failed result may still carry changed paths when a
/// multi-step migration got partway through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationResult {
    /// Whether the migration completed.
    pub success: bool,
    /// Error messages, in the order they occurred.
    pub errors: Vec<String>,
    /// Paths touched by the migration, when tracked.
    pub changed_paths: Option<BTreeSet<PathBuf>>,
}

impl MigrationResult {
    /// A successful result with no changes recorded yet.
    pub fn success() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            changed_paths: Some(BTreeSet::new()),
        }
    }

    /// A failed result with a single error.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
            changed_paths: Some(BTreeSet::new()),
        }
    }

    /// Records a changed path.
    pub fn add_changed(&mut self, path: impl Into<PathBuf>) {
        self.changed_paths
            .get_or_insert_with(BTreeSet::new)
            .insert(path.into());
    }

    /// Records an error and marks the result as failed.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.success = false;
        self.errors.push(message.into());
    }

    /// Number of changed paths recorded.
    pub fn changed_count(&self) -> usize {
        self.changed_paths.as_ref().map_or(0, BTreeSet::len)
    }
}

/// A single versioned, idempotent project transformation.
///
/// Implementations must keep `detect` free of side effects and must make
/// `detect` return `false` after a successful `apply`. With `dry_run` set,
/// `apply` reports the intended changes without touching the filesystem.
pub trait Migration: Send + Sync {
    /// Unique id: the target version followed by a slug, e.g.
    /// `0.2.0_specify_to_kittify`.
    fn migration_id(&self) -> &str;

    /// The schema version this migration brings a project to.
    fn target_version(&self) -> Version;

    /// A human-readable description.
    fn description(&self) -> &str;

    /// Returns `true` if applying would change the project.
    fn detect(&self, ctx: &MigrationContext<'_>) -> bool;

    /// Performs (or, with `dry_run`, simulates) the transformation.
    fn apply(&self, ctx: &MigrationContext<'_>, dry_run: bool) -> MigrationResult;
}

impl std::fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.migration_id())
            .field("target_version", &self.target_version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_success_has_empty_changes() {
        let result = MigrationResult::success();
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.changed_count(), 0);
    }

    #[test]
    fn test_result_failure() {
        let result = MigrationResult::failure("boom");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_add_error_flips_success() {
        let mut result = MigrationResult::success();
        result.add_changed("/p/a");
        result.add_error("second step failed");
        assert!(!result.success);
        assert_eq!(result.changed_count(), 1);
    }

    #[test]
    fn test_add_changed_initializes_untracked_set() {
        let mut result = MigrationResult {
            success: true,
            errors: Vec::new(),
            changed_paths: None,
        };
        result.add_changed("/p/a");
        result.add_changed("/p/a");
        assert_eq!(result.changed_count(), 1);
    }
}
