//! Structural renames of top-level project directories.
//!
//! When the destination does not exist the whole directory moves with one
//! `rename(2)`. When it already exists (for example after a half-manual
//! upgrade) the entries are moved one rename at a time; names that already
//! exist in the destination are left where they are and reported, and the
//! source directory is only removed once it is empty. A metadata file found
//! on both sides of a control-directory rename is not a conflict: the legacy
//! history is folded into the current file before the legacy copy goes.

use std::ffi::OsString;
use std::path::Path;

use kitty_core::KittyError;

use crate::fsutil::{atomic_write, dangling_symlinks, entry_exists, sorted_entries};
use crate::layout::{CONTROL_DIR, LEGACY_CONTROL_DIR, LEGACY_SPECS_DIR, SPECS_DIR};
use crate::metadata::read_metadata;
use crate::migration::{Migration, MigrationContext, MigrationResult};
use crate::version::Version;

/// Renames a root-level directory from a legacy name to its current name.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryRename {
    id: &'static str,
    target: Version,
    description: &'static str,
    from: &'static str,
    to: &'static str,
    requires_control_dir: bool,
    holds_metadata: bool,
}

impl DirectoryRename {
    /// `.specify/` becomes `.kittify/`.
    pub const fn control_dir() -> Self {
        Self {
            id: "0.2.0_specify_to_kittify",
            target: Version::new(0, 2, 0),
            description: "Rename the .specify control directory to .kittify",
            from: LEGACY_CONTROL_DIR,
            to: CONTROL_DIR,
            requires_control_dir: false,
            holds_metadata: true,
        }
    }

    /// `specs/` becomes `kitty-specs/`.
    ///
    /// Only kitty projects are touched; a `specs/` directory in an unrelated
    /// repository is left alone.
    pub const fn specs_dir() -> Self {
        Self {
            id: "0.3.0_specs_to_kitty_specs",
            target: Version::new(0, 3, 0),
            description: "Rename the specs directory to kitty-specs",
            from: LEGACY_SPECS_DIR,
            to: SPECS_DIR,
            requires_control_dir: true,
            holds_metadata: false,
        }
    }

    fn merge_into_existing(
        &self,
        from: &Path,
        to: &Path,
        metadata_file_name: &str,
        dry_run: bool,
        result: &mut MigrationResult,
    ) {
        let entries = match sorted_entries(from) {
            Ok(entries) => entries,
            Err(e) => {
                result.add_error(format!("Cannot read {}: {e}", from.display()));
                return;
            }
        };

        let mut conflicts: Vec<OsString> = Vec::new();
        for src in entries {
            let Some(name) = src.file_name().map(ToOwned::to_owned) else {
                continue;
            };
            let dest = to.join(&name);
            if entry_exists(&dest) {
                if self.holds_metadata && name == metadata_file_name {
                    if !dry_run {
                        if let Err(e) = fold_metadata(&src, &dest) {
                            result.add_error(format!(
                                "Cannot merge {} into {}: {e}",
                                src.display(),
                                dest.display()
                            ));
                            return;
                        }
                    }
                    result.add_changed(dest);
                    continue;
                }
                conflicts.push(name);
                continue;
            }
            if !dry_run {
                if let Err(e) = std::fs::rename(&src, &dest) {
                    result.add_error(format!(
                        "Failed to move {} to {}: {e} ({} entries already moved)",
                        src.display(),
                        dest.display(),
                        result.changed_count()
                    ));
                    return;
                }
            }
            result.add_changed(dest);
        }

        if !conflicts.is_empty() {
            let names: Vec<_> = conflicts.iter().map(|n| n.to_string_lossy()).collect();
            result.add_error(format!(
                "{} already contains {}; left in {} for manual resolution",
                to.display(),
                names.join(", "),
                from.display()
            ));
            return;
        }

        if !dry_run {
            if let Err(e) = std::fs::remove_dir(from) {
                result.add_error(format!(
                    "Moved all entries but could not remove {}: {e}",
                    from.display()
                ));
                return;
            }
        }
        result.add_changed(from);
    }
}

/// Writes the legacy history into the current metadata file, then removes
/// the legacy file.
fn fold_metadata(legacy: &Path, current: &Path) -> Result<(), KittyError> {
    let Some(older) = read_metadata(legacy)? else {
        return Ok(());
    };
    let merged = match read_metadata(current)? {
        Some(mut newer) => {
            newer.absorb(older);
            newer
        }
        None => older,
    };
    atomic_write(current, &merged.to_bytes()?)?;
    std::fs::remove_file(legacy)?;
    Ok(())
}

impl Migration for DirectoryRename {
    fn migration_id(&self) -> &str {
        self.id
    }

    fn target_version(&self) -> Version {
        self.target
    }

    fn description(&self) -> &str {
        self.description
    }

    fn detect(&self, ctx: &MigrationContext<'_>) -> bool {
        if self.requires_control_dir && !ctx.layout.has_control_dir() {
            return false;
        }
        ctx.layout.path(self.from).is_dir()
    }

    fn apply(&self, ctx: &MigrationContext<'_>, dry_run: bool) -> MigrationResult {
        let from = ctx.layout.path(self.from);
        let to = ctx.layout.path(self.to);
        let mut result = MigrationResult::success();

        if !self.detect(ctx) {
            return result;
        }

        if !entry_exists(&to) {
            if !dry_run {
                if let Err(e) = std::fs::rename(&from, &to) {
                    return MigrationResult::failure(format!(
                        "Failed to rename {} to {}: {e}",
                        from.display(),
                        to.display()
                    ));
                }
            }
            result.add_changed(&to);
        } else if to.is_dir() {
            self.merge_into_existing(
                &from,
                &to,
                ctx.layout.metadata_file_name(),
                dry_run,
                &mut result,
            );
        } else {
            return MigrationResult::failure(format!(
                "Cannot rename {}: {} exists and is not a directory",
                from.display(),
                to.display()
            ));
        }

        if result.success && !dry_run {
            // Links into the old path are tolerated, not rewritten.
            for link in dangling_symlinks(&to) {
                tracing::warn!(
                    migration = self.id,
                    link = %link.display(),
                    "Symlink no longer resolves after rename"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NoAssets;
    use crate::layout::ProjectLayout;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_control_dir_rename_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".specify/memory/constitution.md", "# Rules\n");
        write(dir.path(), ".specify/templates/spec.md", "template");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);
        let migration = DirectoryRename::control_dir();

        assert!(migration.detect(&ctx));
        let result = migration.apply(&ctx, false);
        assert!(result.success, "{:?}", result.errors);
        assert!(!dir.path().join(".specify").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/memory/constitution.md")).unwrap(),
            "# Rules\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/templates/spec.md")).unwrap(),
            "template"
        );
        assert!(!migration.detect(&ctx));
    }

    #[test]
    fn test_dry_run_leaves_tree_alone() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".specify/a.txt", "a");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, true);
        assert!(result.success);
        assert!(result
            .changed_paths
            .as_ref()
            .unwrap()
            .contains(&dir.path().join(".kittify")));
        assert!(dir.path().join(".specify/a.txt").exists());
        assert!(!dir.path().join(".kittify").exists());
    }

    #[test]
    fn test_specs_rename_requires_control_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "specs/readme.md", "not ours");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);
        assert!(!DirectoryRename::specs_dir().detect(&ctx));

        std::fs::create_dir(dir.path().join(".kittify")).unwrap();
        assert!(DirectoryRename::specs_dir().detect(&ctx));
    }

    #[test]
    fn test_merge_into_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".kittify/metadata.json", "{}");
        write(dir.path(), ".specify/memory/notes.md", "notes");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(result.success, "{:?}", result.errors);
        assert!(!dir.path().join(".specify").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/memory/notes.md")).unwrap(),
            "notes"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/metadata.json")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_metadata_on_both_sides_is_merged_not_conflicting() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".specify/metadata.json",
            r#"{"version": "0.1.0", "initialized_at": "2023-01-01T00:00:00Z",
                "applied_migrations": [{"id": "0.0.5_old_step", "status": "success", "timestamp": "2023-01-02T00:00:00Z"}]}"#,
        );
        write(
            dir.path(),
            ".kittify/metadata.json",
            r#"{"version": "0.2.0", "initialized_at": "2024-01-01T00:00:00Z"}"#,
        );
        write(dir.path(), ".specify/memory/notes.md", "notes");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(result.success, "{:?}", result.errors);
        assert!(!dir.path().join(".specify").exists());

        let merged = read_metadata(&dir.path().join(".kittify/metadata.json"))
            .unwrap()
            .unwrap();
        assert_eq!(merged.succeeded_ids(), vec!["0.0.5_old_step"]);
        assert_eq!(merged.version, Version::new(0, 2, 0));
        assert_eq!(merged.initialized_at.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_corrupt_legacy_metadata_blocks_the_merge() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".specify/metadata.json", "{ broken");
        write(
            dir.path(),
            ".kittify/metadata.json",
            r#"{"version": "0.2.0", "initialized_at": "2024-01-01T00:00:00Z"}"#,
        );
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(!result.success);
        assert!(result.errors[0].contains("metadata.json"));
        assert!(dir.path().join(".specify/metadata.json").exists());
    }

    #[test]
    fn test_merge_conflict_reports_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".kittify/config.json", "new");
        write(dir.path(), ".specify/config.json", "old");
        write(dir.path(), ".specify/extra.md", "extra");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(!result.success);
        assert!(result.errors[0].contains("config.json"));
        // The non-conflicting entry moved; the conflicting one stayed put.
        assert!(result
            .changed_paths
            .as_ref()
            .unwrap()
            .contains(&dir.path().join(".kittify/extra.md")));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".specify/config.json")).unwrap(),
            "old"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/config.json")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_destination_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".specify/a.txt", "a");
        write(dir.path(), ".kittify", "oops");
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(!result.success);
        assert!(dir.path().join(".specify/a.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_symlinks_survive_rename() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".specify/templates/plan.md", "plan");
        std::os::unix::fs::symlink("templates/plan.md", dir.path().join(".specify/plan.md"))
            .unwrap();
        let layout = ProjectLayout::new(dir.path());
        let ctx = MigrationContext::new(&layout, &NoAssets);

        let result = DirectoryRename::control_dir().apply(&ctx, false);
        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".kittify/plan.md")).unwrap(),
            "plan"
        );
    }
}
