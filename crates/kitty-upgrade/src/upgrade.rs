//! Settings-driven upgrades.
//!
//! [`upgrade_project`] wires the pieces an embedding tool would otherwise
//! assemble by hand: the built-in registry, the asset provider named by
//! [`Settings`], and a runner honouring the configured metadata file name.
//! [`load_settings`] produces those settings from a config file and the
//! `KITTY_*` environment.

use std::path::{Path, PathBuf};

use kitty_core::{settings_loader, KittyError, Settings};

use crate::assets::assets_from_settings;
use crate::registry::MigrationRegistry;
use crate::runner::{MigrationRunner, UpgradeResult};
use crate::version::Version;

/// How a settings-driven upgrade should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Version to upgrade to; the newest built-in version when unset.
    pub target: Option<Version>,
    /// Report what would change without touching the project.
    pub dry_run: bool,
    /// Retry migrations recorded as failed even when they detect nothing.
    pub force: bool,
}

/// Loads settings from `config` when given, otherwise from the environment
/// alone.
pub fn load_settings(config: Option<&Path>) -> Result<Settings, KittyError> {
    match config {
        Some(path) => settings_loader::from_file_with_env(path),
        None => Ok(settings_loader::from_env()),
    }
}

/// Upgrades the project at `root` with the built-in migrations.
pub fn upgrade_project(
    root: impl Into<PathBuf>,
    settings: &Settings,
    options: &UpgradeOptions,
) -> Result<UpgradeResult, KittyError> {
    let registry = MigrationRegistry::builtin()?;
    let assets = assets_from_settings(settings);
    let runner = MigrationRunner::with_settings(root, &registry, &*assets, settings);
    let target = options
        .target
        .unwrap_or_else(|| registry.latest_version());
    runner.upgrade(target, options.dry_run, options.force)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::missions::{mission_asset, MISSIONS};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_toml_config_drives_the_upgrade() {
        let assets = tempfile::tempdir().unwrap();
        for mission in MISSIONS {
            write(assets.path(), &mission_asset(mission), "name: bundled\n");
        }
        let config_dir = tempfile::tempdir().unwrap();
        let config = config_dir.path().join("kitty.toml");
        std::fs::write(
            &config,
            format!(
                "metadata_file_name = \"state.json\"\nassets_dir = {:?}\n",
                assets.path().display().to_string()
            ),
        )
        .unwrap();

        let project = tempfile::tempdir().unwrap();
        write(project.path(), ".specify/memory/constitution.md", "rules\n");
        write(project.path(), "specs/001/spec.md", "spec\n");

        let settings = load_settings(Some(&config)).unwrap();
        let result = upgrade_project(project.path(), &settings, &UpgradeOptions::default()).unwrap();

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.to_version, Version::new(0, 6, 0));
        assert!(project.path().join(".kittify/state.json").is_file());
        assert!(!project.path().join(".kittify/metadata.json").exists());
        assert!(project
            .path()
            .join(".kittify/missions/research/mission.yaml")
            .is_file());
    }

    #[test]
    fn test_explicit_target_and_dry_run() {
        let project = tempfile::tempdir().unwrap();
        write(project.path(), ".specify/memory/constitution.md", "rules\n");
        let options = UpgradeOptions {
            target: Some(Version::new(0, 2, 0)),
            dry_run: true,
            force: false,
        };

        let result = upgrade_project(project.path(), &Settings::default(), &options).unwrap();
        assert!(result.dry_run);
        assert_eq!(result.migrations_applied, vec!["0.2.0_specify_to_kittify"]);
        assert!(project.path().join(".specify").is_dir());
        assert!(!project.path().join(".kittify").exists());
    }

    #[test]
    fn test_missing_config_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, KittyError::ConfigurationError(_)));
    }
}
