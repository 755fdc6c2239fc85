//! Provisioning of mission definitions from packaged assets.

use std::path::PathBuf;

use crate::fsutil::atomic_write;
use crate::layout::ProjectLayout;
use crate::migration::{Migration, MigrationContext, MigrationResult};
use crate::version::Version;

/// Missions every project ships with.
pub const MISSIONS: &[&str] = &["software-dev", "research"];

const MISSION_FILE: &str = "mission.yaml";

/// The asset name holding a mission's definition.
pub fn mission_asset(mission: &str) -> String {
    format!("missions/{mission}/{MISSION_FILE}")
}

/// Where a mission's definition lives in the project.
pub fn mission_path(layout: &ProjectLayout, mission: &str) -> PathBuf {
    layout.missions_dir().join(mission).join(MISSION_FILE)
}

/// Returns `true` when every bundled mission file is present.
pub fn missions_complete(layout: &ProjectLayout) -> bool {
    MISSIONS
        .iter()
        .all(|mission| mission_path(layout, mission).is_file())
}

/// Writes missing mission definitions from the asset provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissionProvisioning;

impl Migration for MissionProvisioning {
    fn migration_id(&self) -> &str {
        "0.6.0_provision_missions"
    }

    fn target_version(&self) -> Version {
        Version::new(0, 6, 0)
    }

    fn description(&self) -> &str {
        "Install the bundled mission definitions"
    }

    fn detect(&self, ctx: &MigrationContext<'_>) -> bool {
        ctx.layout.kittify_dir().is_dir() && !missions_complete(ctx.layout)
    }

    fn apply(&self, ctx: &MigrationContext<'_>, dry_run: bool) -> MigrationResult {
        let mut result = MigrationResult::success();
        if !ctx.layout.kittify_dir().is_dir() {
            return result;
        }

        for mission in MISSIONS {
            let dest = mission_path(ctx.layout, mission);
            if dest.is_file() {
                continue;
            }
            // Looked up in dry runs too, so a preview predicts the failure.
            let content = match ctx.assets.lookup(&mission_asset(mission)) {
                Ok(content) => content,
                Err(e) => {
                    result.add_error(format!("Mission '{mission}': {e}"));
                    continue;
                }
            };
            if !dry_run {
                let written = dest
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .and_then(|()| atomic_write(&dest, &content));
                if let Err(e) = written {
                    result.add_error(format!("Cannot write {}: {e}", dest.display()));
                    continue;
                }
            }
            result.add_changed(dest);
        }
        result
    }
}
