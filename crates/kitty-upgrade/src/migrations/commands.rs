//! Duplication of shared command files into integration directories.
//!
//! Each integration reads its command files from its own directory. This
//! migration copies the shared sources from `.kittify/commands/` into every
//! present integration, never overwriting a file that already exists there.

use std::path::PathBuf;

use crate::fsutil::{atomic_write, entry_exists, sorted_entries};
use crate::layout::ProjectLayout;
use crate::migration::{Migration, MigrationContext, MigrationResult};
use crate::version::Version;

/// One file to copy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedCopy {
    source: PathBuf,
    dest: PathBuf,
}

fn plan_copies(layout: &ProjectLayout) -> std::io::Result<Vec<PlannedCopy>> {
    let sources_dir = layout.commands_dir();
    if !sources_dir.is_dir() {
        return Ok(Vec::new());
    }
    let sources: Vec<PathBuf> = sorted_entries(&sources_dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();

    let mut plan = Vec::new();
    for integration in layout.present_integrations() {
        let dest_dir = layout.path(integration.commands_dir);
        for source in &sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = dest_dir.join(name);
            if !entry_exists(&dest) {
                plan.push(PlannedCopy {
                    source: source.clone(),
                    dest,
                });
            }
        }
    }
    Ok(plan)
}

/// Whether the shared command sources exist and every present integration
/// already has a copy of each of them.
pub fn commands_synced(layout: &ProjectLayout) -> bool {
    layout.commands_dir().is_dir() && plan_copies(layout).is_ok_and(|plan| plan.is_empty())
}

/// Copies shared command files into each present integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrationCommands;

impl Migration for IntegrationCommands {
    fn migration_id(&self) -> &str {
        "0.5.0_integration_commands"
    }

    fn target_version(&self) -> Version {
        Version::new(0, 5, 0)
    }

    fn description(&self) -> &str {
        "Copy shared command files into each integration's command directory"
    }

    fn detect(&self, ctx: &MigrationContext<'_>) -> bool {
        match plan_copies(ctx.layout) {
            Ok(plan) => !plan.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot inspect command sources");
                false
            }
        }
    }

    fn apply(&self, ctx: &MigrationContext<'_>, dry_run: bool) -> MigrationResult {
        let plan = match plan_copies(ctx.layout) {
            Ok(plan) => plan,
            Err(e) => {
                return MigrationResult::failure(format!(
                    "Cannot read {}: {e}",
                    ctx.layout.commands_dir().display()
                ))
            }
        };

        let mut result = MigrationResult::success();
        for copy in plan {
            if !dry_run {
                let written = copy
                    .dest
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .and_then(|()| std::fs::read(&copy.source))
                    .and_then(|bytes| atomic_write(&copy.dest, &bytes));
                if let Err(e) = written {
                    result.add_error(format!(
                        "Failed to copy {} to {}: {e} ({} files already copied)",
                        copy.source.display(),
                        copy.dest.display(),
                        result.changed_count()
                    ));
                    return result;
                }
            }
            result.add_changed(copy.dest);
        }
        result
    }
}
