//! Upgrade execution engine.
//!
//! The [`MigrationRunner`] detects a project's version, plans the migrations
//! needed to reach a target version, and applies them one by one. Metadata is
//! persisted after every successful step, and the chain stops at the first
//! failure so a later run can resume where this one stopped.
//!
//! Planning is not limited to the version range. Any registered migration at
//! or below the target that is not recorded as successful and still detects
//! work is planned too, so a tree whose layout mixes schemes is caught up.
//!
//! ## States
//!
//! ```text
//! Idle -> Planning -> Executing(i) -> Executing(i + 1) | Stopped | Completed
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use kitty_core::logging::upgrade_span;
use kitty_core::{KittyError, Settings};

use crate::assets::AssetProvider;
use crate::detector::VersionDetector;
use crate::layout::ProjectLayout;
use crate::metadata::{MetadataStore, MigrationStatus, ProjectMetadata};
use crate::migration::{Migration, MigrationContext};
use crate::registry::MigrationRegistry;
use crate::version::Version;

/// Where the runner is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    /// Nothing has happened yet.
    Idle,
    /// Detecting the current version and building the plan.
    Planning,
    /// Running the step at this index of the plan.
    Executing(usize),
    /// A step failed; remaining steps were not attempted.
    Stopped,
    /// Every planned step was applied or skipped.
    Completed,
}

/// The outcome of one [`MigrationRunner::upgrade`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeResult {
    /// `true` when no step failed.
    pub success: bool,
    /// The version detected before the run.
    pub from_version: Version,
    /// The highest version reached by the run.
    pub to_version: Version,
    /// Whether this was a preview.
    pub dry_run: bool,
    /// The final runner state.
    pub state: RunnerState,
    /// Ids of applied migrations, in order.
    pub migrations_applied: Vec<String>,
    /// Ids of migrations found unnecessary, in order.
    pub migrations_skipped: Vec<String>,
    /// Ids of failed migrations. At most one, since the chain halts.
    pub migrations_failed: Vec<String>,
    /// Error messages, verbatim from the failing migration.
    pub errors: Vec<String>,
}

impl UpgradeResult {
    fn new(from_version: Version, dry_run: bool) -> Self {
        Self {
            success: true,
            from_version,
            to_version: from_version,
            dry_run,
            state: RunnerState::Idle,
            migrations_applied: Vec::new(),
            migrations_skipped: Vec::new(),
            migrations_failed: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn transition(&mut self, state: RunnerState) {
        tracing::debug!(from = ?self.state, to = ?state, "Runner state change");
        self.state = state;
    }
}

/// A preview of what [`MigrationRunner::upgrade`] would attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradePlan {
    /// The detected current version.
    pub current_version: Version,
    /// The requested target version.
    pub target_version: Version,
    /// Ids of the migrations to consider, in execution order.
    pub migrations: Vec<String>,
}

impl UpgradePlan {
    /// Returns whether there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Applies registered migrations to one project.
pub struct MigrationRunner<'a> {
    layout: ProjectLayout,
    registry: &'a MigrationRegistry,
    assets: &'a dyn AssetProvider,
    detector: VersionDetector,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner for the project at `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: &'a MigrationRegistry,
        assets: &'a dyn AssetProvider,
    ) -> Self {
        Self {
            layout: ProjectLayout::new(project_root),
            registry,
            assets,
            detector: VersionDetector::new(),
        }
    }

    /// Creates a runner that honours the configured metadata file name.
    pub fn with_settings(
        project_root: impl Into<PathBuf>,
        registry: &'a MigrationRegistry,
        assets: &'a dyn AssetProvider,
        settings: &Settings,
    ) -> Self {
        let mut runner = Self::new(project_root, registry, assets);
        runner.layout = runner
            .layout
            .with_metadata_file_name(settings.metadata_file_name.clone());
        runner
    }

    /// The project layout this runner operates on.
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Lists the migrations an upgrade to `target` would consider, without
    /// running anything.
    pub fn plan(&self, target: Version) -> Result<UpgradePlan, KittyError> {
        self.check_root()?;
        let metadata = self.store().load()?;
        let current = self
            .detector
            .detect_with_metadata(&self.layout, metadata.as_ref());
        let ctx = MigrationContext::new(&self.layout, self.assets);
        let migrations = self
            .planned(&ctx, current, target, metadata.as_ref())
            .iter()
            .map(|m| m.migration_id().to_string())
            .collect();
        Ok(UpgradePlan {
            current_version: current,
            target_version: target,
            migrations,
        })
    }

    /// Upgrades the project to `target`.
    ///
    /// Migration failures are reported in the returned [`UpgradeResult`].
    /// `Err` is reserved for problems with the run itself: an unusable
    /// project root or a corrupt metadata file.
    ///
    /// With `dry_run`, every migration only reports what it would change and
    /// neither the tree nor the metadata file is touched. With `force`,
    /// migrations recorded as failed are re-attempted even if their own
    /// detection says they are not needed.
    pub fn upgrade(
        &self,
        target: Version,
        dry_run: bool,
        force: bool,
    ) -> Result<UpgradeResult, KittyError> {
        let span = upgrade_span(self.layout.root());
        let _guard = span.enter();

        self.check_root()?;
        let store = self.store();
        let loaded = store.load()?;

        let mut result = UpgradeResult::new(Version::UNKNOWN, dry_run);
        result.transition(RunnerState::Planning);
        let current = self.detector.detect_with_metadata(&self.layout, loaded.as_ref());
        result.from_version = current;
        result.to_version = current;
        let mut metadata = loaded.unwrap_or_else(|| ProjectMetadata::initialize(current));

        let ctx = MigrationContext::new(&self.layout, self.assets);
        let plan = self.planned(&ctx, current, target, Some(&metadata));
        tracing::info!(
            from = %current,
            target = %target,
            steps = plan.len(),
            dry_run,
            force,
            "Planned upgrade"
        );
        if plan.is_empty() {
            result.transition(RunnerState::Completed);
            return Ok(result);
        }

        for (index, migration) in plan.iter().enumerate() {
            result.transition(RunnerState::Executing(index));
            let id = migration.migration_id();

            if !Self::is_needed(*migration, &ctx, &metadata, force) {
                tracing::debug!(migration = id, "Migration not needed");
                result.migrations_skipped.push(id.to_string());
                continue;
            }

            let outcome = migration.apply(&ctx, dry_run);
            if !outcome.success {
                let mut errors = outcome.errors;
                if errors.is_empty() {
                    errors.push("migration reported failure without details".to_string());
                }
                let message = errors.join("; ");
                tracing::error!(migration = id, error = %message, "Migration failed");
                result.errors.extend(
                    errors
                        .iter()
                        .map(|e| KittyError::apply(id, e.as_str()).to_string()),
                );
                result.migrations_failed.push(id.to_string());
                result.success = false;
                if !dry_run {
                    metadata.record_failure(id, message);
                    if let Err(e) = store.save(&metadata) {
                        tracing::error!(error = %e, "Cannot record failed migration");
                        result.errors.push(e.to_string());
                    }
                }
                result.transition(RunnerState::Stopped);
                return Ok(result);
            }

            tracing::info!(
                migration = id,
                changed = outcome.changed_count(),
                dry_run,
                "Migration applied"
            );
            result.migrations_applied.push(id.to_string());
            result.to_version = result.to_version.max(migration.target_version());

            if !dry_run {
                metadata.record_success(id, migration.target_version());
                if let Err(e) = store.save(&metadata) {
                    tracing::error!(migration = id, error = %e, "Cannot persist metadata");
                    result.errors.push(format!(
                        "Migration {id} was applied but metadata could not be saved: {e}"
                    ));
                    result.success = false;
                    result.transition(RunnerState::Stopped);
                    return Ok(result);
                }
            }
        }

        // Skipped steps do not count: the version only reflects recorded
        // successes and what the tree now shows.
        if !dry_run {
            metadata.raise_version(self.detector.detect_layout(&self.layout));
            metadata.touch_upgraded();
            store.save(&metadata)?;
            result.to_version = result.to_version.max(metadata.version);
        }
        tracing::info!(
            applied = result.migrations_applied.len(),
            skipped = result.migrations_skipped.len(),
            version = %result.to_version,
            "Upgrade complete"
        );
        result.transition(RunnerState::Completed);
        Ok(result)
    }

    fn store(&self) -> MetadataStore {
        MetadataStore::new(self.layout.clone())
    }

    fn check_root(&self) -> Result<(), KittyError> {
        self.detector.try_detect(&self.layout).map(|_| ())
    }

    /// The registry's range plan, plus every migration at or below `target`
    /// that is not recorded as successful and is either recorded as failed or
    /// still detects work. Registry order is kept.
    fn planned(
        &self,
        ctx: &MigrationContext<'_>,
        current: Version,
        target: Version,
        metadata: Option<&ProjectMetadata>,
    ) -> Vec<&'a dyn Migration> {
        let in_range: HashSet<&str> = self
            .registry
            .get_applicable(current, target)
            .into_iter()
            .map(|m| m.migration_id())
            .collect();
        self.registry
            .iter()
            .filter(|m| {
                let id = m.migration_id();
                if in_range.contains(id) {
                    return true;
                }
                if m.target_version() > target {
                    return false;
                }
                match metadata.and_then(|meta| meta.status_of(id)) {
                    Some(MigrationStatus::Success) => false,
                    Some(MigrationStatus::Failed) => true,
                    _ => m.detect(ctx),
                }
            })
            .collect()
    }

    fn is_needed(
        migration: &dyn Migration,
        ctx: &MigrationContext<'_>,
        metadata: &ProjectMetadata,
        force: bool,
    ) -> bool {
        match metadata.status_of(migration.migration_id()) {
            Some(MigrationStatus::Success) => false,
            Some(MigrationStatus::Failed) if force => true,
            _ => migration.detect(ctx),
        }
    }
}
