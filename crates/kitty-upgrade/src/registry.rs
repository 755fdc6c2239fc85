//! The ordered migration catalog.
//!
//! A [`MigrationRegistry`] owns every known [`Migration`] in registration
//! order. Registration is append-only: ids must be unique and target versions
//! strictly ascend, so the catalog is always sorted and planning is a simple
//! range filter.

use std::collections::HashSet;

use kitty_core::KittyError;

use crate::migration::Migration;
use crate::migrations;
use crate::version::Version;

/// An append-only, version-ordered catalog of migrations.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
    ids: HashSet<String>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the registry of built-in migrations.
    pub fn builtin() -> Result<Self, KittyError> {
        Self::from_migrations(migrations::builtin())
    }

    /// Registers every migration in order, stopping at the first invalid one.
    pub fn from_migrations(
        migrations: impl IntoIterator<Item = Box<dyn Migration>>,
    ) -> Result<Self, KittyError> {
        let mut registry = Self::new();
        for migration in migrations {
            registry.register(migration)?;
        }
        tracing::debug!(count = registry.len(), "Migration registry built");
        Ok(registry)
    }

    /// Appends a migration.
    ///
    /// Returns an error if the id is already registered or the target version
    /// is not higher than the last registered one.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> Result<(), KittyError> {
        let id = migration.migration_id().to_string();
        if id.trim().is_empty() {
            return Err(KittyError::Registry("Migration id must not be empty".into()));
        }
        if self.ids.contains(&id) {
            return Err(KittyError::Registry(format!(
                "Migration '{id}' is already registered"
            )));
        }
        if let Some(last) = self.migrations.last() {
            if migration.target_version() <= last.target_version() {
                return Err(KittyError::Registry(format!(
                    "Migration '{id}' targets {} but '{}' already targets {}; \
                     target versions must strictly ascend",
                    migration.target_version(),
                    last.migration_id(),
                    last.target_version()
                )));
            }
        }
        self.ids.insert(id);
        self.migrations.push(migration);
        Ok(())
    }

    /// Returns the migrations with `current < target_version <= target`, in
    /// strictly ascending version order.
    pub fn get_applicable(&self, current: Version, target: Version) -> Vec<&dyn Migration> {
        self.migrations
            .iter()
            .filter(|m| {
                let v = m.target_version();
                current < v && v <= target
            })
            .map(AsRef::as_ref)
            .collect()
    }

    /// Looks up a migration by id.
    pub fn get(&self, id: &str) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.migration_id() == id)
            .map(AsRef::as_ref)
    }

    /// Returns whether a migration id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Iterates over all migrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(AsRef::as_ref)
    }

    /// The highest target version in the catalog, or the unknown sentinel when
    /// empty.
    pub fn latest_version(&self) -> Version {
        self.migrations
            .last()
            .map_or(Version::UNKNOWN, |m| m.target_version())
    }

    /// Returns the number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
