//! Core error types for the kitty upgrade engine.
//!
//! This module provides [`KittyError`], the single error enum shared by every
//! crate in the workspace. Variants follow the failure taxonomy of a project
//! upgrade: detection problems, migration failures, missing packaged
//! resources, and corrupt metadata, plus the usual configuration, serialization
//! and I/O errors.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for the kitty upgrade engine.
///
/// Only [`MetadataCorrupt`](Self::MetadataCorrupt) and I/O failures on the
/// project root abort an upgrade run. Migration failures are reported through
/// the upgrade result and halt the chain instead.
#[derive(Error, Debug)]
pub enum KittyError {
    // ── Upgrade ──────────────────────────────────────────────────────

    /// The schema version of a project could not be inferred.
    #[error("Detection error: {0}")]
    Detection(String),

    /// A migration's transformation failed.
    #[error("Migration {migration_id} failed: {message}")]
    MigrationApply {
        /// The id of the migration that failed.
        migration_id: String,
        /// The failure description.
        message: String,
    },

    /// A packaged asset required by a provisioning migration is missing.
    #[error("resource unavailable: {resource} (packaged assets are missing from this installation)")]
    ResourceUnavailable {
        /// The asset name that was looked up.
        resource: String,
    },

    /// The persisted project metadata is unreadable or structurally invalid.
    #[error("Metadata corrupt at {}: {reason}", path.display())]
    MetadataCorrupt {
        /// The metadata file that failed to load.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The migration catalog was assembled incorrectly.
    #[error("Registry error: {0}")]
    Registry(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KittyError {
    /// Returns `true` when the error stems from the runtime environment
    /// rather than from the project being upgraded.
    ///
    /// Re-running after fixing the environment is expected to succeed.
    pub const fn is_environment_issue(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. } | Self::IoError(_))
    }

    /// Creates a [`KittyError::MigrationApply`].
    pub fn apply(migration_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MigrationApply {
            migration_id: migration_id.into(),
            message: message.into(),
        }
    }

    /// Creates a [`KittyError::MetadataCorrupt`].
    pub fn metadata_corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MetadataCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A convenience type alias for `Result<T, KittyError>`.
pub type KittyResult<T> = Result<T, KittyError>;
