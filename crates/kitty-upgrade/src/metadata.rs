//! Persisted project metadata.
//!
//! [`ProjectMetadata`] records where a project came from and which migrations
//! have been applied to it. [`MetadataStore`] reads and writes it as
//! `metadata.json` inside the project's control directory.
//!
//! ## File format
//!
//! ```json
//! {
//!   "version": "0.4.0",
//!   "initialized_at": "2024-05-01T10:00:00Z",
//!   "platform": "linux",
//!   "platform_version": "x86_64",
//!   "applied_migrations": [
//!     {"id": "0.2.0_specify_to_kittify", "status": "success", "timestamp": "2024-06-01T10:00:00Z"}
//!   ]
//! }
//! ```
//!
//! Files are read with a tolerated UTF-8 byte-order mark and written as UTF-8
//! without one. Every save rewrites the whole file through a temp file and a
//! rename, so a crash leaves either the previous or the new contents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use kitty_core::KittyError;

use crate::fsutil::{atomic_write, strip_bom};
use crate::layout::ProjectLayout;
use crate::version::Version;

/// Outcome recorded for a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// The migration completed.
    Success,
    /// The migration failed; a later run retries it.
    Failed,
    /// The migration was judged unnecessary. Written by older tool versions.
    Skipped,
}

/// One entry of `applied_migrations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// The migration id.
    pub id: String,
    /// The recorded outcome.
    pub status: MigrationStatus,
    /// When the outcome was recorded.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Error text for failed migrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Provenance and migration history of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Schema version the project has been brought to.
    pub version: Version,
    /// When the project was initialized.
    #[serde(with = "timestamp")]
    pub initialized_at: DateTime<Utc>,
    /// When the last upgrade finished.
    #[serde(default, with = "optional_timestamp", skip_serializing_if = "Option::is_none")]
    pub last_upgraded_at: Option<DateTime<Utc>>,
    /// Operating system of the machine that wrote the file.
    #[serde(default)]
    pub platform: String,
    /// Architecture of the machine that wrote the file.
    #[serde(default)]
    pub platform_version: String,
    /// Version of the tool that last wrote the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    /// Migration outcomes in the order they were first recorded.
    #[serde(default)]
    pub applied_migrations: Vec<MigrationRecord>,
}

impl ProjectMetadata {
    /// Creates fresh metadata stamped with the current time and host platform.
    pub fn initialize(version: Version) -> Self {
        Self {
            version,
            initialized_at: Utc::now(),
            last_upgraded_at: None,
            platform: std::env::consts::OS.to_string(),
            platform_version: std::env::consts::ARCH.to_string(),
            tool_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            applied_migrations: Vec::new(),
        }
    }

    /// Parses metadata bytes, tolerating a leading BOM.
    ///
    /// `path` is only used for diagnostics.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, KittyError> {
        let text = std::str::from_utf8(strip_bom(bytes))
            .map_err(|e| KittyError::metadata_corrupt(path, format!("not valid UTF-8: {e}")))?;
        serde_json::from_str(text).map_err(|e| KittyError::metadata_corrupt(path, e.to_string()))
    }

    /// Serializes to pretty JSON with a trailing newline and no BOM.
    pub fn to_bytes(&self) -> Result<Vec<u8>, KittyError> {
        let mut bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| KittyError::SerializationError(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Returns the latest recorded status of a migration.
    pub fn status_of(&self, id: &str) -> Option<MigrationStatus> {
        self.applied_migrations
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
    }

    /// Returns whether a migration is recorded as successful.
    pub fn has_succeeded(&self, id: &str) -> bool {
        self.status_of(id) == Some(MigrationStatus::Success)
    }

    /// Ids recorded as successful, in record order.
    pub fn succeeded_ids(&self) -> Vec<&str> {
        self.applied_migrations
            .iter()
            .filter(|r| r.status == MigrationStatus::Success)
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Records an outcome, replacing any earlier record for the same id in
    /// place.
    pub fn record(&mut self, id: &str, status: MigrationStatus, error: Option<String>) {
        let record = MigrationRecord {
            id: id.to_string(),
            status,
            timestamp: Utc::now(),
            error,
        };
        match self.applied_migrations.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => self.applied_migrations.push(record),
        }
    }

    /// Records a success and raises `version` to `target` if it is higher.
    pub fn record_success(&mut self, id: &str, target: Version) {
        self.record(id, MigrationStatus::Success, None);
        self.raise_version(target);
    }

    /// Records a failure with its error text.
    pub fn record_failure(&mut self, id: &str, error: impl Into<String>) {
        self.record(id, MigrationStatus::Failed, Some(error.into()));
    }

    /// Raises `version` to `target`; never lowers it.
    pub fn raise_version(&mut self, target: Version) {
        if target > self.version {
            self.version = target;
        }
    }

    /// Folds in the history of an older metadata file for the same project.
    ///
    /// Records whose ids are not already present here are placed first, in
    /// their original order. The earlier initialization time and the higher
    /// version are kept.
    pub fn absorb(&mut self, older: Self) {
        let mut merged: Vec<MigrationRecord> = older
            .applied_migrations
            .into_iter()
            .filter(|record| self.status_of(&record.id).is_none())
            .collect();
        merged.append(&mut self.applied_migrations);
        self.applied_migrations = merged;
        self.initialized_at = self.initialized_at.min(older.initialized_at);
        self.raise_version(older.version);
        if self.platform.is_empty() {
            self.platform = older.platform;
            self.platform_version = older.platform_version;
        }
    }

    /// Stamps the upgrade time and the writing tool's version.
    pub fn touch_upgraded(&mut self) {
        self.last_upgraded_at = Some(Utc::now());
        self.tool_version = Some(env!("CARGO_PKG_VERSION").to_string());
    }
}

/// Reads and writes a project's metadata file.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    layout: ProjectLayout,
}

impl MetadataStore {
    /// Creates a store for the given layout.
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    /// The current location of the metadata file.
    ///
    /// Follows the control directory, so it changes when `.specify/` is
    /// renamed.
    pub fn path(&self) -> PathBuf {
        self.layout.metadata_path()
    }

    /// Loads the metadata, or `None` when the project has no metadata file.
    ///
    /// When both `.kittify/` and a leftover `.specify/` hold a metadata file,
    /// the legacy history is folded into the current one with
    /// [`ProjectMetadata::absorb`]. Any read failure other than a missing
    /// file, and any parse failure, is [`KittyError::MetadataCorrupt`].
    pub fn load(&self) -> Result<Option<ProjectMetadata>, KittyError> {
        let path = self.path();
        let current = read_metadata(&path)?;
        let legacy_path = self.layout.legacy_metadata_path();
        if legacy_path == path {
            return Ok(current);
        }
        let legacy = read_metadata(&legacy_path)?;
        Ok(match (current, legacy) {
            (Some(mut current), Some(legacy)) => {
                tracing::info!(
                    legacy = %legacy_path.display(),
                    "Merging metadata left in the legacy control directory"
                );
                current.absorb(legacy);
                Some(current)
            }
            (current, legacy) => current.or(legacy),
        })
    }

    /// Loads the metadata, or creates fresh in-memory metadata at `version`.
    ///
    /// Nothing is written.
    pub fn load_or_initialize(&self, version: Version) -> Result<ProjectMetadata, KittyError> {
        Ok(self
            .load()?
            .unwrap_or_else(|| ProjectMetadata::initialize(version)))
    }

    /// Writes the metadata.
    ///
    /// Returns `Ok(false)` without writing when the project has no control
    /// directory to hold the file.
    pub fn save(&self, metadata: &ProjectMetadata) -> Result<bool, KittyError> {
        if !self.layout.has_control_dir() {
            tracing::debug!(
                project = %self.layout.root().display(),
                "No control directory; metadata not persisted"
            );
            return Ok(false);
        }
        let path = self.path();
        atomic_write(&path, &metadata.to_bytes()?)?;
        tracing::debug!(path = %path.display(), "Metadata saved");
        Ok(true)
    }

    /// Initializes metadata for a new project, creating `.kittify/` if needed.
    ///
    /// Existing metadata is returned unchanged rather than overwritten.
    pub fn init_project(&self, version: Version) -> Result<ProjectMetadata, KittyError> {
        if let Some(existing) = self.load()? {
            return Ok(existing);
        }
        std::fs::create_dir_all(self.layout.control_dir())?;
        let metadata = ProjectMetadata::initialize(version);
        self.save(&metadata)?;
        tracing::info!(version = %version, "Initialized project metadata");
        Ok(metadata)
    }
}

/// Reads one metadata file; a missing file is `None`.
pub(crate) fn read_metadata(path: &Path) -> Result<Option<ProjectMetadata>, KittyError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(KittyError::metadata_corrupt(
                path,
                format!("cannot be read: {e}"),
            ))
        }
    };
    ProjectMetadata::from_bytes(&bytes, path).map(Some)
}

/// RFC 3339 timestamps; naive timestamps from older files are read as UTC.
mod timestamp {
    use super::{parse_timestamp, DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

mod optional_timestamp {
    use super::{parse_timestamp, DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_control_dir() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".kittify")).unwrap();
        let store = MetadataStore::new(ProjectLayout::new(dir.path()));
        (dir, store)
    }

    const LEGACY_JSON: &str = r#"{
        "version": "0.1.0",
        "initialized_at": "2024-03-01T09:30:00.123456",
        "platform": "darwin",
        "platform_version": "23.1.0",
        "applied_migrations": [
            {"id": "0.2.0_specify_to_kittify", "status": "success", "timestamp": "2024-03-02T10:00:00+00:00"},
            {"id": "0.3.0_specs_to_kitty_specs", "status": "skipped", "timestamp": "2024-03-02T10:00:01Z"}
        ]
    }"#;

    #[test]
    fn test_initialize() {
        let meta = ProjectMetadata::initialize(Version::new(0, 6, 0));
        assert_eq!(meta.version, Version::new(0, 6, 0));
        assert_eq!(meta.platform, std::env::consts::OS);
        assert!(meta.applied_migrations.is_empty());
        assert!(meta.last_upgraded_at.is_none());
    }

    #[test]
    fn test_parse_legacy_file_with_naive_timestamps() {
        let meta = ProjectMetadata::from_bytes(LEGACY_JSON.as_bytes(), Path::new("m.json")).unwrap();
        assert_eq!(meta.version, Version::new(0, 1, 0));
        assert_eq!(meta.platform, "darwin");
        assert!(meta.has_succeeded("0.2.0_specify_to_kittify"));
        assert_eq!(
            meta.status_of("0.3.0_specs_to_kitty_specs"),
            Some(MigrationStatus::Skipped)
        );
        assert!(!meta.has_succeeded("0.3.0_specs_to_kitty_specs"));
        assert!(meta.tool_version.is_none());
    }

    #[test]
    fn test_parse_tolerates_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(LEGACY_JSON.as_bytes());
        assert!(ProjectMetadata::from_bytes(&bytes, Path::new("m.json")).is_ok());
    }

    #[test]
    fn test_parse_rejects_structural_problems() {
        let cases: &[&[u8]] = &[
            b"not json",
            b"{}",
            br#"{"version": "x.y", "initialized_at": "2024-01-01T00:00:00Z"}"#,
            br#"{"version": "0.1.0", "initialized_at": "yesterday"}"#,
            br#"{"version": "0.1.0", "initialized_at": "2024-01-01T00:00:00Z",
                "applied_migrations": [{"id": "a", "status": "maybe", "timestamp": "2024-01-01T00:00:00Z"}]}"#,
            b"\xff\xfe{}",
        ];
        for case in cases {
            let err = ProjectMetadata::from_bytes(case, Path::new("/p/metadata.json")).unwrap_err();
            assert!(
                matches!(err, KittyError::MetadataCorrupt { .. }),
                "{:?} -> {err:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_written_without_bom() {
        let bytes = ProjectMetadata::initialize(Version::new(0, 2, 0)).to_bytes().unwrap();
        assert_eq!(bytes[0], b'{');
        assert!(bytes.ends_with(b"\n"));
    }

    #[test]
    fn test_record_replaces_in_place() {
        let mut meta = ProjectMetadata::initialize(Version::new(0, 1, 0));
        meta.record_failure("0.2.0_a", "disk full");
        meta.record_success("0.3.0_b", Version::new(0, 3, 0));
        meta.record_success("0.2.0_a", Version::new(0, 2, 0));

        assert_eq!(meta.applied_migrations.len(), 2);
        assert_eq!(meta.applied_migrations[0].id, "0.2.0_a");
        assert_eq!(meta.applied_migrations[0].status, MigrationStatus::Success);
        assert!(meta.applied_migrations[0].error.is_none());
        assert_eq!(meta.succeeded_ids(), vec!["0.2.0_a", "0.3.0_b"]);
        // Version never goes down.
        assert_eq!(meta.version, Version::new(0, 3, 0));
    }

    #[test]
    fn test_store_load_missing_is_none() {
        let (_dir, store) = project_with_control_dir();
        assert!(store.load().unwrap().is_none());
        let meta = store.load_or_initialize(Version::new(0, 2, 0)).unwrap();
        assert_eq!(meta.version, Version::new(0, 2, 0));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_store_save_and_reload() {
        let (_dir, store) = project_with_control_dir();
        let mut meta = ProjectMetadata::initialize(Version::new(0, 2, 0));
        meta.record_failure("0.3.0_specs_to_kitty_specs", "conflict");
        meta.touch_upgraded();
        assert!(store.save(&meta).unwrap());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, meta.version);
        assert_eq!(loaded.applied_migrations.len(), 1);
        assert_eq!(
            loaded.applied_migrations[0].error.as_deref(),
            Some("conflict")
        );
        assert!(loaded.last_upgraded_at.is_some());
    }

    #[test]
    fn test_store_corrupt_file() {
        let (dir, store) = project_with_control_dir();
        std::fs::write(dir.path().join(".kittify/metadata.json"), b"{ truncated").unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("metadata.json"));
    }

    #[test]
    fn test_store_save_without_control_dir_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(ProjectLayout::new(dir.path()));
        let saved = store
            .save(&ProjectMetadata::initialize(Version::UNKNOWN))
            .unwrap();
        assert!(!saved);
        assert!(crate::fsutil::sorted_entries(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_store_follows_legacy_control_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".specify")).unwrap();
        std::fs::write(dir.path().join(".specify/metadata.json"), LEGACY_JSON).unwrap();
        let store = MetadataStore::new(ProjectLayout::new(dir.path()));
        assert_eq!(store.load().unwrap().unwrap().platform, "darwin");
    }

    #[test]
    fn test_absorb_keeps_older_history_first() {
        let mut older =
            ProjectMetadata::from_bytes(LEGACY_JSON.as_bytes(), Path::new("m.json")).unwrap();
        older.record_failure("0.0.9_custom", "boom");
        let mut current = ProjectMetadata::initialize(Version::new(0, 2, 0));
        current.record_success("0.2.0_specify_to_kittify", Version::new(0, 2, 0));
        let current_stamp = current.applied_migrations[0].timestamp;

        current.absorb(older);
        let ids: Vec<_> = current.applied_migrations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["0.3.0_specs_to_kitty_specs", "0.0.9_custom", "0.2.0_specify_to_kittify"]
        );
        // The current record for a shared id wins.
        assert_eq!(current.applied_migrations[2].timestamp, current_stamp);
        assert_eq!(current.initialized_at.to_rfc3339(), "2024-03-01T09:30:00.123456+00:00");
        assert_eq!(current.version, Version::new(0, 2, 0));
    }

    #[test]
    fn test_store_merges_metadata_from_both_control_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".specify")).unwrap();
        std::fs::write(dir.path().join(".specify/metadata.json"), LEGACY_JSON).unwrap();
        std::fs::create_dir(dir.path().join(".kittify")).unwrap();
        let current_store = MetadataStore::new(ProjectLayout::new(dir.path()));
        let mut current = ProjectMetadata::initialize(Version::new(0, 4, 0));
        current.record_success("0.4.0_gitignore_integrations", Version::new(0, 4, 0));
        current_store.save(&current).unwrap();

        let loaded = current_store.load().unwrap().unwrap();
        assert_eq!(loaded.version, Version::new(0, 4, 0));
        assert_eq!(
            loaded.succeeded_ids(),
            vec!["0.2.0_specify_to_kittify", "0.4.0_gitignore_integrations"]
        );
        assert_eq!(loaded.initialized_at.date_naive().to_string(), "2024-03-01");
    }

    #[test]
    fn test_store_reads_legacy_metadata_when_current_dir_has_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".specify")).unwrap();
        std::fs::create_dir(dir.path().join(".kittify")).unwrap();
        std::fs::write(dir.path().join(".specify/metadata.json"), LEGACY_JSON).unwrap();
        let store = MetadataStore::new(ProjectLayout::new(dir.path()));
        assert_eq!(store.load().unwrap().unwrap().platform, "darwin");
    }

    #[test]
    fn test_init_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(ProjectLayout::new(dir.path()));
        let created = store.init_project(Version::new(0, 6, 0)).unwrap();
        assert!(dir.path().join(".kittify/metadata.json").is_file());

        let again = store.init_project(Version::new(0, 1, 0)).unwrap();
        assert_eq!(again.version, created.version);
    }
}
