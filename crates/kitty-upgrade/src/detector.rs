//! Structural version detection.
//!
//! [`VersionDetector`] infers a project's schema version from what is on
//! disk, so legacy projects that predate the metadata file can still be
//! upgraded. Each scheme adds one marker on top of the scheme before it, so a
//! version only holds when its own marker and every older marker match.
//! Versions are tried from the newest down and the first that holds wins; a
//! tree that mixes schemes therefore reports the oldest scheme it has not
//! finished leaving.

use std::path::Path;

use kitty_core::KittyError;

use crate::layout::ProjectLayout;
use crate::metadata::ProjectMetadata;
use crate::migrations::commands::commands_synced;
use crate::migrations::gitignore::missing_entries;
use crate::migrations::missions::missions_complete;
use crate::version::Version;

/// The structural marker one schema version adds.
struct Fingerprint {
    version: Version,
    label: &'static str,
    matches: fn(&ProjectLayout) -> bool,
}

/// Newest first. Each entry builds on every entry after it.
const FINGERPRINTS: &[Fingerprint] = &[
    Fingerprint {
        version: Version::new(0, 6, 0),
        label: "bundled missions installed",
        matches: |layout| layout.missions_dir().is_dir() && missions_complete(layout),
    },
    Fingerprint {
        version: Version::new(0, 5, 0),
        label: "integration commands in sync",
        matches: commands_synced,
    },
    Fingerprint {
        version: Version::new(0, 4, 0),
        label: "complete .gitignore",
        matches: gitignore_complete,
    },
    Fingerprint {
        version: Version::new(0, 3, 0),
        label: "kitty-specs without a legacy specs",
        matches: |layout| layout.specs_dir().is_dir() && !layout.legacy_specs_dir().is_dir(),
    },
    Fingerprint {
        version: Version::new(0, 2, 0),
        label: ".kittify without a legacy .specify",
        matches: |layout| {
            layout.kittify_dir().is_dir() && !layout.legacy_control_dir().is_dir()
        },
    },
    Fingerprint {
        version: Version::new(0, 1, 0),
        label: "control directory",
        matches: ProjectLayout::has_control_dir,
    },
];

/// Whether the scheme at `index` and every older scheme match.
fn holds(layout: &ProjectLayout, index: usize) -> bool {
    FINGERPRINTS[index..].iter().all(|f| (f.matches)(layout))
}

fn gitignore_complete(layout: &ProjectLayout) -> bool {
    match std::fs::read(layout.gitignore()) {
        Ok(bytes) => missing_entries(&String::from_utf8_lossy(&bytes)).is_empty(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot read .gitignore while detecting version");
            false
        }
    }
}

/// Infers project schema versions from directory structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionDetector;

impl VersionDetector {
    /// Creates a detector.
    pub fn new() -> Self {
        Self
    }

    /// Detects the schema version of the project at `project_path`.
    ///
    /// Never fails and never mutates: anything that cannot be recognized,
    /// including a missing or unreadable directory, yields
    /// [`Version::UNKNOWN`] with a warning.
    pub fn detect_version(&self, project_path: &Path) -> Version {
        self.detect_layout(&ProjectLayout::new(project_path))
    }

    /// [`detect_version`](Self::detect_version) for an existing layout.
    pub fn detect_layout(&self, layout: &ProjectLayout) -> Version {
        match self.try_detect(layout) {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to unknown project version");
                Version::UNKNOWN
            }
        }
    }

    /// Detects the version, reporting why detection was impossible.
    ///
    /// A readable directory with no fingerprint is `Ok(Version::UNKNOWN)`;
    /// only an unusable project root is an error.
    pub fn try_detect(&self, layout: &ProjectLayout) -> Result<Version, KittyError> {
        let root = layout.root();
        let meta = std::fs::metadata(root).map_err(|e| {
            KittyError::Detection(format!("Cannot inspect {}: {e}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(KittyError::Detection(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        std::fs::read_dir(root).map_err(|e| {
            KittyError::Detection(format!("Cannot read {}: {e}", root.display()))
        })?;

        for (index, fingerprint) in FINGERPRINTS.iter().enumerate() {
            if holds(layout, index) {
                tracing::debug!(
                    version = %fingerprint.version,
                    fingerprint = fingerprint.label,
                    "Detected project version"
                );
                return Ok(fingerprint.version);
            }
        }
        Ok(Version::UNKNOWN)
    }

    /// Combines structural detection with the version recorded in metadata.
    ///
    /// The recorded version only ever rises after successful migrations, so
    /// the higher of the two is used.
    pub fn detect_with_metadata(
        &self,
        layout: &ProjectLayout,
        metadata: Option<&ProjectMetadata>,
    ) -> Version {
        let structural = self.detect_layout(layout);
        match metadata {
            Some(meta) if meta.version > structural => {
                tracing::debug!(
                    structural = %structural,
                    recorded = %meta.version,
                    "Metadata records a newer version than the structure shows"
                );
                meta.version
            }
            _ => structural,
        }
    }
}
