//! Ignore-file augmentation.
//!
//! Integration directories may hold credentials and per-user state, and the
//! dashboard keeps scratch files inside the control directory. This migration
//! appends whatever ignore entries are missing and leaves every existing line
//! untouched.

use std::collections::HashSet;

use crate::fsutil::atomic_write;
use crate::layout::{ProjectLayout, CONTROL_DIR, DASHBOARD_DIR, INTEGRATIONS};
use crate::migration::{Migration, MigrationContext, MigrationResult};
use crate::version::Version;

/// The entries every upgraded `.gitignore` must contain, in append order.
pub fn required_entries() -> Vec<String> {
    let mut entries: Vec<String> = INTEGRATIONS
        .iter()
        .map(|integration| format!("{}/", integration.root))
        .collect();
    entries.push(format!("{CONTROL_DIR}/{DASHBOARD_DIR}"));
    entries
}

/// Reduces an ignore line to the path it matches, or `None` for blank lines,
/// comments and negations.
fn normalize(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    let trimmed = trimmed.trim_start_matches('/').trim_end_matches('/');
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Returns the required entries absent from `content`, in append order.
pub fn missing_entries(content: &str) -> Vec<String> {
    let present: HashSet<&str> = content.lines().filter_map(normalize).collect();
    let mut seen = HashSet::new();
    required_entries()
        .into_iter()
        .filter(|entry| {
            let key = normalize(entry).unwrap_or(entry).to_string();
            !present.contains(key.as_str()) && seen.insert(key)
        })
        .collect()
}

/// Appends `entries` to `original`, keeping its bytes and line-ending style.
pub fn append_entries(original: &[u8], entries: &[String]) -> Vec<u8> {
    let eol: &[u8] = if original.windows(2).any(|w| w == b"\r\n") {
        b"\r\n"
    } else {
        b"\n"
    };
    let mut out = original.to_vec();
    if !out.is_empty() && !out.ends_with(b"\n") {
        out.extend_from_slice(eol);
    }
    for entry in entries {
        out.extend_from_slice(entry.as_bytes());
        out.extend_from_slice(eol);
    }
    out
}

fn read_ignore_file(layout: &ProjectLayout) -> std::io::Result<Vec<u8>> {
    match std::fs::read(layout.gitignore()) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Adds missing integration and dashboard entries to `.gitignore`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitignoreAugmentation;

impl Migration for GitignoreAugmentation {
    fn migration_id(&self) -> &str {
        "0.4.0_gitignore_integrations"
    }

    fn target_version(&self) -> Version {
        Version::new(0, 4, 0)
    }

    fn description(&self) -> &str {
        "Ignore integration directories and dashboard scratch files"
    }

    fn detect(&self, ctx: &MigrationContext<'_>) -> bool {
        if !ctx.layout.has_control_dir() {
            return false;
        }
        match read_ignore_file(ctx.layout) {
            Ok(bytes) => !missing_entries(&String::from_utf8_lossy(&bytes)).is_empty(),
            Err(e) => {
                // Let apply surface the error.
                tracing::warn!(error = %e, "Cannot read .gitignore");
                true
            }
        }
    }

    fn apply(&self, ctx: &MigrationContext<'_>, dry_run: bool) -> MigrationResult {
        let path = ctx.layout.gitignore();
        let original = match read_ignore_file(ctx.layout) {
            Ok(bytes) => bytes,
            Err(e) => {
                return MigrationResult::failure(format!("Cannot read {}: {e}", path.display()))
            }
        };

        let missing = missing_entries(&String::from_utf8_lossy(&original));
        let mut result = MigrationResult::success();
        if missing.is_empty() {
            return result;
        }

        if !dry_run {
            let updated = append_entries(&original, &missing);
            if let Err(e) = atomic_write(&path, &updated) {
                return MigrationResult::failure(format!("Cannot write {}: {e}", path.display()));
            }
            tracing::debug!(added = missing.len(), "Augmented .gitignore");
        }
        result.add_changed(path);
        result
    }
}
