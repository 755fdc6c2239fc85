//! Settings for the kitty upgrade engine.
//!
//! The [`Settings`] struct holds the few knobs an embedding tool can turn:
//! logging, where packaged assets live, and the metadata file name. Values are
//! loaded through [`settings_loader`](crate::settings_loader).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The default name of the metadata file inside the control directory.
pub const DEFAULT_METADATA_FILE: &str = "metadata.json";

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use kitty_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(!settings.debug);
/// assert_eq!(settings.metadata_file_name, "metadata.json");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Logging ──────────────────────────────────────────────────────

    /// Whether to emit pretty, human-readable logs instead of JSON.
    pub debug: bool,
    /// The log level filter (e.g. "info", "debug", "kitty_upgrade=trace").
    pub log_level: String,

    // ── Assets ───────────────────────────────────────────────────────

    /// Directory holding packaged assets used by provisioning migrations.
    ///
    /// When unset, provisioning migrations report their resources as
    /// unavailable.
    pub assets_dir: Option<PathBuf>,

    // ── Metadata ─────────────────────────────────────────────────────

    /// File name of the project metadata inside the control directory.
    pub metadata_file_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            assets_dir: None,
            metadata_file_name: DEFAULT_METADATA_FILE.to_string(),
        }
    }
}
