//! On-disk layout of a kitty project.
//!
//! [`ProjectLayout`] resolves the well-known paths of a project root, for
//! both the current and the legacy naming schemes. It never touches the
//! filesystem except for existence checks.

use std::path::{Path, PathBuf};

use kitty_core::settings::DEFAULT_METADATA_FILE;

/// Current name of the internal control directory.
pub const CONTROL_DIR: &str = ".kittify";
/// Legacy name of the internal control directory.
pub const LEGACY_CONTROL_DIR: &str = ".specify";
/// Current name of the specs directory.
pub const SPECS_DIR: &str = "kitty-specs";
/// Legacy name of the specs directory.
pub const LEGACY_SPECS_DIR: &str = "specs";
/// The ignore file augmented by upgrades.
pub const GITIGNORE: &str = ".gitignore";
/// Shared command sources inside the control directory.
pub const COMMANDS_DIR: &str = "commands";
/// Mission definitions inside the control directory.
pub const MISSIONS_DIR: &str = "missions";
/// Dashboard scratch directory inside the control directory, never committed.
pub const DASHBOARD_DIR: &str = ".dashboard";

/// A per-tool integration directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integration {
    /// Short integration name.
    pub name: &'static str,
    /// Directory at the project root owned by the tool.
    pub root: &'static str,
    /// Where the tool reads its command files, relative to the project root.
    pub commands_dir: &'static str,
}

/// Every integration the engine knows how to upgrade.
pub const INTEGRATIONS: &[Integration] = &[
    Integration { name: "claude", root: ".claude", commands_dir: ".claude/commands" },
    Integration { name: "gemini", root: ".gemini", commands_dir: ".gemini/commands" },
    Integration { name: "cursor", root: ".cursor", commands_dir: ".cursor/commands" },
    Integration { name: "codex", root: ".codex", commands_dir: ".codex/prompts" },
    Integration { name: "opencode", root: ".opencode", commands_dir: ".opencode/command" },
    Integration { name: "windsurf", root: ".windsurf", commands_dir: ".windsurf/workflows" },
    Integration { name: "qwen", root: ".qwen", commands_dir: ".qwen/commands" },
    Integration { name: "kilocode", root: ".kilocode", commands_dir: ".kilocode/workflows" },
    Integration { name: "roo", root: ".roo", commands_dir: ".roo/commands" },
    Integration { name: "amazonq", root: ".amazonq", commands_dir: ".amazonq/prompts" },
];

/// Path resolution for one project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    metadata_file_name: String,
}

impl ProjectLayout {
    /// Creates a layout for `root` with the default metadata file name.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata_file_name: DEFAULT_METADATA_FILE.to_string(),
        }
    }

    /// Overrides the metadata file name.
    pub fn with_metadata_file_name(mut self, name: impl Into<String>) -> Self {
        self.metadata_file_name = name.into();
        self
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a root-relative path.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// The current-scheme control directory (`.kittify/`).
    pub fn kittify_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    /// The legacy control directory (`.specify/`).
    pub fn legacy_control_dir(&self) -> PathBuf {
        self.root.join(LEGACY_CONTROL_DIR)
    }

    /// The control directory that currently owns the metadata file.
    ///
    /// Prefers `.kittify/`, falls back to a legacy `.specify/`, and otherwise
    /// names `.kittify/` as the place a new file would go.
    pub fn control_dir(&self) -> PathBuf {
        let current = self.kittify_dir();
        if current.is_dir() {
            return current;
        }
        let legacy = self.legacy_control_dir();
        if legacy.is_dir() {
            return legacy;
        }
        current
    }

    /// Whether any control directory exists.
    pub fn has_control_dir(&self) -> bool {
        self.kittify_dir().is_dir() || self.legacy_control_dir().is_dir()
    }

    /// The metadata file inside [`control_dir`](Self::control_dir).
    pub fn metadata_path(&self) -> PathBuf {
        self.control_dir().join(&self.metadata_file_name)
    }

    /// Name of the metadata file inside a control directory.
    pub fn metadata_file_name(&self) -> &str {
        &self.metadata_file_name
    }

    /// Where a legacy `.specify/` keeps its metadata file.
    ///
    /// Equal to [`metadata_path`](Self::metadata_path) when `.specify/` is
    /// the only control directory.
    pub fn legacy_metadata_path(&self) -> PathBuf {
        self.legacy_control_dir().join(&self.metadata_file_name)
    }

    /// The current-scheme specs directory.
    pub fn specs_dir(&self) -> PathBuf {
        self.root.join(SPECS_DIR)
    }

    /// The legacy specs directory.
    pub fn legacy_specs_dir(&self) -> PathBuf {
        self.root.join(LEGACY_SPECS_DIR)
    }

    /// The project's ignore file.
    pub fn gitignore(&self) -> PathBuf {
        self.root.join(GITIGNORE)
    }

    /// Shared command sources (`.kittify/commands/`).
    pub fn commands_dir(&self) -> PathBuf {
        self.kittify_dir().join(COMMANDS_DIR)
    }

    /// Mission definitions (`.kittify/missions/`).
    pub fn missions_dir(&self) -> PathBuf {
        self.kittify_dir().join(MISSIONS_DIR)
    }

    /// Integrations whose root directory exists in this project.
    pub fn present_integrations(&self) -> Vec<&'static Integration> {
        INTEGRATIONS
            .iter()
            .filter(|integration| self.root.join(integration.root).is_dir())
            .collect()
    }
}
