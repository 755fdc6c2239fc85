//! Packaged asset lookup for provisioning migrations.
//!
//! Provisioning migrations never read packaged files directly. They ask an
//! [`AssetProvider`] for a resource by name; a missing resource is reported as
//! [`KittyError::ResourceUnavailable`] so the run can label it as an
//! environment problem instead of crashing.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use kitty_core::{KittyError, Settings};

/// A source of packaged assets.
///
/// Asset names are `/`-separated relative paths such as
/// `missions/software-dev/mission.yaml`.
pub trait AssetProvider: Send + Sync {
    /// Returns the bytes of the named asset.
    ///
    /// Returns [`KittyError::ResourceUnavailable`] when the asset does not
    /// exist in this provider.
    fn lookup(&self, name: &str) -> Result<Vec<u8>, KittyError>;
}

/// Assets stored under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    /// The directory asset names are resolved against.
    pub location: PathBuf,
}

impl DirectoryAssets {
    /// Creates a provider rooted at `location`.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Returns the filesystem path for an asset name, refusing names that
    /// would escape the asset directory.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || name.is_empty() {
            return None;
        }
        Some(self.location.join(relative))
    }
}

impl AssetProvider for DirectoryAssets {
    fn lookup(&self, name: &str) -> Result<Vec<u8>, KittyError> {
        let unavailable = || KittyError::ResourceUnavailable {
            resource: name.to_string(),
        };
        let path = self.path(name).ok_or_else(unavailable)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => unavailable(),
            _ => KittyError::IoError(e),
        })
    }
}

/// Assets held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    assets: HashMap<String, Vec<u8>>,
}

impl InMemoryAssets {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an asset.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.assets.insert(name.into(), content.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    /// Number of stored assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether no assets are stored.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetProvider for InMemoryAssets {
    fn lookup(&self, name: &str) -> Result<Vec<u8>, KittyError> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| KittyError::ResourceUnavailable {
                resource: name.to_string(),
            })
    }
}

/// A provider for installations that ship no assets at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetProvider for NoAssets {
    fn lookup(&self, name: &str) -> Result<Vec<u8>, KittyError> {
        Err(KittyError::ResourceUnavailable {
            resource: name.to_string(),
        })
    }
}

/// Builds the provider described by `settings.assets_dir`.
pub fn assets_from_settings(settings: &Settings) -> Box<dyn AssetProvider> {
    match &settings.assets_dir {
        Some(dir) => Box::new(DirectoryAssets::new(dir.clone())),
        None => {
            tracing::debug!("No assets directory configured; provisioning will be unavailable");
            Box::new(NoAssets)
        }
    }
}
