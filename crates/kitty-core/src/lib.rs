//! # kitty-core
//!
//! Core types shared by the kitty project upgrade engine: the workspace-wide
//! error type, settings and their loaders, and tracing-based logging setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Engine settings
//! - [`settings_loader`] - TOML/JSON/environment settings loading
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{KittyError, KittyResult};
pub use settings::Settings;
