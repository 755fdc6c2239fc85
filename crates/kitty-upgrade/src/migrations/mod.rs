//! The built-in migrations.
//!
//! Each submodule holds one family of transformations:
//!
//! - [`rename`] - structural directory renames
//! - [`gitignore`] - ignore-file augmentation
//! - [`commands`] - command duplication into integration directories
//! - [`missions`] - mission provisioning from packaged assets

pub mod commands;
pub mod gitignore;
pub mod missions;
pub mod rename;

pub use commands::IntegrationCommands;
pub use gitignore::GitignoreAugmentation;
pub use missions::MissionProvisioning;
pub use rename::DirectoryRename;

use crate::migration::Migration;

/// Every built-in migration, in registration order.
///
/// New migrations go at the end.
pub fn builtin() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(DirectoryRename::control_dir()),
        Box::new(DirectoryRename::specs_dir()),
        Box::new(GitignoreAugmentation),
        Box::new(IntegrationCommands),
        Box::new(MissionProvisioning),
    ]
}
