pub mod core;

pub use crate::core::error::{InstallResult, InstallerError};
pub use crate::core::installer::{
    Installer, InstallerOptions, LevelFrom, API_KEY_VAR, MODPACK_ZIP_VAR,
};
pub use crate::core::installer::excludes::ExcludeIncludesContent;
pub use crate::core::registry::{CurseForgeClient, FetchOptions, Registry};
