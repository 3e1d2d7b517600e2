// ─── Mod Loaders ───
// Server-side loader installers plus the dispatcher that picks one
// from a pack's `<family>-<version>` loader id.

pub mod fabric;
pub mod forge;

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use crate::core::error::{InstallResult, InstallerError};

use fabric::FabricInstaller;
use forge::ForgeInstaller;

/// One loader family's server installer.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        output_dir: &Path,
        results_file: Option<&Path>,
    ) -> InstallResult<()>;
}

/// Seam between the orchestrator and the loader installers, so install
/// flows can be exercised without touching Maven or Fabric Meta.
#[async_trait]
pub trait ModLoaderPreparer: Send + Sync {
    async fn prepare(
        &self,
        mod_loader_id: &str,
        minecraft_version: &str,
        output_dir: &Path,
        results_file: Option<&Path>,
    ) -> InstallResult<()>;
}

/// Split a loader id such as `forge-47.1.0` into family and version.
/// A missing separator is a malformed pack, not an unknown family.
pub fn parse_loader_id(id: &str) -> InstallResult<(&str, &str)> {
    id.split_once('-')
        .ok_or_else(|| InstallerError::Loader(format!("Unknown modloader ID: {id}")))
}

pub struct LoaderDispatcher {
    http: reqwest::Client,
}

impl LoaderDispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for LoaderDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModLoaderPreparer for LoaderDispatcher {
    async fn prepare(
        &self,
        mod_loader_id: &str,
        minecraft_version: &str,
        output_dir: &Path,
        results_file: Option<&Path>,
    ) -> InstallResult<()> {
        let (family, version) = parse_loader_id(mod_loader_id)?;

        match family {
            "forge" => {
                ForgeInstaller::new(self.http.clone())
                    .install(minecraft_version, version, output_dir, results_file)
                    .await
            }
            "fabric" => {
                FabricInstaller::new(self.http.clone())
                    .install(minecraft_version, version, output_dir, results_file)
                    .await
            }
            other => {
                warn!("Ignoring unsupported mod loader family '{}'", other);
                Ok(())
            }
        }
    }
}

/// Fetch a jar to `dest`, failing on any non-success status.
pub(crate) async fn download_jar(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> InstallResult<()> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(InstallerError::Loader(format!(
            "Download of {url} failed with HTTP {status}"
        )));
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallerError::io(parent, e))?;
    }
    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| InstallerError::io(dest, e))
}
