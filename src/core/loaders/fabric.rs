use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::error::InstallResult;
use crate::core::results::ResultsFileWriter;

use super::{download_jar, LoaderInstaller};

const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";

/// Installer release used for the bundled server launcher jar.
const FABRIC_INSTALLER_VERSION: &str = "1.0.1";

/// Installs Fabric by downloading the self-contained server launcher
/// jar from Fabric Meta.
pub struct FabricInstaller {
    http: reqwest::Client,
}

impl FabricInstaller {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        output_dir: &Path,
        results_file: Option<&Path>,
    ) -> InstallResult<()> {
        let launcher_name = format!(
            "fabric-server-mc.{minecraft_version}-loader.{loader_version}-launcher.{FABRIC_INSTALLER_VERSION}.jar"
        );
        let launcher_path = output_dir.join(&launcher_name);

        if launcher_path.exists() {
            debug!("Fabric server launcher {} is already present", launcher_name);
        } else {
            info!(
                "Installing Fabric loader {} for Minecraft {}",
                loader_version, minecraft_version
            );

            let url = format!(
                "{FABRIC_META_BASE}/versions/loader/{minecraft_version}/{loader_version}/{FABRIC_INSTALLER_VERSION}/server/jar"
            );
            download_jar(&self.http, &url, &launcher_path).await?;

            info!("Fabric loader {} installed", loader_version);
        }

        if let Some(results) = results_file {
            let mut writer = ResultsFileWriter::append(results)?;
            writer.write("SERVER", &launcher_path.to_string_lossy())?;
        }

        Ok(())
    }
}
