use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::error::{InstallResult, InstallerError};
use crate::core::results::ResultsFileWriter;

use super::{download_jar, LoaderInstaller};

const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";

/// Installs the Forge server by downloading and executing the official
/// installer jar with `--installServer`.
pub struct ForgeInstaller {
    http: reqwest::Client,
}

impl ForgeInstaller {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Locate the server entry point the installer produced. Newer
    /// Forge generates a shim jar or run scripts instead of a plain
    /// server jar.
    fn find_server_jar(output_dir: &Path, forge_id: &str) -> Option<PathBuf> {
        let candidates = [
            format!("forge-{forge_id}.jar"),
            format!("forge-{forge_id}-shim.jar"),
            format!("forge-{forge_id}-universal.jar"),
        ];
        candidates
            .iter()
            .map(|name| output_dir.join(name))
            .find(|p| p.exists())
    }

    async fn run_installer(installer_path: &Path, output_dir: &Path) -> InstallResult<()> {
        let output = tokio::process::Command::new("java")
            .arg("-jar")
            .arg(installer_path)
            .arg("--installServer")
            .arg(output_dir)
            .current_dir(output_dir)
            .output()
            .await
            .map_err(|e| {
                InstallerError::Loader(format!("Unable to execute the Forge installer: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(InstallerError::Loader(format!(
                "Forge installer failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
                output.status.code(),
                stdout,
                stderr
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        output_dir: &Path,
        results_file: Option<&Path>,
    ) -> InstallResult<()> {
        let forge_id = format!("{minecraft_version}-{loader_version}");
        let marker = output_dir.join(format!(".forge-{forge_id}-installed"));

        if marker.exists() {
            debug!("Forge {} is already installed", forge_id);
        } else {
            info!(
                "Installing Forge {} for Minecraft {}",
                loader_version, minecraft_version
            );

            let installer_name = format!("forge-{forge_id}-installer.jar");
            let installer_url = format!(
                "{FORGE_MAVEN}/net/minecraftforge/forge/{forge_id}/{installer_name}"
            );
            let installer_path = output_dir.join(&installer_name);

            download_jar(&self.http, &installer_url, &installer_path).await?;
            Self::run_installer(&installer_path, output_dir).await?;

            let _ = tokio::fs::remove_file(&installer_path).await;
            let _ = tokio::fs::remove_file(
                output_dir.join(format!("{installer_name}.log")),
            )
            .await;

            tokio::fs::write(&marker, b"")
                .await
                .map_err(|e| InstallerError::io(&marker, e))?;

            info!("Forge {} installed", forge_id);
        }

        if let Some(results) = results_file {
            if let Some(server_jar) = Self::find_server_jar(output_dir, &forge_id) {
                let mut writer = ResultsFileWriter::append(results)?;
                writer.write("SERVER", &server_jar.to_string_lossy())?;
            }
        }

        Ok(())
    }
}
