// ─── Pack Manifest ───
// The `manifest.json` a CurseForge modpack ships, read either out of
// the pack zip or from a standalone file, plus the pseudo-ID hashing
// used when the registry never assigned the pack a real identity.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::core::error::{InstallResult, InstallerError};

pub const MODPACK_MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ManifestType {
    #[serde(rename = "minecraftModpack")]
    MinecraftModpack,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackManifest {
    pub name: String,
    pub version: Option<String>,
    pub manifest_type: ManifestType,
    /// Directory inside the pack zip holding verbatim server files.
    #[serde(default = "default_overrides_dir")]
    pub overrides: String,
    pub minecraft: MinecraftSpec,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

fn default_overrides_dir() -> String {
    "overrides".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftSpec {
    pub version: String,
    #[serde(default)]
    pub mod_loaders: Vec<ModLoaderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModLoaderEntry {
    /// `<family>-<version>`, e.g. `forge-47.1.0`.
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

/// One `(projectID, fileID)` reference in the pack's file list.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    #[serde(rename = "projectID")]
    pub project_id: u32,
    #[serde(rename = "fileID")]
    pub file_id: u32,
    #[serde(default)]
    pub required: bool,
}

impl PackManifest {
    /// Pull `manifest.json` out of a modpack zip.
    pub fn from_archive(modpack_zip: &Path) -> InstallResult<Self> {
        let file = File::open(modpack_zip).map_err(|e| InstallerError::io(modpack_zip, e))?;
        let mut archive = ZipArchive::new(file)?;

        let entry = match archive.by_name(MODPACK_MANIFEST_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(InstallerError::InvalidModpack(
                    "Modpack file is missing a manifest. \
                     Make sure to reference a client modpack file."
                        .into(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_reader(entry)?)
    }

    /// Parse a standalone manifest file.
    pub fn from_file(manifest_path: &Path) -> InstallResult<Self> {
        let file = File::open(manifest_path).map_err(|e| InstallerError::io(manifest_path, e))?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Reject anything that is not a Minecraft modpack manifest.
    pub fn ensure_minecraft_modpack(&self) -> InstallResult<()> {
        if self.manifest_type != ManifestType::MinecraftModpack {
            return Err(InstallerError::InvalidModpack(
                "The file provided does not seem to be a Minecraft modpack".into(),
            ));
        }
        Ok(())
    }

    /// The single loader entry marked primary.
    pub fn primary_loader(&self) -> InstallResult<&ModLoaderEntry> {
        self.minecraft
            .mod_loaders
            .iter()
            .find(|l| l.primary)
            .ok_or_else(|| {
                InstallerError::InvalidModpack(
                    "Unable to find primary mod loader in modpack".into(),
                )
            })
    }

    /// Stand-in for a registry mod id when installing from a zip or a
    /// bare manifest: a stable hash of the pack name.
    pub fn pseudo_mod_id(&self) -> u32 {
        java_string_hash(&self.name).unsigned_abs()
    }

    /// Stand-in for a registry file id: a stable, order-sensitive hash
    /// of every `(projectID, fileID)` pair in the manifest.
    pub fn pseudo_file_id(&self) -> u32 {
        let mut hash: i32 = 7;
        for file in &self.files {
            hash = hash.wrapping_mul(31).wrapping_add(file.project_id as i32);
            hash = hash.wrapping_mul(31).wrapping_add(file.file_id as i32);
        }
        hash.unsigned_abs()
    }
}

/// 31-multiplier string hash over UTF-16 code units with i32
/// wraparound, so pseudo ids match manifests written by other tools
/// and never vary across hosts.
fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}
