// ─── Overrides ───
// Streams the pack zip's overrides subtree onto the output root.
// Rules:
// - never overwrite world data that already exists on disk
// - the operator may opt out of overwriting any existing file
// - otherwise the latest pack content wins

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use zip::ZipArchive;

use crate::core::error::{InstallResult, InstallerError};

use super::LevelFrom;

const LEVEL_DAT_SUFFIX: &str = "/level.dat";

#[derive(Debug, Default)]
pub struct OverridesResult {
    /// Files written (or deliberately kept) that the manifest tracks.
    pub paths: Vec<PathBuf>,
    /// World directory name found in the overrides, when the level
    /// policy selects overrides.
    pub level_name: Option<String>,
}

/// Apply every file under `<overrides_dir>/` in the pack zip onto
/// `output_dir`.
pub fn apply_overrides(
    modpack_zip: &Path,
    output_dir: &Path,
    overrides_dir: &str,
    skip_existing: bool,
    level_from: Option<LevelFrom>,
) -> InstallResult<OverridesResult> {
    debug!("Applying overrides from '{}' in zip file", overrides_dir);

    let file = File::open(modpack_zip).map_err(|e| InstallerError::io(modpack_zip, e))?;
    let mut archive = ZipArchive::new(file)?;

    let overrides_prefix = format!("{overrides_dir}/");

    let level_entry_name = find_level_entry(&mut archive, &overrides_prefix)?;
    let level_entry_prefix = level_entry_name.as_ref().map(|n| format!("{n}/"));

    let world_output_dir_exists = level_entry_name
        .as_ref()
        .is_some_and(|n| output_dir.join(n).exists());

    debug!(
        "Found level entry='{:?}' in modpack overrides and worldOutputDirExists={}",
        level_entry_name, world_output_dir_exists
    );

    let mut paths = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().starts_with(&overrides_prefix) {
            continue;
        }
        trace!("Processing override entry={}", entry.name());

        let subpath = entry.name()[overrides_prefix.len()..].to_string();
        let out_path = output_dir.join(&subpath);

        let is_in_world_directory = level_entry_prefix
            .as_ref()
            .is_some_and(|prefix| subpath.starts_with(prefix.as_str()));

        if world_output_dir_exists && is_in_world_directory {
            continue;
        }

        if !(skip_existing && out_path.exists()) {
            debug!("Applying override {}", subpath);
            // Zip files don't always list directories before their
            // files, so create parents as needed.
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
            }
            let mut out =
                File::create(&out_path).map_err(|e| InstallerError::io(&out_path, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| InstallerError::io(&out_path, e))?;
        } else {
            debug!("Skipping override={} since the file already existed", subpath);
        }

        // Track for later cleanup, unless inside a world directory.
        if !is_in_world_directory {
            paths.push(out_path);
        }
    }

    let level_name = match level_from {
        Some(LevelFrom::Overrides) => level_entry_name,
        _ => None,
    };

    Ok(OverridesResult { paths, level_name })
}

/// The world directory inside the overrides: the parent of the first
/// `level.dat` entry, relative to the overrides prefix.
fn find_level_entry(
    archive: &mut ZipArchive<File>,
    overrides_prefix: &str,
) -> InstallResult<Option<String>> {
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let name = entry.name();
        if !entry.is_dir()
            && name.starts_with(overrides_prefix)
            && name.ends_with(LEVEL_DAT_SUFFIX)
        {
            return Ok(Some(
                name[overrides_prefix.len()..name.len() - LEVEL_DAT_SUFFIX.len()].to_string(),
            ));
        }
    }
    Ok(None)
}
