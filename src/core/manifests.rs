// ─── Persisted Manifest ───
// `curseforge.json` at the output root records everything a previous
// install wrote, so the next run can short-circuit, reconcile, or
// clean up files that are no longer referenced.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{InstallResult, InstallerError};

pub const MANIFEST_FILE_NAME: &str = "curseforge.json";

/// Install state persisted at `<output>/curseforge.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeManifest {
    pub slug: Option<String>,
    pub modpack_name: String,
    pub modpack_version: Option<String>,
    pub file_name: String,
    /// Registry project id, or a pseudo id for zip/manifest installs.
    pub mod_id: u32,
    /// Registry file id, or a pseudo id for zip/manifest installs.
    pub file_id: u32,
    pub minecraft_version: Option<String>,
    pub mod_loader_id: Option<String>,
    pub level_name: Option<String>,
    /// Output-root-relative, forward-slash paths of every file written.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Load the persisted manifest, if any.
pub fn load(output_dir: &Path) -> InstallResult<Option<CurseForgeManifest>> {
    let path = output_dir.join(MANIFEST_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| InstallerError::io(&path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Persist the manifest atomically: write a sibling temp file, then
/// rename over the destination.
pub fn save(output_dir: &Path, manifest: &CurseForgeManifest) -> InstallResult<()> {
    let path = output_dir.join(MANIFEST_FILE_NAME);
    let temp = output_dir.join(format!("{MANIFEST_FILE_NAME}.tmp"));

    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&temp, json).map_err(|e| InstallerError::io(&temp, e))?;
    std::fs::rename(&temp, &path).map_err(|e| InstallerError::io(&path, e))?;

    debug!("Saved manifest {:?}", path);
    Ok(())
}

/// True iff every file the manifest tracks is still on disk.
pub fn all_files_present(output_dir: &Path, manifest: &CurseForgeManifest) -> bool {
    manifest.files.iter().all(|f| output_dir.join(f).exists())
}

/// Normalize absolute paths to output-root-relative, forward-slash
/// strings. Paths outside the root are kept as-is (lossy) rather than
/// dropped, so the cleanup accounting never loses a file.
pub fn relativize_all(output_dir: &Path, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let rel = p.strip_prefix(output_dir).unwrap_or(p);
            normalize_slashes(rel)
        })
        .collect()
}

fn normalize_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Delete files tracked by the prior manifest but absent from the new
/// one, pruning directories that end up empty.
pub fn cleanup(
    output_dir: &Path,
    prior: Option<&CurseForgeManifest>,
    new: &CurseForgeManifest,
) -> InstallResult<()> {
    let Some(prior) = prior else {
        return Ok(());
    };

    let keep: HashSet<&str> = new.files.iter().map(String::as_str).collect();

    for old in &prior.files {
        if keep.contains(old.as_str()) {
            continue;
        }

        let path = output_dir.join(old);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed old file {}", old),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(InstallerError::io(&path, e)),
        }

        prune_empty_dirs(output_dir, &path);
    }

    Ok(())
}

/// Walk from the removed file's directory up toward the output root,
/// removing each directory that is now empty.
fn prune_empty_dirs(output_dir: &Path, removed: &Path) {
    let mut dir = removed.parent();
    while let Some(current) = dir {
        if current == output_dir || !current.starts_with(output_dir) {
            break;
        }
        if std::fs::remove_dir(current).is_err() {
            // Not empty (or already gone); nothing above it can be empty either.
            break;
        }
        debug!("Pruned empty directory {:?}", current);
        dir = current.parent();
    }
}

/// Drop manifest entries living under a world directory, detected by
/// any tracked `level.dat`. Adapts manifests written before world
/// contents stopped being tracked; applying it twice is a no-op.
pub fn trim_level_content(manifest: &mut CurseForgeManifest) {
    let level_dir = manifest.files.iter().find_map(|f| {
        let path = Path::new(f);
        if path.file_name().is_some_and(|n| n == "level.dat") {
            path.parent().map(|p| normalize_slashes(p))
        } else {
            None
        }
    });

    if let Some(prefix) = level_dir {
        warn!(
            "Dropping world entries under '{}' from a previous manifest",
            prefix
        );
        manifest.files.retain(|f| !f.starts_with(&prefix));
    }
}
