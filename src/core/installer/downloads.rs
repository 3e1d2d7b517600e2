// ─── Referenced File Downloads ───
// Classifies every (projectID, fileID) the pack references, filters
// out client-only mods, and fans the downloads out concurrently.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::core::error::{InstallResult, InstallerError};
use crate::core::pack::FileRef;
use crate::core::registry::{CategoryInfo, CurseForgeFile, DownloadStatus, Registry};

use super::excludes::ExcludeIncludeIds;
use super::world::extract_world_zip;
use super::{LevelFrom, PathWithInfo};

/// Parallel download fan-out width.
const CONCURRENT_DOWNLOADS: usize = 8;

/// The three destination subtrees, created before any download runs.
#[derive(Debug)]
pub struct OutputPaths {
    pub mods_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub worlds_dir: PathBuf,
}

impl OutputPaths {
    pub fn create(output_dir: &Path) -> InstallResult<Self> {
        let mods_dir = output_dir.join("mods");
        let plugins_dir = output_dir.join("plugins");
        let worlds_dir = output_dir.join("saves");
        for dir in [&mods_dir, &plugins_dir, &worlds_dir] {
            std::fs::create_dir_all(dir).map_err(|e| InstallerError::io(dir, e))?;
        }
        Ok(Self {
            mods_dir,
            plugins_dir,
            worlds_dir,
        })
    }
}

/// Download every required, non-excluded reference. Results arrive in
/// completion order; overrides wait until the whole vector is in.
pub async fn download_all(
    registry: &Arc<dyn Registry>,
    categories: &CategoryInfo,
    output_dir: &Path,
    output_paths: &OutputPaths,
    files: &[FileRef],
    ids: &ExcludeIncludeIds,
    level_from: Option<LevelFrom>,
) -> InstallResult<Vec<PathWithInfo>> {
    let results: Vec<InstallResult<Option<PathWithInfo>>> = stream::iter(
        files
            .iter()
            .filter(|f| f.required)
            .filter(|f| !ids.excludes.contains(&f.project_id)),
    )
    .map(|file_ref| {
        download_file(
            registry.as_ref(),
            categories,
            output_dir,
            output_paths,
            file_ref,
            &ids.force_includes,
            level_from,
        )
    })
    .buffer_unordered(CONCURRENT_DOWNLOADS)
    .collect()
    .await;

    let mut paths = Vec::new();
    for result in results {
        if let Some(path) = result? {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Resolve, filter, and fetch a single referenced project file into
/// the subtree its category selects.
async fn download_file(
    registry: &dyn Registry,
    categories: &CategoryInfo,
    output_dir: &Path,
    output_paths: &OutputPaths,
    file_ref: &FileRef,
    force_include_ids: &HashSet<u32>,
    level_from: Option<LevelFrom>,
) -> InstallResult<Option<PathWithInfo>> {
    let project_id = file_ref.project_id;
    let file_id = file_ref.file_id;

    let mod_info = registry.mod_info(project_id).await?;

    let category = mod_info
        .class_id
        .and_then(|id| categories.content_class_ids.get(&id));
    let Some(category) = category else {
        debug!(
            "Skipping project={} slug={} file={} since it is not an applicable classId={:?}",
            project_id, mod_info.slug, file_id, mod_info.class_id
        );
        return Ok(None);
    };

    let (base_dir, is_world) = if category.slug.ends_with("-mods") {
        (&output_paths.mods_dir, false)
    } else if category.slug.ends_with("-plugins") {
        (&output_paths.plugins_dir, false)
    } else if category.slug == "worlds" {
        (&output_paths.worlds_dir, true)
    } else {
        return Err(InstallerError::Other(format!(
            "Unsupported category type={} from mod={}",
            category.slug, mod_info.slug
        )));
    };

    let file = registry
        .mod_file_info(project_id, file_id)
        .await?
        .ok_or_else(|| {
            InstallerError::Other(format!(
                "Unable to resolve file {file_id} of mod {}",
                mod_info.slug
            ))
        })?;

    if !force_include_ids.contains(&project_id) && !is_server_mod(&file) {
        debug!("Skipping {} since it is a client mod", file.file_name);
        return Ok(None);
    }

    // Display names are often non-descriptive ("v1.0.0"); prefer the
    // file name in logs.
    debug!(
        "Download/confirm mod {} @ {}:{}",
        file.file_name, project_id, file_id
    );

    if file.download_url.is_none() {
        warn!(
            "The authors of the mod '{}' have disallowed project distribution. \
             Manually download the file '{}' from {} and supply the mod file separately.",
            mod_info.name,
            file.display_name,
            mod_info.website_url().unwrap_or("their project page")
        );
        return Ok(None);
    }

    let output_dir_owned = output_dir.to_path_buf();
    let status = move |status: DownloadStatus, _url: &str, f: &Path| {
        let shown = f.strip_prefix(&output_dir_owned).unwrap_or(f);
        match status {
            DownloadStatus::SkipFileExists => {
                info!("Mod file {} already exists", shown.display())
            }
            DownloadStatus::Downloaded => info!("Downloaded mod file {}", shown.display()),
        }
    };

    let path = registry.download(&file, base_dir, &status).await?;

    if is_world {
        extract_world_zip(
            &mod_info.slug,
            &path,
            &output_paths.worlds_dir,
            output_dir,
            level_from,
        )
        .map(Some)
    } else {
        Ok(Some(PathWithInfo::plain(path)))
    }
}

/// Whether a file is usable on a server:
/// - marked server: yes, regardless of any client marker
/// - marked client only: no
/// - unmarked: treated as a library, yes
fn is_server_mod(file: &CurseForgeFile) -> bool {
    let mut client = false;
    for entry in &file.game_versions {
        if entry.eq_ignore_ascii_case("server") {
            return true;
        }
        if entry.eq_ignore_ascii_case("client") {
            client = true;
        }
    }
    !client
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::testing::{category_info, MockRegistry};
    use crate::core::registry::CurseForgeMod;

    fn file_with_versions(versions: &[&str]) -> CurseForgeFile {
        serde_json::from_value(serde_json::json!({
            "id": 2001,
            "modId": 1001,
            "displayName": "TestMod",
            "fileName": "testmod-1.0.jar",
            "downloadUrl": "https://edge.example/testmod-1.0.jar",
            "gameVersions": versions,
        }))
        .unwrap()
    }

    #[test]
    fn server_marker_always_wins() {
        assert!(is_server_mod(&file_with_versions(&["1.20.1", "Server"])));
        assert!(is_server_mod(&file_with_versions(&["Client", "Server"])));
    }

    #[test]
    fn client_only_files_are_rejected() {
        assert!(!is_server_mod(&file_with_versions(&["1.20.1", "Client"])));
    }

    #[test]
    fn unmarked_files_count_as_libraries() {
        assert!(is_server_mod(&file_with_versions(&["1.20.1"])));
        assert!(is_server_mod(&file_with_versions(&[])));
    }

    fn test_mod(project_id: u32, slug: &str, class_id: u32) -> CurseForgeMod {
        serde_json::from_value(serde_json::json!({
            "id": project_id,
            "name": slug,
            "slug": slug,
            "classId": class_id,
        }))
        .unwrap()
    }

    fn refs(pairs: &[(u32, u32)]) -> Vec<FileRef> {
        pairs
            .iter()
            .map(|&(project_id, file_id)| FileRef {
                project_id,
                file_id,
                required: true,
            })
            .collect()
    }

    #[tokio::test]
    async fn downloads_mods_into_the_mods_subtree() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::create(tmp.path()).unwrap();

        let mut registry = MockRegistry::new();
        registry.mods.insert(1001, test_mod(1001, "testmod", 6));
        registry
            .files
            .insert((1001, 2001), file_with_versions(&["1.20.1", "Server"]));
        let registry: Arc<dyn Registry> = Arc::new(registry);

        let result = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &refs(&[(1001, 2001)]),
            &ExcludeIncludeIds::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, tmp.path().join("mods/testmod-1.0.jar"));
        assert!(result[0].path.exists());
    }

    #[tokio::test]
    async fn client_mod_is_skipped_unless_force_included() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::create(tmp.path()).unwrap();

        let mut registry = MockRegistry::new();
        registry.mods.insert(1001, test_mod(1001, "minimap", 6));
        registry
            .files
            .insert((1001, 2001), file_with_versions(&["1.20.1", "Client"]));
        let registry: Arc<dyn Registry> = Arc::new(registry);

        let skipped = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &refs(&[(1001, 2001)]),
            &ExcludeIncludeIds::default(),
            None,
        )
        .await
        .unwrap();
        assert!(skipped.is_empty());

        let forced_ids = ExcludeIncludeIds {
            force_includes: HashSet::from([1001]),
            ..Default::default()
        };
        let forced = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &refs(&[(1001, 2001)]),
            &forced_ids,
            None,
        )
        .await
        .unwrap();
        assert_eq!(forced.len(), 1);
    }

    #[tokio::test]
    async fn inapplicable_class_is_skipped_without_file_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::create(tmp.path()).unwrap();

        // classId 12 is resource packs: not in the applicable set.
        let mut registry = MockRegistry::new();
        registry.mods.insert(1001, test_mod(1001, "shaders", 12));
        let registry: Arc<dyn Registry> = Arc::new(registry);

        let result = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &refs(&[(1001, 2001)]),
            &ExcludeIncludeIds::default(),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn missing_download_url_warns_and_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::create(tmp.path()).unwrap();

        let mut no_url = file_with_versions(&["Server"]);
        no_url.download_url = None;

        let mut registry = MockRegistry::new();
        registry.mods.insert(1001, test_mod(1001, "optout", 6));
        registry.files.insert((1001, 2001), no_url);
        let registry: Arc<dyn Registry> = Arc::new(registry);

        let result = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &refs(&[(1001, 2001)]),
            &ExcludeIncludeIds::default(),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn not_required_references_are_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::create(tmp.path()).unwrap();

        // Reject-all registry proves the reference is never looked up.
        let mut registry = MockRegistry::new();
        registry.reject_content_calls = true;
        let registry: Arc<dyn Registry> = Arc::new(registry);

        let mut optional = refs(&[(1001, 2001)]);
        optional[0].required = false;

        let result = download_all(
            &registry,
            &category_info(),
            tmp.path(),
            &paths,
            &optional,
            &ExcludeIncludeIds::default(),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }
}
