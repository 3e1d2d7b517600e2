// ─── Registry ───
// The CurseForge API seam. The engine only talks to `Registry`; the
// reqwest-backed implementation lives in `client.rs`.

pub mod client;
pub mod model;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::error::InstallResult;

pub use client::{CurseForgeClient, FetchOptions};
pub use model::{Category, CategoryInfo, CurseForgeFile, CurseForgeMod};

/// Outcome reported through the download status callback. Only used
/// for logging; "already exists" never re-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    SkipFileExists,
    Downloaded,
}

/// Callback invoked once per download attempt with the status, source
/// URL, and destination file.
pub type StatusHandler = dyn Fn(DownloadStatus, &str, &Path) + Send + Sync;

/// Client interface to the content registry. Safe for concurrent use;
/// the implementation owns all sockets and connection pooling.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Look up a modpack project by its slug.
    async fn search_mod(
        &self,
        slug: &str,
        categories: &CategoryInfo,
    ) -> InstallResult<CurseForgeMod>;

    /// Load the content-class taxonomy, keeping the named class slugs
    /// and resolving the class id of `pack_category_slug`.
    async fn load_category_info(
        &self,
        class_slugs: &[&str],
        pack_category_slug: &str,
    ) -> InstallResult<CategoryInfo>;

    /// Pick the modpack file to install: the project's main file, or
    /// the newest file whose name contains `file_matcher`.
    async fn resolve_modpack_file(
        &self,
        project: &CurseForgeMod,
        file_matcher: Option<&str>,
    ) -> InstallResult<CurseForgeFile>;

    /// Fetch one file's metadata. `None` when the registry reports the
    /// file as unknown; transport failures are errors.
    async fn mod_file_info(
        &self,
        mod_id: u32,
        file_id: u32,
    ) -> InstallResult<Option<CurseForgeFile>>;

    /// Fetch one project's metadata.
    async fn mod_info(&self, project_id: u32) -> InstallResult<CurseForgeMod>;

    /// Resolve a project slug to its numeric id within the applicable
    /// content classes.
    async fn slug_to_id(&self, categories: &CategoryInfo, slug: &str) -> InstallResult<u32>;

    /// Download `file` into `base_dir`, skipping when the destination
    /// already exists. Returns the destination path.
    async fn download(
        &self,
        file: &CurseForgeFile,
        base_dir: &Path,
        status: &StatusHandler,
    ) -> InstallResult<PathBuf>;

    /// Download `file` to a fresh temporary path with the given
    /// extension. The caller owns (and deletes) the returned file.
    async fn download_temp(
        &self,
        file: &CurseForgeFile,
        ext: &str,
        status: &StatusHandler,
    ) -> InstallResult<PathBuf>;
}
