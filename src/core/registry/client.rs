// ─── CurseForge Client ───
// reqwest-backed implementation of the `Registry` trait against the
// CurseForge v1 API. One shared `Client` owns all sockets and pooling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::core::error::{InstallResult, InstallerError};

use super::model::{Category, CategoryInfo, CurseForgeFile, CurseForgeMod, DataEnvelope};
use super::{DownloadStatus, Registry, StatusHandler};

pub const DEFAULT_API_BASE_URL: &str = "https://api.curseforge.com/v1";

/// CurseForge game id for Minecraft.
const MINECRAFT_GAME_ID: &str = "432";

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP tuning knobs, all optional.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub response_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub connection_pool_max_idle_timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(30),
            connection_pool_max_idle_timeout: None,
        }
    }
}

pub struct CurseForgeClient {
    http: Client,
    base_url: String,
}

impl CurseForgeClient {
    pub fn new(base_url: &str, api_key: &str, fetch: &FetchOptions) -> InstallResult<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|_| InstallerError::Config("API key contains invalid characters".into()))?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let mut builder = Client::builder()
            .user_agent(concat!("cursepack/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(fetch.response_timeout)
            .connect_timeout(fetch.tls_handshake_timeout);
        if let Some(idle) = fetch.connection_pool_max_idle_timeout {
            builder = builder.pool_idle_timeout(idle);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map a non-success response to a typed failure carrying the
    /// status code, so callers can tell 403 and 404 apart.
    fn check_status(url: &str, response: Response) -> InstallResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(InstallerError::FailedRequest {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> InstallResult<T> {
        let response = self.http.get(url).query(query).send().await?;
        let response = Self::check_status(url, response)?;
        Ok(response.json().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> InstallResult<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        let response = Self::check_status(url, response)?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch the file's bytes and verify them against the registry's
    /// SHA-1 when one was supplied.
    async fn fetch_file_bytes(
        &self,
        file: &CurseForgeFile,
        dest: &Path,
    ) -> InstallResult<Vec<u8>> {
        let url = file.download_url.as_deref().ok_or_else(|| {
            InstallerError::Other(format!("File {} has no download URL", file.file_name))
        })?;

        let bytes = self.fetch_bytes(url).await?;

        if let Some(expected) = file.sha1() {
            let mut hasher = Sha1::new();
            hasher.update(&bytes);
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(InstallerError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(bytes)
    }
}

#[async_trait]
impl Registry for CurseForgeClient {
    async fn search_mod(
        &self,
        slug: &str,
        categories: &CategoryInfo,
    ) -> InstallResult<CurseForgeMod> {
        let url = format!("{}/mods/search", self.base_url);
        let class_id = categories.modpack_class_id.to_string();
        let matches: DataEnvelope<Vec<CurseForgeMod>> = self
            .get_json(
                &url,
                &[
                    ("gameId", MINECRAFT_GAME_ID),
                    ("classId", &class_id),
                    ("slug", slug),
                ],
            )
            .await?;

        matches
            .data
            .into_iter()
            .find(|m| m.slug == slug)
            .ok_or_else(|| {
                InstallerError::Other(format!("No modpack project found for slug={slug}"))
            })
    }

    async fn load_category_info(
        &self,
        class_slugs: &[&str],
        pack_category_slug: &str,
    ) -> InstallResult<CategoryInfo> {
        let url = format!("{}/categories", self.base_url);
        let categories: DataEnvelope<Vec<Category>> = self
            .get_json(&url, &[("gameId", MINECRAFT_GAME_ID), ("classesOnly", "true")])
            .await?;

        let modpack_class_id = categories
            .data
            .iter()
            .find(|c| c.slug == pack_category_slug)
            .map(|c| c.id)
            .ok_or_else(|| {
                InstallerError::Other(format!(
                    "Registry did not declare a '{pack_category_slug}' content class"
                ))
            })?;

        let content_class_ids = categories
            .data
            .into_iter()
            .filter(|c| class_slugs.contains(&c.slug.as_str()))
            .map(|c| (c.id, c))
            .collect();

        Ok(CategoryInfo {
            content_class_ids,
            modpack_class_id,
        })
    }

    async fn resolve_modpack_file(
        &self,
        project: &CurseForgeMod,
        file_matcher: Option<&str>,
    ) -> InstallResult<CurseForgeFile> {
        match file_matcher {
            None => {
                let main_file_id = project.main_file_id.ok_or_else(|| {
                    InstallerError::Other(format!(
                        "Project {} does not declare a main file",
                        project.slug
                    ))
                })?;
                self.mod_file_info(project.id, main_file_id)
                    .await?
                    .ok_or_else(|| {
                        InstallerError::Other("Unable to resolve modpack's file".into())
                    })
            }
            Some(matcher) => {
                // latestFiles is ordered oldest-first; prefer the newest match.
                project
                    .latest_files
                    .iter()
                    .rev()
                    .find(|f| f.file_name.contains(matcher))
                    .cloned()
                    .ok_or_else(|| {
                        InstallerError::Config(format!(
                            "No file of project {} matches '{matcher}'",
                            project.slug
                        ))
                    })
            }
        }
    }

    async fn mod_file_info(
        &self,
        mod_id: u32,
        file_id: u32,
    ) -> InstallResult<Option<CurseForgeFile>> {
        let url = format!("{}/mods/{mod_id}/files/{file_id}", self.base_url);
        match self.get_json::<DataEnvelope<CurseForgeFile>>(&url, &[]).await {
            Ok(envelope) => Ok(Some(envelope.data)),
            Err(InstallerError::FailedRequest { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn mod_info(&self, project_id: u32) -> InstallResult<CurseForgeMod> {
        let url = format!("{}/mods/{project_id}", self.base_url);
        let envelope: DataEnvelope<CurseForgeMod> = self.get_json(&url, &[]).await?;
        Ok(envelope.data)
    }

    async fn slug_to_id(&self, categories: &CategoryInfo, slug: &str) -> InstallResult<u32> {
        let url = format!("{}/mods/search", self.base_url);
        let matches: DataEnvelope<Vec<CurseForgeMod>> = self
            .get_json(&url, &[("gameId", MINECRAFT_GAME_ID), ("slug", slug)])
            .await?;

        matches
            .data
            .into_iter()
            .find(|m| {
                m.slug == slug
                    && m.class_id
                        .is_some_and(|id| categories.content_class_ids.contains_key(&id))
            })
            .map(|m| m.id)
            .ok_or_else(|| {
                InstallerError::Config(format!("Unable to resolve project for slug={slug}"))
            })
    }

    async fn download(
        &self,
        file: &CurseForgeFile,
        base_dir: &Path,
        status: &StatusHandler,
    ) -> InstallResult<PathBuf> {
        let dest = base_dir.join(&file.file_name);
        let url = file.download_url.as_deref().unwrap_or_default();

        if dest.exists() {
            status(DownloadStatus::SkipFileExists, url, &dest);
            return Ok(dest);
        }

        let bytes = self.fetch_file_bytes(file, &dest).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io(parent, e))?;
        }
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| InstallerError::io(&dest, e))?;

        debug!("Downloaded {} -> {:?}", url, dest);
        status(DownloadStatus::Downloaded, url, &dest);
        Ok(dest)
    }

    async fn download_temp(
        &self,
        file: &CurseForgeFile,
        ext: &str,
        status: &StatusHandler,
    ) -> InstallResult<PathBuf> {
        let url = file.download_url.as_deref().unwrap_or_default();
        let bytes = self
            .fetch_file_bytes(file, Path::new(&file.file_name))
            .await?;

        let temp = tempfile::Builder::new()
            .prefix("cursepack-")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .map_err(|e| InstallerError::io(std::env::temp_dir(), e))?;
        let dest = temp
            .into_temp_path()
            .keep()
            .map_err(|e| InstallerError::io(std::env::temp_dir(), e.error))?;

        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| InstallerError::io(&dest, e))?;

        status(DownloadStatus::Downloaded, url, &dest);
        Ok(dest)
    }
}
