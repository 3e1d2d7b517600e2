// ─── Installer ───
// Top-level install flow: load the prior manifest, decide whether any
// work is needed, resolve and download the pack's references, apply
// overrides, prepare the mod loader, then persist the new manifest
// and reconcile files the pack no longer references.

pub mod downloads;
pub mod excludes;
pub mod overrides;
pub mod world;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::error::{InstallResult, InstallerError};
use crate::core::loaders::{LoaderDispatcher, ModLoaderPreparer};
use crate::core::manifests::{self, CurseForgeManifest};
use crate::core::pack::PackManifest;
use crate::core::registry::client::DEFAULT_API_BASE_URL;
use crate::core::registry::{
    CategoryInfo, CurseForgeClient, DownloadStatus, FetchOptions, Registry,
};
use crate::core::results::ResultsFileWriter;

use downloads::OutputPaths;
use excludes::ExcludeIncludesContent;
use overrides::OverridesResult;

pub const API_KEY_VAR: &str = "CF_API_KEY";
pub const MODPACK_ZIP_VAR: &str = "CF_MODPACK_ZIP";
pub const DEVELOPER_CONSOLE_URL: &str = "https://console.curseforge.com/";

const CATEGORY_SLUG_MODPACKS: &str = "modpacks";
const APPLICABLE_CLASS_SLUGS: [&str; 3] = ["mc-mods", "bukkit-plugins", "worlds"];

/// Where the server's level directory comes from, when the operator
/// wants one selected at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFrom {
    Overrides,
    WorldFile,
}

/// A written file plus, for extracted bundled worlds, the level name.
#[derive(Debug, Clone)]
pub struct PathWithInfo {
    pub path: PathBuf,
    pub level_name: Option<String>,
}

impl PathWithInfo {
    pub fn plain(path: PathBuf) -> Self {
        Self {
            path,
            level_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallerOptions {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub force_synchronize: bool,
    pub exclude_includes: Option<ExcludeIncludesContent>,
    pub level_from: Option<LevelFrom>,
    pub overrides_skip_existing: bool,
    pub fetch: FetchOptions,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            force_synchronize: false,
            exclude_includes: None,
            level_from: None,
            overrides_skip_existing: false,
            fetch: FetchOptions::default(),
        }
    }
}

/// Everything a single install run carries between steps. The registry
/// client is acquired once and released when the context drops.
struct InstallContext {
    slug: String,
    registry: Arc<dyn Registry>,
    categories: CategoryInfo,
    prior_manifest: Option<CurseForgeManifest>,
}

enum EntryPoint<'a> {
    Zip(&'a Path),
    ManifestFile(&'a Path),
    Slug {
        file_matcher: Option<&'a str>,
        file_id: Option<u32>,
    },
}

enum OverridesSource<'a> {
    Zip(&'a Path),
    None,
}

/// Aggregated outcome of a full install, before persistence.
struct ModPackResults {
    name: String,
    version: Option<String>,
    files: Vec<PathBuf>,
    level_name: Option<String>,
    minecraft_version: String,
    mod_loader_id: String,
}

pub struct Installer {
    output_dir: PathBuf,
    results_file: Option<PathBuf>,
    options: InstallerOptions,
    loaders: Arc<dyn ModLoaderPreparer>,
    registry_override: Option<Arc<dyn Registry>>,
}

impl Installer {
    pub fn new(output_dir: PathBuf, results_file: Option<PathBuf>, options: InstallerOptions) -> Self {
        Self {
            output_dir,
            results_file,
            options,
            loaders: Arc::new(LoaderDispatcher::new()),
            registry_override: None,
        }
    }

    /// Substitute the loader installers, e.g. with a recording stub.
    pub fn with_loader_preparer(mut self, loaders: Arc<dyn ModLoaderPreparer>) -> Self {
        self.loaders = loaders;
        self
    }

    /// Substitute the registry client instead of constructing one from
    /// the configured base URL and API key.
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry_override = Some(registry);
        self
    }

    // ── Entry points ────────────────────────────────────

    pub async fn install_from_zip(&self, modpack_zip: &Path, slug: &str) -> InstallResult<()> {
        self.install(slug, EntryPoint::Zip(modpack_zip)).await
    }

    pub async fn install_from_manifest_file(
        &self,
        manifest_path: &Path,
        slug: &str,
    ) -> InstallResult<()> {
        self.install(slug, EntryPoint::ManifestFile(manifest_path))
            .await
    }

    pub async fn install_from_slug(
        &self,
        slug: &str,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> InstallResult<()> {
        self.install(
            slug,
            EntryPoint::Slug {
                file_matcher,
                file_id,
            },
        )
        .await
    }

    // ── Common flow ─────────────────────────────────────

    async fn install(&self, slug: &str, entry: EntryPoint<'_>) -> InstallResult<()> {
        let mut prior = manifests::load(&self.output_dir)?;
        if let Some(manifest) = prior.as_mut() {
            manifests::trim_level_content(manifest);
        }

        let Some(api_key) = self
            .options
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
        else {
            return self.handle_missing_api_key(prior).await;
        };

        let registry: Arc<dyn Registry> = match &self.registry_override {
            Some(registry) => Arc::clone(registry),
            None => Arc::new(CurseForgeClient::new(
                &self.options.api_base_url,
                api_key,
                &self.options.fetch,
            )?),
        };

        match self.dispatch(slug, entry, registry, prior).await {
            Err(InstallerError::FailedRequest { status: 403, .. }) => {
                Err(InstallerError::Config(format!(
                    "Access to {} is forbidden. Make sure to set {} to a valid API key from {}",
                    self.options.api_base_url, API_KEY_VAR, DEVELOPER_CONSOLE_URL
                )))
            }
            other => other,
        }
    }

    async fn handle_missing_api_key(
        &self,
        prior: Option<CurseForgeManifest>,
    ) -> InstallResult<()> {
        match prior {
            Some(prior) => {
                let what = prior
                    .slug
                    .clone()
                    .unwrap_or_else(|| format!("Project ID {}", prior.mod_id));
                warn!(
                    "API key is not set, so will re-use previous modpack installation of {}",
                    what
                );
                warn!(
                    "Obtain an API key from {} and set the environment variable {} \
                     in order to restore full functionality.",
                    DEVELOPER_CONSOLE_URL, API_KEY_VAR
                );
                self.finalize_existing_installation(&prior).await
            }
            None => Err(InstallerError::Config(format!(
                "API key is not set. Obtain an API key from {DEVELOPER_CONSOLE_URL} \
                 and set the environment variable {API_KEY_VAR}"
            ))),
        }
    }

    async fn dispatch(
        &self,
        slug: &str,
        entry: EntryPoint<'_>,
        registry: Arc<dyn Registry>,
        prior: Option<CurseForgeManifest>,
    ) -> InstallResult<()> {
        let categories = registry
            .load_category_info(&APPLICABLE_CLASS_SLUGS, CATEGORY_SLUG_MODPACKS)
            .await?;

        let context = InstallContext {
            slug: slug.to_string(),
            registry,
            categories,
            prior_manifest: prior,
        };

        match entry {
            EntryPoint::Zip(path) => {
                let manifest = PackManifest::from_archive(path)?;
                self.process_pack_manifest(&context, manifest, OverridesSource::Zip(path))
                    .await
            }
            EntryPoint::ManifestFile(path) => {
                let manifest = PackManifest::from_file(path)?;
                self.process_pack_manifest(&context, manifest, OverridesSource::None)
                    .await
            }
            EntryPoint::Slug {
                file_matcher,
                file_id,
            } => {
                self.install_by_retrieving_zip(&context, file_matcher, file_id)
                    .await
            }
        }
    }

    // ── Zip / standalone-manifest installs ──────────────

    async fn process_pack_manifest(
        &self,
        context: &InstallContext,
        manifest: PackManifest,
        overrides_source: OverridesSource<'_>,
    ) -> InstallResult<()> {
        // No registry identity for local inputs; derive a stable one.
        let pseudo_mod_id = manifest.pseudo_mod_id();
        let pseudo_file_id = manifest.pseudo_file_id();

        if self
            .short_circuit(context, pseudo_mod_id, pseudo_file_id, &manifest.name)
            .await?
        {
            return Ok(());
        }

        info!(
            "Installing modpack '{}' version {}",
            manifest.name,
            manifest.version.as_deref().unwrap_or("unknown")
        );

        let display_name = manifest.name.clone();
        let results = self
            .process_modpack(context, &manifest, overrides_source)
            .await?;

        self.finalize_results(context, results, pseudo_mod_id, pseudo_file_id, &display_name)
    }

    // ── Slug installs ───────────────────────────────────

    async fn install_by_retrieving_zip(
        &self,
        context: &InstallContext,
        file_matcher: Option<&str>,
        file_id: Option<u32>,
    ) -> InstallResult<()> {
        let project = context
            .registry
            .search_mod(&context.slug, &context.categories)
            .await?;

        let pack_file = match file_id {
            Some(id) => context
                .registry
                .mod_file_info(project.id, id)
                .await?
                .ok_or_else(|| {
                    InstallerError::Other("Unable to resolve modpack's file".into())
                })?,
            None => {
                context
                    .registry
                    .resolve_modpack_file(&project, file_matcher)
                    .await?
            }
        };

        if self
            .short_circuit(context, pack_file.mod_id, pack_file.id, &pack_file.display_name)
            .await?
        {
            return Ok(());
        }

        if pack_file.download_url.is_none() {
            return Err(InstallerError::Other(format!(
                "The modpack authors have indicated this file is not allowed for project \
                 distribution. Please download the client zip file from {} and pass it via \
                 the {} environment variable.",
                project.website_url().unwrap_or("their CurseForge page"),
                MODPACK_ZIP_VAR
            )));
        }

        info!(
            "Processing modpack '{}' ({}) @ {}:{}",
            pack_file.display_name, project.slug, pack_file.mod_id, pack_file.id
        );

        let status = |status: DownloadStatus, uri: &str, file: &Path| {
            debug!(
                "Modpack file retrieval: status={:?} uri={} file={:?}",
                status, uri, file
            );
        };
        let modpack_zip = context
            .registry
            .download_temp(&pack_file, "zip", &status)
            .await?;

        let result = async {
            let manifest = PackManifest::from_archive(&modpack_zip)?;
            self.process_modpack(context, &manifest, OverridesSource::Zip(&modpack_zip))
                .await
        }
        .await;

        // The temp zip goes away whether or not the install worked.
        if let Err(e) = std::fs::remove_file(&modpack_zip) {
            warn!("Unable to remove temporary modpack zip {:?}: {}", modpack_zip, e);
        }

        let results = result?;
        self.finalize_results(
            context,
            results,
            pack_file.mod_id,
            pack_file.id,
            &pack_file.display_name,
        )
    }

    // ── Idempotence decision ────────────────────────────

    fn matches_previous_install(
        &self,
        context: &InstallContext,
        mod_id: u32,
        file_id: u32,
    ) -> bool {
        context.prior_manifest.as_ref().is_some_and(|prior| {
            (prior.mod_id == mod_id || prior.slug.as_deref() == Some(context.slug.as_str()))
                && prior.file_id == file_id
        })
    }

    /// When the prior install matches the requested pack: true means
    /// the caller is done (the existing install was finalized), false
    /// means proceed with a full install.
    async fn short_circuit(
        &self,
        context: &InstallContext,
        mod_id: u32,
        file_id: u32,
        display_name: &str,
    ) -> InstallResult<bool> {
        if !self.matches_previous_install(context, mod_id, file_id) {
            return Ok(false);
        }

        if self.options.force_synchronize {
            info!("Requested force synchronize of {}", display_name);
            return Ok(false);
        }

        let prior = context
            .prior_manifest
            .as_ref()
            .expect("matches_previous_install implies a prior manifest");

        if manifests::all_files_present(&self.output_dir, prior) {
            info!(
                "Requested CurseForge modpack {} is already installed",
                display_name
            );
            self.finalize_existing_installation(prior).await?;
            Ok(true)
        } else {
            warn!(
                "Some files from modpack file {} were missing. Proceeding with a re-install",
                display_name
            );
            Ok(false)
        }
    }

    // ── Shared processing ───────────────────────────────

    async fn process_modpack(
        &self,
        context: &InstallContext,
        manifest: &PackManifest,
        overrides_source: OverridesSource<'_>,
    ) -> InstallResult<ModPackResults> {
        manifest.ensure_minecraft_modpack()?;
        let loader = manifest.primary_loader()?.clone();

        let output_paths = OutputPaths::create(&self.output_dir)?;

        let exclude_ids = excludes::resolve(
            self.options.exclude_includes.as_ref(),
            &context.slug,
            context.registry.as_ref(),
            &context.categories,
        )
        .await?;
        debug!("Using {:?}", exclude_ids);

        let mod_files = downloads::download_all(
            &context.registry,
            &context.categories,
            &self.output_dir,
            &output_paths,
            &manifest.files,
            &exclude_ids,
            self.options.level_from,
        )
        .await?;

        let overrides_result = match overrides_source {
            OverridesSource::Zip(path) => overrides::apply_overrides(
                path,
                &self.output_dir,
                &manifest.overrides,
                self.options.overrides_skip_existing,
                self.options.level_from,
            )?,
            OverridesSource::None => OverridesResult::default(),
        };

        self.loaders
            .prepare(
                &loader.id,
                &manifest.minecraft.version,
                &self.output_dir,
                self.results_file.as_deref(),
            )
            .await?;

        let level_name = self.resolve_level_name(&mod_files, &overrides_result);
        let files = mod_files
            .into_iter()
            .map(|p| p.path)
            .chain(overrides_result.paths)
            .collect();

        Ok(ModPackResults {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            files,
            level_name,
            minecraft_version: manifest.minecraft.version.clone(),
            mod_loader_id: loader.id,
        })
    }

    fn resolve_level_name(
        &self,
        mod_files: &[PathWithInfo],
        overrides_result: &OverridesResult,
    ) -> Option<String> {
        match self.options.level_from {
            Some(LevelFrom::Overrides) => overrides_result.level_name.clone(),
            Some(LevelFrom::WorldFile) => {
                mod_files.iter().find_map(|p| p.level_name.clone())
            }
            None => None,
        }
    }

    // ── Finalization ────────────────────────────────────

    /// The short-circuit: make sure the loader is still ready and
    /// replay the results file from the prior install.
    async fn finalize_existing_installation(
        &self,
        prior: &CurseForgeManifest,
    ) -> InstallResult<()> {
        if let (Some(loader_id), Some(minecraft_version)) =
            (&prior.mod_loader_id, &prior.minecraft_version)
        {
            self.loaders
                .prepare(
                    loader_id,
                    minecraft_version,
                    &self.output_dir,
                    self.results_file.as_deref(),
                )
                .await?;
        }

        if let Some(results_path) = &self.results_file {
            let mut writer = ResultsFileWriter::append(results_path)?;
            if let Some(level) = &prior.level_name {
                writer.write("LEVEL", level)?;
            }
            if let Some(minecraft_version) = &prior.minecraft_version {
                writer.write("VERSION", minecraft_version)?;
            }
        }

        Ok(())
    }

    fn finalize_results(
        &self,
        context: &InstallContext,
        results: ModPackResults,
        mod_id: u32,
        file_id: u32,
        file_name: &str,
    ) -> InstallResult<()> {
        let new_manifest = CurseForgeManifest {
            slug: Some(context.slug.clone()),
            modpack_name: results.name,
            modpack_version: results.version,
            file_name: file_name.to_string(),
            mod_id,
            file_id,
            minecraft_version: Some(results.minecraft_version.clone()),
            mod_loader_id: Some(results.mod_loader_id),
            level_name: results.level_name.clone(),
            files: manifests::relativize_all(&self.output_dir, &results.files),
        };

        manifests::cleanup(
            &self.output_dir,
            context.prior_manifest.as_ref(),
            &new_manifest,
        )?;
        manifests::save(&self.output_dir, &new_manifest)?;

        if let Some(results_path) = &self.results_file {
            let mut writer = ResultsFileWriter::append(results_path)?;
            if let Some(level) = &results.level_name {
                writer.write("LEVEL", level)?;
            }
            writer.write("VERSION", &results.minecraft_version)?;
        }

        Ok(())
    }
}
