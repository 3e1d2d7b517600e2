use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cursepack::core::installer::{Installer, InstallerOptions, LevelFrom};
use cursepack::core::installer::excludes::ExcludeIncludesContent;
use cursepack::core::registry::FetchOptions;
use cursepack::{InstallResult, InstallerError};

/// Install a CurseForge modpack into a Minecraft server directory.
#[derive(Parser)]
#[command(name = "cursepack")]
#[command(about = "Installs CurseForge modpacks into a server directory")]
#[command(version)]
struct Cli {
    /// Server directory to install into
    #[arg(short = 'o', long)]
    output_dir: PathBuf,

    /// Modpack page slug, e.g. "all-the-mods-9"
    #[arg(long)]
    slug: Option<String>,

    /// Install from an already-downloaded modpack zip
    #[arg(long, env = "CF_MODPACK_ZIP")]
    modpack_zip: Option<PathBuf>,

    /// Install from a standalone modpack manifest.json
    #[arg(long)]
    modpack_manifest: Option<PathBuf>,

    /// Specific pack file id to install (slug mode)
    #[arg(long)]
    file_id: Option<u32>,

    /// Substring to select the pack file by name (slug mode)
    #[arg(long)]
    filename_matcher: Option<String>,

    /// CurseForge API key
    #[arg(long, env = "CF_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the CurseForge API
    #[arg(long, default_value = "https://api.curseforge.com/v1")]
    api_base_url: String,

    /// Re-install even when the requested pack is already present
    #[arg(long)]
    force_synchronize: bool,

    /// JSON file with global/per-pack excludes and force-includes
    #[arg(long)]
    exclude_include_file: Option<PathBuf>,

    /// Where the server level comes from: "overrides" or "world-file"
    #[arg(long)]
    level_from: Option<String>,

    /// Never overwrite files that already exist when applying overrides
    #[arg(long)]
    overrides_skip_existing: bool,

    /// File to receive KEY=VALUE results (LEVEL, VERSION, SERVER)
    #[arg(long)]
    results_file: Option<PathBuf>,

    /// HTTP response timeout in seconds
    #[arg(long, default_value_t = 30)]
    http_response_timeout: u64,

    /// TLS handshake / connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    tls_handshake_timeout: u64,

    /// Idle timeout for pooled connections in seconds
    #[arg(long)]
    connection_pool_max_idle_timeout: Option<u64>,
}

fn parse_level_from(value: &str) -> InstallResult<LevelFrom> {
    match value {
        "overrides" => Ok(LevelFrom::Overrides),
        "world-file" => Ok(LevelFrom::WorldFile),
        other => Err(InstallerError::Config(format!(
            "Unknown --level-from value '{other}' (expected 'overrides' or 'world-file')"
        ))),
    }
}

fn load_exclude_includes(path: &PathBuf) -> InstallResult<ExcludeIncludesContent> {
    let content = std::fs::read_to_string(path).map_err(|e| InstallerError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

async fn run(cli: Cli) -> InstallResult<()> {
    let level_from = cli
        .level_from
        .as_deref()
        .map(parse_level_from)
        .transpose()?;

    let exclude_includes = cli
        .exclude_include_file
        .as_ref()
        .map(load_exclude_includes)
        .transpose()?;

    let options = InstallerOptions {
        api_base_url: cli.api_base_url,
        api_key: cli.api_key,
        force_synchronize: cli.force_synchronize,
        exclude_includes,
        level_from,
        overrides_skip_existing: cli.overrides_skip_existing,
        fetch: FetchOptions {
            response_timeout: Duration::from_secs(cli.http_response_timeout),
            tls_handshake_timeout: Duration::from_secs(cli.tls_handshake_timeout),
            connection_pool_max_idle_timeout: cli
                .connection_pool_max_idle_timeout
                .map(Duration::from_secs),
        },
    };

    let installer = Installer::new(cli.output_dir, cli.results_file, options);

    // Slug names the pack in the persisted manifest even when the
    // input is a local zip or manifest file.
    let slug = cli.slug.as_deref().unwrap_or_default();

    if let Some(modpack_zip) = &cli.modpack_zip {
        installer.install_from_zip(modpack_zip, slug).await
    } else if let Some(manifest_path) = &cli.modpack_manifest {
        installer.install_from_manifest_file(manifest_path, slug).await
    } else if let Some(slug) = &cli.slug {
        installer
            .install_from_slug(slug, cli.filename_matcher.as_deref(), cli.file_id)
            .await
    } else {
        Err(InstallerError::Config(
            "One of --slug, --modpack-zip, or --modpack-manifest is required".into(),
        ))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
