// ─── Exclude / Force-Include Resolution ───
// Operator-supplied project slugs or numeric ids, global and per-pack,
// resolved once per install into two id sets.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use crate::core::error::InstallResult;
use crate::core::registry::{CategoryInfo, Registry};

/// Operator configuration, usually read from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludeIncludesContent {
    #[serde(default)]
    pub global_excludes: Vec<String>,
    #[serde(default)]
    pub global_force_includes: Vec<String>,
    /// Pack-specific additions, keyed by pack slug.
    #[serde(default)]
    pub modpacks: HashMap<String, ExcludeIncludes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludeIncludes {
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub force_includes: Vec<String>,
}

/// Fully resolved numeric project ids.
#[derive(Debug, Default)]
pub struct ExcludeIncludeIds {
    pub excludes: HashSet<u32>,
    pub force_includes: HashSet<u32>,
}

/// Union the global entries with the ones specific to `slug` and turn
/// every entry into a numeric project id.
pub async fn resolve(
    content: Option<&ExcludeIncludesContent>,
    slug: &str,
    registry: &dyn Registry,
    categories: &CategoryInfo,
) -> InstallResult<ExcludeIncludeIds> {
    let Some(content) = content else {
        return Ok(ExcludeIncludeIds::default());
    };

    debug!("Reconciling exclude/includes from given {:?}", content);

    let specific = content.modpacks.get(slug);

    let excludes = resolve_from_slug_or_ids(
        registry,
        categories,
        &content.global_excludes,
        specific.map(|s| s.excludes.as_slice()),
    )
    .await?;
    let force_includes = resolve_from_slug_or_ids(
        registry,
        categories,
        &content.global_force_includes,
        specific.map(|s| s.force_includes.as_slice()),
    )
    .await?;

    Ok(ExcludeIncludeIds {
        excludes,
        force_includes,
    })
}

async fn resolve_from_slug_or_ids(
    registry: &dyn Registry,
    categories: &CategoryInfo,
    global: &[String],
    specific: Option<&[String]>,
) -> InstallResult<HashSet<u32>> {
    let mut ids = HashSet::new();
    for entry in global.iter().chain(specific.unwrap_or_default()) {
        match entry.parse::<u32>() {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => {
                ids.insert(registry.slug_to_id(categories, entry).await?);
            }
        }
    }
    Ok(ids)
}
