// ─── CurseForge API Model ───
// Typed subset of the CurseForge v1 REST responses that the installer
// consumes. Unknown fields are ignored by serde.

use std::collections::HashMap;

use serde::Deserialize;

/// SHA-1 in the CurseForge `hashes[].algo` field.
const HASH_ALGO_SHA1: u32 = 1;

/// A project ("mod" in API terms): modpack, mod, plugin, or world.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeMod {
    pub id: u32,
    pub name: String,
    pub slug: String,
    /// Content class this project belongs to (mods, plugins, worlds, ...).
    pub class_id: Option<u32>,
    #[serde(default)]
    pub links: Option<ModLinks>,
    pub main_file_id: Option<u32>,
    #[serde(default)]
    pub latest_files: Vec<CurseForgeFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModLinks {
    pub website_url: Option<String>,
}

impl CurseForgeMod {
    /// Project page to point operators at when a file cannot be
    /// downloaded automatically.
    pub fn website_url(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.website_url.as_deref())
    }
}

/// A single downloadable file of a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub id: u32,
    pub mod_id: u32,
    pub display_name: String,
    pub file_name: String,
    /// Absent when the project author opted out of distribution.
    pub download_url: Option<String>,
    /// Mixes Minecraft versions with `Client`/`Server` markers.
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub hashes: Vec<FileHash>,
    pub file_length: Option<u64>,
}

impl CurseForgeFile {
    pub fn sha1(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|h| h.algo == HASH_ALGO_SHA1)
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileHash {
    pub value: String,
    pub algo: u32,
}

/// A top-level content class from `/categories?classesOnly=true`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    pub slug: String,
}

/// Resolved taxonomy for one game: the content classes the installer
/// handles plus the class that modpacks themselves live under.
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    /// classId → category, restricted to the applicable content classes.
    pub content_class_ids: HashMap<u32, Category>,
    /// classId of the `modpacks` class, used to scope searches.
    pub modpack_class_id: u32,
}

// ── Response envelopes ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_file_with_hashes() {
        let json = r#"{
            "id": 2001,
            "modId": 1001,
            "displayName": "TestMod 1.0",
            "fileName": "testmod-1.0.jar",
            "downloadUrl": "https://edge.example/testmod-1.0.jar",
            "gameVersions": ["1.20.1", "Server", "Forge"],
            "hashes": [
                {"value": "da39a3ee5e6b4b0d3255bfef95601890afd80709", "algo": 1},
                {"value": "d41d8cd98f00b204e9800998ecf8427e", "algo": 2}
            ],
            "fileLength": 12345
        }"#;
        let file: CurseForgeFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.file_name, "testmod-1.0.jar");
        assert_eq!(
            file.sha1(),
            Some("da39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
    }

    #[test]
    fn deserialize_mod_without_links() {
        let json = r#"{"id": 7, "name": "Some Pack", "slug": "some-pack", "classId": 4471}"#;
        let m: CurseForgeMod = serde_json::from_str(json).unwrap();
        assert_eq!(m.slug, "some-pack");
        assert_eq!(m.class_id, Some(4471));
        assert!(m.website_url().is_none());
        assert!(m.latest_files.is_empty());
    }
}
