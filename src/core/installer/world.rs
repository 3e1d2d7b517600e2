// ─── World Archives ───
// A downloaded world zip is extracted into `saves/<slug>/` with its
// single top-level directory flattened away, but only when the level
// policy actually selects world files. Existing saves are kept.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::core::error::{InstallResult, InstallerError};

use super::{LevelFrom, PathWithInfo};

pub fn extract_world_zip(
    project_slug: &str,
    zip_path: &Path,
    worlds_dir: &Path,
    output_dir: &Path,
    level_from: Option<LevelFrom>,
) -> InstallResult<PathWithInfo> {
    if level_from != Some(LevelFrom::WorldFile) {
        return Ok(PathWithInfo::plain(zip_path.to_path_buf()));
    }

    let world_dir = worlds_dir.join(project_slug);
    // The server's level property is a relative path under its root.
    let level_name = world_dir
        .strip_prefix(output_dir)
        .unwrap_or(&world_dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    if world_dir.exists() {
        debug!(
            "Extracted world directory '{:?}' already exists for {}",
            world_dir, project_slug
        );
        return Ok(PathWithInfo {
            path: zip_path.to_path_buf(),
            level_name: Some(level_name),
        });
    }

    std::fs::create_dir_all(&world_dir).map_err(|e| InstallerError::io(&world_dir, e))?;
    debug!("Unzipping world from {:?} into {:?}", zip_path, world_dir);

    let file = File::open(zip_path).map_err(|e| InstallerError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    if archive.len() == 0 {
        return Err(InstallerError::InvalidModpack(format!(
            "Expected top-level directory in world zip {zip_path:?}"
        )));
    }

    // The top-level directory gets replaced by the slug name.
    let prefix_len = {
        let first = archive.by_index(0)?;
        if !first.is_dir() {
            return Err(InstallerError::InvalidModpack(format!(
                "Expected top-level directory in world zip {zip_path:?}"
            )));
        }
        first.name().len()
    };

    for index in 1..archive.len() {
        let mut entry = archive.by_index(index)?;
        let dest = world_dir.join(&entry.name()[prefix_len..]);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| InstallerError::io(&dest, e))?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
            }
            let mut out = File::create(&dest).map_err(|e| InstallerError::io(&dest, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| InstallerError::io(&dest, e))?;
        }
    }

    Ok(PathWithInfo {
        path: zip_path.to_path_buf(),
        level_name: Some(level_name),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn world_zip(dir: &Path, with_top_dir: bool) -> PathBuf {
        let path = dir.join("world.zip");
        let options = SimpleFileOptions::default();
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        if with_top_dir {
            zip.add_directory("mypack_world/", options).unwrap();
            zip.start_file("mypack_world/level.dat", options).unwrap();
            zip.write_all(b"nbt").unwrap();
            zip.add_directory("mypack_world/region/", options).unwrap();
            zip.start_file("mypack_world/region/r.0.0.mca", options)
                .unwrap();
            zip.write_all(b"region").unwrap();
        } else {
            zip.start_file("level.dat", options).unwrap();
            zip.write_all(b"nbt").unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn extracts_and_flattens_top_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("server");
        let saves = out.join("saves");
        std::fs::create_dir_all(&saves).unwrap();
        let zip = world_zip(tmp.path(), true);

        let info = extract_world_zip(
            "skyfall",
            &zip,
            &saves,
            &out,
            Some(LevelFrom::WorldFile),
        )
        .unwrap();

        assert_eq!(info.path, zip);
        assert_eq!(info.level_name.as_deref(), Some("saves/skyfall"));
        assert!(saves.join("skyfall/level.dat").exists());
        assert!(saves.join("skyfall/region/r.0.0.mca").exists());
        assert!(!saves.join("skyfall/mypack_world").exists());
    }

    #[test]
    fn existing_world_directory_skips_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("server");
        let saves = out.join("saves");
        std::fs::create_dir_all(saves.join("skyfall")).unwrap();
        std::fs::write(saves.join("skyfall/level.dat"), b"operator data").unwrap();
        let zip = world_zip(tmp.path(), true);

        let info = extract_world_zip(
            "skyfall",
            &zip,
            &saves,
            &out,
            Some(LevelFrom::WorldFile),
        )
        .unwrap();

        assert_eq!(info.level_name.as_deref(), Some("saves/skyfall"));
        assert_eq!(
            std::fs::read(saves.join("skyfall/level.dat")).unwrap(),
            b"operator data"
        );
    }

    #[test]
    fn missing_top_directory_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("server");
        let saves = out.join("saves");
        std::fs::create_dir_all(&saves).unwrap();
        let zip = world_zip(tmp.path(), false);

        let err = extract_world_zip(
            "skyfall",
            &zip,
            &saves,
            &out,
            Some(LevelFrom::WorldFile),
        )
        .unwrap_err();
        assert!(matches!(err, InstallerError::InvalidModpack(_)));
    }

    #[test]
    fn other_level_policies_leave_the_zip_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("server");
        let saves = out.join("saves");
        std::fs::create_dir_all(&saves).unwrap();
        let zip = world_zip(tmp.path(), true);

        let info = extract_world_zip("skyfall", &zip, &saves, &out, None).unwrap();
        assert_eq!(info.level_name, None);
        assert!(!saves.join("skyfall").exists());
    }
}
