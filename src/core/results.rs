// ─── Results File ───
// Line-oriented KEY=VALUE output consumed by the surrounding server
// startup scripts (`LEVEL`, `VERSION`, `SERVER`).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::core::error::{InstallResult, InstallerError};

pub struct ResultsFileWriter {
    file: File,
}

impl ResultsFileWriter {
    /// Open the results file for appending, creating it as needed.
    pub fn append(path: &Path) -> InstallResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| InstallerError::io(path, e))?;
        Ok(Self { file })
    }

    pub fn write(&mut self, key: &str, value: &str) -> InstallResult<()> {
        writeln!(self.file, "{key}={value}")
            .map_err(|e| InstallerError::io("<results file>", e))
    }
}
