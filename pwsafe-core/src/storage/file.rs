//! Filesystem storage with a single `~` backup.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::error::{PwsError, PwsResult};

use super::Storage;

/// A container stored in a file.
///
/// Saving writes a temporary file next to the target, syncs it, moves the
/// current file to `<name>~` (replacing an older backup) and renames the
/// temporary file into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage for the file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the container file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the backup written by the previous save.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push("~");
        PathBuf::from(name)
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let mut temp = NamedTempFile::new_in(self.directory())?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))?;
        }

        let backup = self.backup_path();
        let had_original = self.path.exists();
        if had_original {
            if backup.exists() {
                fs::remove_file(&backup)?;
            }
            fs::rename(&self.path, &backup)?;
        }

        if let Err(err) = temp.persist(&self.path) {
            if had_original {
                // Put the original back; the temporary file is dropped with `err`.
                if let Err(restore) = fs::rename(&backup, &self.path) {
                    log::error!(
                        "could not restore {} from backup: {restore}",
                        self.path.display()
                    );
                }
            }
            return Err(err.error);
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load(&self) -> PwsResult<Vec<u8>> {
        fs::read(&self.path)
            .map_err(|e| PwsError::io(format!("reading {}", self.path.display()), e))
    }

    fn save(&self, bytes: &[u8]) -> bool {
        match self.write_atomic(bytes) {
            Ok(()) => {
                log::debug!("wrote {} bytes to {}", bytes.len(), self.path.display());
                true
            }
            Err(err) => {
                log::error!("saving {} failed: {err}", self.path.display());
                false
            }
        }
    }

    fn identifier(&self) -> String {
        self.path.display().to_string()
    }

    fn last_modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
