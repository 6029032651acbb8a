//! File system storage backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, io};

use tracing::{debug, error, warn};

use crate::host::Config;
use crate::nvram::{self, Nvram, RecordId};

/// NVRAM records stored in a file system directory.
#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct NvramDir(PathBuf);

impl NvramDir {
    const NAME: &'static str = "nvram";

    /// Creates or opens a record store in the specified root directory.
    #[inline(always)]
    #[must_use]
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self(root.as_ref().join(Self::NAME))
    }

    /// Creates or opens a record store in the current user's local data
    /// directory.
    ///
    /// # Panics
    ///
    /// Panics if it cannot determine the user directory.
    #[must_use]
    pub fn per_user(app: impl AsRef<Path>) -> Self {
        let dir = dirs::data_local_dir()
            .expect("user directory not available")
            .join(app.as_ref())
            .join(Self::NAME);
        Self(dir)
    }

    /// Removes all records from the file system.
    pub fn clear(&self) {
        match fs::remove_dir_all(&self.0) {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {}
            Err(e) => error!("Failed to remove: {} ({e})", self.0.display()),
        }
    }

    /// Returns the file path for the specified record.
    fn path(&self, id: RecordId) -> PathBuf {
        self.0.join(format!("R-{:04X}", u16::from(id)))
    }
}

impl Nvram for NvramDir {
    fn read(&self, id: RecordId) -> nvram::Result<Vec<u8>> {
        let path = self.path(id);
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {
                return Err(nvram::Error::NotFound)
            }
            Err(e) => {
                error!("Failed to read: {} ({e})", path.display());
                return Err(nvram::Error::Io(e.to_string()));
            }
        };
        serde_json::from_str(&s).map_err(|e| {
            error!("Invalid file contents: {} ({e})", path.display());
            nvram::Error::Io(e.to_string())
        })
    }

    fn write(&self, id: RecordId, v: &[u8]) -> nvram::Result<usize> {
        let s = serde_json::to_string(v).map_err(|e| nvram::Error::Io(e.to_string()))?;
        if let Err(e) = fs::create_dir_all(&self.0) {
            warn!("Failed to create record directory: {} ({e})", self.0.display());
        }
        let path = self.path(id);
        match fs::File::create(&path)
            .and_then(|mut f| f.write_all(s.as_bytes()).and_then(|_| f.sync_data()))
        {
            Ok(_) => {
                debug!("Wrote: {}", path.display());
                Ok(v.len())
            }
            Err(e) => {
                error!("Failed to write: {} ({e})", path.display());
                Err(nvram::Error::Io(e.to_string()))
            }
        }
    }
}

/// Loads host configuration from a JSON file. Missing fields take their
/// default values.
pub fn load_config(path: impl AsRef<Path>) -> io::Result<Config> {
    let s = fs::read_to_string(path)?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
