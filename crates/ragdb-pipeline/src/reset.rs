use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

use ragdb_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Nothing existed at the path; nothing was touched.
    NotFound,
    Erased,
}

/// Recursively delete `dir`. Deleting a missing directory succeeds.
pub fn reset(dir: &Path) -> Result<ResetOutcome> {
    let meta = match fs::symlink_metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %dir.display(), "nothing to erase");
            return Ok(ResetOutcome::NotFound);
        }
        Err(e) => return Err(Error::storage_io(dir, e)),
    };
    let removed = if meta.is_dir() { fs::remove_dir_all(dir) } else { fs::remove_file(dir) };
    match removed {
        Ok(()) => {
            info!(path = %dir.display(), "erased");
            Ok(ResetOutcome::Erased)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ResetOutcome::NotFound),
        Err(e) => Err(Error::storage_io(dir, e)),
    }
}
