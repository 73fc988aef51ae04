use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{BoltError, Result};

/// Read a barrel file; `None` if it does not exist yet.
///
/// Returns the raw bytes and their lossy UTF-8 decoding. Non-UTF-8 input
/// is never fatal.
pub(crate) fn read_barrel(path: &Path, barrel: &str) -> Result<Option<(Vec<u8>, String)>> {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(Some((bytes, text)))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BoltError::barrel_io(barrel, e)),
    }
}

/// Replace `path` with `bytes` through a temp file in the same directory
pub(crate) fn write_atomic(path: &Path, barrel: &str, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| BoltError::Internal(format!("barrel path {:?} has no parent", path)))?;
    let io_err = |e| BoltError::barrel_io(barrel, e);

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Run a barrel operation, retrying once on a retriable I/O failure
pub(crate) fn retry_once<T>(barrel: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    match op() {
        Err(e) if e.is_retriable() => {
            warn!(barrel, error = %e, "barrel I/O failed, retrying once");
            op()
        }
        other => other,
    }
}
