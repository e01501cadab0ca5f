//! Whole-file persistence helpers for the event log.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Path of the scratch file used while rewriting `path`.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace the contents of `path` atomically.
///
/// Writes to a `.tmp` sibling first, syncs, then renames over the final
/// path. If the process crashes mid-write, the previous file survives intact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_data()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a file to a string.
///
/// Returns `Ok(None)` if the file does not exist.
pub(crate) fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete a leftover `.tmp` file from an interrupted write.
///
/// Idempotent: does not error if the file doesn't exist.
pub(crate) fn remove_stale_tmp(path: &Path) -> io::Result<()> {
    match fs::remove_file(tmp_path(path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
