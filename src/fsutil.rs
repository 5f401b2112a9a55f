//! File and directory helpers.
//!
//! The predicates here are the only place the crate decides whether an input
//! path "exists". Everything is a plain function over `&Path`: no state, no
//! caching, so a check reflects the filesystem at the moment it runs.

use std::fs;
use std::io;
use std::path::Path;

/// True when `path` is non-empty and names an existing regular file.
///
/// Symlinks are followed; a dangling link is not a file.
pub fn is_file(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_file()
}

/// True when `path` is non-empty and names an existing directory.
pub fn is_dir(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_dir()
}

/// Final path component as a string, or an empty string when there is none.
///
/// ```text
/// /tmp/out/frame.png  → "frame.png"
/// /                   → ""
/// ```
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Copy `src` to `dst`, creating the destination directory if needed.
///
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)
}

/// Remove a file. A file that is already gone counts as removed.
pub fn delete_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
