//! Scoped temporary files for normalized images.
//!
//! A converted JPEG only lives for one `deliver` call. [`TempArtifact`]
//! deletes it on drop, so every exit path (success, exhausted retries,
//! early return, unwinding) cleans up. The file is reserved with
//! `create_new`, so the guard only ever deletes a file it created.

use crate::{fsutil, text};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Length of the random numeric suffix in temp file names.
const SUFFIX_DIGITS: usize = 6;

/// Fresh names tried before giving up on a crowded directory.
const RESERVE_ATTEMPTS: usize = 8;

/// A file path that is removed when this guard is dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Take ownership of `path`. The file need not exist yet.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserve a new, empty `.jpg` beside `source` (see [`temp_jpeg_path`]).
    ///
    /// The file is created exclusively, so an existing file with the same
    /// name is never overwritten or later deleted by this guard.
    pub fn reserve_jpeg_beside(source: &Path) -> io::Result<Self> {
        reserve(|| temp_jpeg_path(source))
    }
}

fn reserve(mut next_path: impl FnMut() -> PathBuf) -> io::Result<TempArtifact> {
    let mut last_err = io::Error::from(io::ErrorKind::AlreadyExists);
    for _ in 0..RESERVE_ATTEMPTS {
        let path = next_path();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(TempArtifact::new(path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "temporary name taken, retrying");
                last_err = e;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err)
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match fsutil::delete_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temporary image"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temporary image"
            ),
        }
    }
}

/// Fresh `.jpg` path next to `source`: `<YYYYmmddHHMMSS>_<6 digits>.jpg`.
///
/// The random suffix is the only thing that separates concurrent
/// invocations writing into the same directory.
pub fn temp_jpeg_path(source: &Path) -> PathBuf {
    let dir = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    dir.join(format!(
        "{}_{}.jpg",
        text::now_compact(),
        text::random_digits(SUFFIX_DIGITS)
    ))
}
