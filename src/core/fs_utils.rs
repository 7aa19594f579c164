// src/core/fs_utils.rs

//! Filesystem helpers for staging work in directories that must always be
//! cleaned up, even when they contain read-only files.

use crate::constants::TMPDIR_PREFIX;
use scopeguard::ScopeGuard;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// --- Scoped Temporary Directory ---

/// A freshly created directory under the OS temp root, removed with [`rmtree`] on drop.
#[derive(Debug)]
pub struct ScopedTempDir {
    path: PathBuf,
    armed: bool,
}

/// Creates a uniquely named temporary directory.
///
/// # Errors
/// Returns an I/O error if the directory cannot be created.
pub fn tmpdir() -> io::Result<ScopedTempDir> {
    let path = tempfile::Builder::new()
        .prefix(TMPDIR_PREFIX)
        .tempdir()?
        .keep();
    log::trace!("Created temporary directory '{}'", path.display());
    Ok(ScopedTempDir { path, armed: true })
}

impl ScopedTempDir {
    /// The directory's location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now, reporting any failure instead of only logging it.
    pub fn close(mut self) -> io::Result<()> {
        self.armed = false;
        rmtree(&self.path)
    }
}

impl AsRef<Path> for ScopedTempDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = rmtree(&self.path) {
            log::warn!(
                "Failed to remove temporary directory '{}': {}",
                self.path.display(),
                e
            );
        }
    }
}

// --- Cleanup On Failure ---

/// Runs `f`; if it fails or panics, removes `path` (when it exists) before the
/// error or panic continues. On success `path` is left in place.
///
/// A failure during cleanup is logged and never replaces the original error.
pub fn clean_path_on_failure<T, E, F>(path: &Path, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let guard = scopeguard::guard(path, |path| {
        if path.exists() {
            log::debug!("Cleaning up '{}' after a failed operation.", path.display());
            if let Err(e) = rmtree(path) {
                log::warn!("Cleanup of '{}' failed: {}", path.display(), e);
            }
        }
    });

    let result = f();
    if result.is_ok() {
        ScopeGuard::into_inner(guard);
    }
    result
}

// --- Forced Removal ---

#[derive(Debug, Clone, Copy)]
enum RemoveOp {
    File,
    Dir,
}

impl RemoveOp {
    fn apply(self, path: &Path) -> io::Result<()> {
        match self {
            Self::File => fs::remove_file(path),
            Self::Dir => fs::remove_dir(path),
        }
    }
}

/// Recursively deletes `path`, clearing read-only bits where they block deletion.
///
/// Each removal that fails with `PermissionDenied` gets one retry after the
/// failing path and its parent are made writable. Any other error, or a second
/// failure, is returned unchanged. Symbolic links inside the tree are removed,
/// never followed; a `path` that is itself a symbolic link is refused.
pub fn rmtree(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.file_type().is_symlink() {
        return Err(io::Error::other(format!(
            "Refusing to remove '{}': it is a symbolic link",
            path.display()
        )));
    }
    for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
        let entry = entry?;
        let op = if entry.file_type().is_dir() {
            RemoveOp::Dir
        } else {
            RemoveOp::File
        };
        remove_with_retry(entry.path(), |p| op.apply(p))?;
    }
    Ok(())
}

fn remove_with_retry<F>(path: &Path, remove: F) -> io::Result<()>
where
    F: Fn(&Path) -> io::Result<()>,
{
    match remove(path) {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            log::debug!(
                "Permission denied removing '{}'; clearing read-only bits and retrying.",
                path.display()
            );
            make_writable(path)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                make_writable(parent)?;
            }
            remove(path)
        }
        other => other,
    }
}

/// Adds the owner write bit. Symbolic links are skipped: changing their mode
/// would change the file they point to.
#[cfg(unix)]
fn make_writable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if fs::symlink_metadata(path)?.file_type().is_symlink() {
        return Ok(());
    }
    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, fs::Permissions::from_mode((mode | 0o200) & 0o7777))
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}

// --- Permissions ---

/// Adds the user, group and other execute bits, keeping every other bit.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, fs::Permissions::from_mode((mode | 0o111) & 0o7777))
}

/// No execute bits to set here; only checks that the file exists.
#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> io::Result<()> {
    fs::metadata(path).map(|_| ())
}
