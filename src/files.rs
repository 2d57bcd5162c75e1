//! File operations inside a resolved bookmark directory
// src/files.rs
//
// These helpers assume the caller already holds a lease on `dir`; the
// manager acquires through the handle cache and passes the leased path in.
use crate::constants;
use crate::error::{BookmarkError, Result};
use crate::options::PathPolicy;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Reject file names the policy does not allow. Runs before any cache or
/// filesystem access.
pub fn validate_file_name(file_name: &str, policy: PathPolicy) -> Result<()> {
    if file_name.is_empty() {
        return Err(BookmarkError::InvalidArgument("file name is empty".into()));
    }

    let path = Path::new(file_name);
    if path.has_root() || path.is_absolute() {
        return Err(BookmarkError::InvalidArgument(format!(
            "file name must be relative: {}",
            file_name
        )));
    }

    if policy == PathPolicy::Strict {
        let mut components = path.components();
        let single_normal = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if !single_normal || file_name.contains(['/', '\\']) {
            return Err(BookmarkError::InvalidArgument(format!(
                "file name must be a single path component: {}",
                file_name
            )));
        }
    }

    Ok(())
}

fn target(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(file_name)
}

/// OS-level write access check on the directory
#[cfg(unix)]
pub fn has_write_permission(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    access(dir, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
pub fn has_write_permission(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

fn require_writable(dir: &Path) -> Result<()> {
    if has_write_permission(dir) {
        Ok(())
    } else {
        Err(BookmarkError::PermissionDenied(dir.to_path_buf()))
    }
}

/// Check the directory that holds the entry, which sits below `dir` for
/// nested names. A missing parent falls back to `dir`; the write itself
/// then reports the missing path.
fn require_writable_parent(dir: &Path, path: &Path) -> Result<()> {
    let parent = path.parent().filter(|p| p.is_dir()).unwrap_or(dir);
    require_writable(parent)
}

/// Create or overwrite `file_name`
pub fn save(dir: &Path, file_name: &str, data: &[u8]) -> Result<()> {
    let path = target(dir, file_name);
    require_writable_parent(dir, &path)?;
    fs::write(path, data)?;
    Ok(())
}

/// Contents of `file_name`, or None if it does not exist
pub fn read(dir: &Path, file_name: &str) -> Result<Option<Vec<u8>>> {
    match fs::read(target(dir, file_name)) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Names of regular, non-hidden files directly inside `dir`, in
/// directory iteration order
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(constants::HIDDEN_FILE_PREFIX) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Remove `file_name`. Returns false if it was not there.
pub fn delete(dir: &Path, file_name: &str) -> Result<bool> {
    let path = target(dir, file_name);
    require_writable_parent(dir, &path)?;
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn exists(dir: &Path, file_name: &str) -> bool {
    target(dir, file_name).exists()
}
