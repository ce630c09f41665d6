//! Validation of archive-supplied entry paths.

use std::path::{Component, Path, PathBuf};

use crate::error::{PackError, PackResult};

/// Normalizes an untrusted entry path into a path relative to the destination.
///
/// `.` components are dropped. Absolute paths, drive prefixes, `..` components and embedded
/// NUL bytes are rejected with [`PackError::PathTraversal`]. Returns `None` when nothing is
/// left after normalization (an entry such as `./` that names the destination itself).
pub fn sanitize_entry_path(entry: &Path) -> PackResult<Option<PathBuf>> {
    let reject = || {
        PackError::PathTraversal {
            entry: entry.to_path_buf(),
        }
    };

    if entry.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(reject());
    }

    let mut relative = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(reject());
            }
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// Joins a sanitized entry path onto `dest`.
pub fn resolve_entry(dest: &Path, entry: &Path) -> PackResult<Option<PathBuf>> {
    Ok(sanitize_entry_path(entry)?.map(|relative| dest.join(relative)))
}
