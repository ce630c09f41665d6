use std::{
    fs::{self, DirEntry},
    path::Path,
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// If the directory already exists, this function does nothing. If the path exists but is not
/// a directory, this function returns an error.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
///
/// # Example
///
/// ```no_run
/// use qh_utils::error::FileSystemResult;
/// use qh_utils::fs::ensure_dir_exists;
///
/// fn main() -> FileSystemResult<()> {
///     ensure_dir_exists("/tmp/qh-doc/internal/dir")?;
///     Ok(())
/// }
/// ```
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory safely.
///
/// If the path does not exist, this function returns `Ok(())`. Directories are removed
/// recursively.
///
/// # Errors
///
/// Returns a [`FileSystemError::File`] if the removal fails for any reason other than the
/// path not existing.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    let result = if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Lists the entries of a directory, sorted by file name.
///
/// Sorting keeps callers independent of the platform's directory iteration order.
pub fn list_dir<P: AsRef<Path>>(path: P) -> FileSystemResult<Vec<DirEntry>> {
    let path = path.as_ref();
    let to_err = |err| FileSystemError::Directory {
        path: path.to_path_buf(),
        action: "read",
        source: err,
    };

    let mut entries = fs::read_dir(path)
        .map_err(to_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_err)?;
    entries.sort_by_key(|entry| entry.file_name());

    Ok(entries)
}

/// Applies Unix permission bits to a file or directory.
///
/// Only the lower twelve bits (`0o7777`) are applied. This is a no-op on non-Unix platforms.
pub fn set_mode<P: AsRef<Path>>(path: P, mode: u32) -> FileSystemResult<()> {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;

        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|err| {
            FileSystemError::File {
                path: path.to_path_buf(),
                action: "set permissions on",
                source: err,
            }
        })?;
    }

    #[cfg(not(unix))]
    let _ = (path, mode);

    Ok(())
}
