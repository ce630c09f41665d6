use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use qh_utils::{
    error::FileSystemError,
    fs::{ensure_dir_exists, set_mode},
};
use tar::{Archive, EntryType};
use tracing::{debug, trace, warn};

use crate::{
    error::{ErrorContext, PackResult},
    flatten::{flatten, FlattenOutcome},
    sanitize::resolve_entry,
    unpack::UnpackOptions,
};

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;
const OWNER_RWX: u32 = 0o700;
/// Setuid, setgid and sticky bits from archives are dropped.
const PERMISSION_BITS: u32 = 0o777;

/// What a tar extraction wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    /// Entries of kinds that are not materialized (links, devices, fifos).
    pub skipped: usize,
    pub flattened: FlattenOutcome,
}

/// Extracts a tar stream into `dest`, then flattens wrapper directories.
///
/// Entries are processed in stream order. Parent directories are created from each entry's
/// path, so archives without explicit directory entries extract fine. Directories are
/// created owner-writable and receive their recorded mode once every entry is written and
/// the tree is flattened.
pub fn extract_tar<R: Read>(
    dest: &Path,
    reader: R,
    options: &UnpackOptions,
) -> PackResult<ExtractReport> {
    ensure_dir_exists(dest)?;

    let mut report = ExtractReport::default();
    let mut deferred_modes: Vec<(PathBuf, u32)> = Vec::new();

    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .with_context(|| "reading tar archive".into())?;

    for entry in entries {
        let mut entry = entry.with_context(|| "reading tar entry".into())?;
        let raw_path = entry
            .path()
            .with_context(|| "decoding tar entry path".into())?
            .into_owned();

        let Some(target) = resolve_entry(dest, &raw_path)? else {
            trace!("Skipping root entry {}", raw_path.display());
            continue;
        };

        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().ok().map(|mode| mode & PERMISSION_BITS);

        match entry_type {
            EntryType::Directory => {
                let mode = mode.unwrap_or(DEFAULT_DIR_MODE);
                create_dir(&target, mode | OWNER_RWX)?;
                if options.preserve_permissions && mode & OWNER_RWX != OWNER_RWX {
                    deferred_modes.push((target, mode));
                }
                report.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                write_file(&mut entry, &target, &raw_path)?;
                if options.preserve_permissions {
                    set_mode(&target, mode.unwrap_or(DEFAULT_FILE_MODE))?;
                }
                report.files += 1;
            }
            EntryType::XGlobalHeader => {
                trace!("Ignoring pax global header {}", raw_path.display());
            }
            other => {
                warn!(
                    "Skipping unsupported {:?} entry {}",
                    other,
                    raw_path.display()
                );
                report.skipped += 1;
            }
        }
    }

    debug!(
        "Extracted {} files and {} directories into {}",
        report.files,
        report.directories,
        dest.display()
    );

    if options.flatten {
        report.flattened = flatten(dest)?;
    }

    for (dir, mode) in deferred_modes.iter().rev() {
        if let Some(dir) = relocate(dest, dir, &report.flattened.collapsed) {
            set_mode(&dir, *mode)?;
        }
    }

    Ok(report)
}

/// Where `path` ended up after flattening removed the wrapper chain `collapsed`.
///
/// `None` for the wrapper directories themselves, which no longer exist.
fn relocate(dest: &Path, path: &Path, collapsed: &[OsString]) -> Option<PathBuf> {
    if collapsed.is_empty() {
        return Some(path.to_path_buf());
    }

    let chain: PathBuf = collapsed.iter().collect();
    let relative = path.strip_prefix(dest).ok()?;
    match relative.strip_prefix(&chain) {
        Ok(rest) if rest.as_os_str().is_empty() => None,
        Ok(rest) => Some(dest.join(rest)),
        Err(_) if chain.starts_with(relative) => None,
        Err(_) => Some(path.to_path_buf()),
    }
}

fn create_dir(path: &Path, mode: u32) -> PackResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(mode & PERMISSION_BITS);
    }

    #[cfg(not(unix))]
    let _ = mode;

    builder.create(path).map_err(|err| {
        FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        }
    })?;

    Ok(())
}

fn write_file(entry: &mut impl Read, target: &Path, raw_path: &Path) -> PackResult<()> {
    if let Some(parent) = target.parent() {
        ensure_dir_exists(parent)?;
    }

    // Replace rather than write through whatever already sits at the target.
    if fs::symlink_metadata(target).is_ok_and(|meta| !meta.is_dir()) {
        fs::remove_file(target).map_err(|err| {
            FileSystemError::File {
                path: target.to_path_buf(),
                action: "replace",
                source: err,
            }
        })?;
    }

    let mut file = File::create(target).map_err(|err| {
        FileSystemError::File {
            path: target.to_path_buf(),
            action: "create",
            source: err,
        }
    })?;

    io::copy(entry, &mut file).with_context(|| format!("extracting {}", raw_path.display()))?;

    Ok(())
}
