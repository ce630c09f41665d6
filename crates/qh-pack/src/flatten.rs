//! Removal of wrapper directories left behind by extraction.
//!
//! Many archives put their content under a single top-level directory such as
//! `project-1.2.0/`. Flattening lifts the content of the innermost directory of such a
//! single-directory chain into the extraction root and deletes the emptied chain.
//!
//! The chain is listed once and deleted afterwards. A process writing into the chain in
//! between makes the deletion stop early; that case is not guarded against.

use std::{
    ffi::OsString,
    fs::{self, DirEntry},
    path::{Path, PathBuf},
};

use qh_utils::fs::list_dir;
use tracing::{debug, warn};

use crate::error::PackResult;

/// Result of a [`flatten`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlattenOutcome {
    /// Names of the collapsed directories, outermost first. Empty when nothing changed.
    pub collapsed: Vec<OsString>,
}

impl FlattenOutcome {
    pub fn is_noop(&self) -> bool {
        self.collapsed.is_empty()
    }
}

/// Collapses a chain of single-directory wrappers below `root`.
///
/// A root that is empty, holds more than one entry, or holds a single file is left alone.
/// Only failure to list `root` itself is an error; problems further down are logged and end
/// the pass early, leaving the tree as it is at that point.
pub fn flatten(root: &Path) -> PackResult<FlattenOutcome> {
    let mut entries = list_dir(root)?;
    let mut deepest = root.to_path_buf();
    let mut chain: Vec<OsString> = Vec::new();

    while let [only] = entries.as_slice() {
        if !is_real_dir(only) {
            break;
        }

        chain.push(only.file_name());
        deepest = only.path();
        entries = match list_dir(&deepest) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Not flattening {}: {}", root.display(), err);
                return Ok(FlattenOutcome::default());
            }
        };
    }

    let Some(top) = chain.first() else {
        return Ok(FlattenOutcome::default());
    };

    let mut chain_root = root.join(top);
    if entries.iter().any(|entry| &entry.file_name() == top) {
        let staged = staging_path(root, top);
        if let Err(err) = fs::rename(&chain_root, &staged) {
            warn!(
                "Not flattening {}: failed to move {} aside: {}",
                root.display(),
                chain_root.display(),
                err
            );
            return Ok(FlattenOutcome::default());
        }
        deepest = chain[1..].iter().fold(staged.clone(), |path, name| path.join(name));
        chain_root = staged;
    }

    for entry in &entries {
        let name = entry.file_name();
        let from = deepest.join(&name);
        let to = root.join(&name);

        if let Err(err) = fs::rename(&from, &to) {
            warn!(
                "Stopped flattening {}: failed to move {} to {}: {}",
                root.display(),
                from.display(),
                to.display(),
                err
            );
            return Ok(FlattenOutcome::default());
        }
    }

    remove_chain(&chain_root, &chain[1..]);

    debug!(
        "Flattened {} wrapper director{} in {}",
        chain.len(),
        if chain.len() == 1 { "y" } else { "ies" },
        root.display()
    );

    Ok(FlattenOutcome {
        collapsed: chain,
    })
}

fn is_real_dir(entry: &DirEntry) -> bool {
    entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false)
}

/// A name next to `top` in `root` that does not exist yet.
fn staging_path(root: &Path, top: &OsString) -> PathBuf {
    let mut attempt = 0u32;
    loop {
        let mut name = OsString::from(".");
        name.push(top);
        name.push(format!(".qh-flatten-{attempt}"));

        let candidate = root.join(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        attempt += 1;
    }
}

/// Removes `chain_root` and its nested chain, innermost first.
///
/// Stops at the first directory that cannot be removed; its ancestors are kept as well.
fn remove_chain(chain_root: &Path, rest: &[OsString]) {
    let mut dirs = vec![chain_root.to_path_buf()];
    for name in rest {
        let next = dirs[dirs.len() - 1].join(name);
        dirs.push(next);
    }

    for dir in dirs.iter().rev() {
        if let Err(err) = fs::remove_dir(dir) {
            debug!("Keeping {}: {}", dir.display(), err);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::tempdir;

    use super::*;

    fn tree(root: &Path) -> BTreeSet<String> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeSet<String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                let rel = entry.path().strip_prefix(base).unwrap().to_string_lossy().into_owned();
                if entry.file_type().unwrap().is_dir() {
                    out.insert(format!("{rel}/"));
                    walk(base, &entry.path(), out);
                } else {
                    out.insert(rel);
                }
            }
        }

        let mut out = BTreeSet::new();
        walk(root, root, &mut out);
        out
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_file_untouched() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("tool"), "bin").unwrap();

        let outcome = flatten(root.path()).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(tree(root.path()), set(&["tool"]));
    }

    #[test]
    fn test_empty_root_untouched() {
        let root = tempdir().unwrap();
        assert!(flatten(root.path()).unwrap().is_noop());
        assert!(tree(root.path()).is_empty());
    }

    #[test]
    fn test_multiple_entries_untouched() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("bin")).unwrap();
        fs::write(root.path().join("README"), "r").unwrap();

        assert!(flatten(root.path()).unwrap().is_noop());
        assert_eq!(tree(root.path()), set(&["README", "bin/"]));
    }

    #[test]
    fn test_three_level_chain_collapses() {
        let root = tempdir().unwrap();
        let deep = root.path().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("one"), "1").unwrap();
        fs::write(deep.join("two"), "2").unwrap();

        let outcome = flatten(root.path()).unwrap();
        assert_eq!(outcome.collapsed, ["a", "b", "c"].map(OsString::from));
        assert_eq!(tree(root.path()), set(&["one", "two"]));
        assert_eq!(fs::read_to_string(root.path().join("two")).unwrap(), "2");
    }

    #[test]
    fn test_wrapper_with_subdirectories() {
        let root = tempdir().unwrap();
        let wrapper = root.path().join("pkg-1.2.0");
        fs::create_dir_all(wrapper.join("bin")).unwrap();
        fs::write(wrapper.join("bin/tool"), "t").unwrap();
        fs::write(wrapper.join("LICENSE"), "l").unwrap();

        flatten(root.path()).unwrap();
        assert_eq!(tree(root.path()), set(&["LICENSE", "bin/", "bin/tool"]));
    }

    #[test]
    fn test_chain_ending_in_single_file() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("wrap")).unwrap();
        fs::write(root.path().join("wrap/only"), "x").unwrap();

        flatten(root.path()).unwrap();
        assert_eq!(tree(root.path()), set(&["only"]));
    }

    #[test]
    fn test_chain_of_empty_dirs() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("a/b")).unwrap();

        flatten(root.path()).unwrap();
        assert!(tree(root.path()).is_empty());
    }

    #[test]
    fn test_name_collision_with_wrapper() {
        let root = tempdir().unwrap();
        let inner = root.path().join("tool/tool");
        fs::create_dir_all(&inner).unwrap();
        fs::write(root.path().join("tool/README"), "r").unwrap();
        fs::write(inner.join("main"), "m").unwrap();

        let outcome = flatten(root.path()).unwrap();
        assert_eq!(outcome.collapsed, [OsString::from("tool")]);
        assert_eq!(tree(root.path()), set(&["README", "tool/", "tool/main"]));
    }

    #[test]
    fn test_idempotent() {
        let root = tempdir().unwrap();
        let deep = root.path().join("x/y");
        fs::create_dir_all(deep.join("lib")).unwrap();
        fs::write(deep.join("lib/a.so"), "a").unwrap();
        fs::write(deep.join("bin"), "b").unwrap();

        flatten(root.path()).unwrap();
        let once = tree(root.path());
        let second = flatten(root.path()).unwrap();

        assert!(second.is_noop());
        assert_eq!(tree(root.path()), once);
        assert_eq!(once, set(&["bin", "lib/", "lib/a.so"]));
    }

    #[test]
    fn test_missing_root_is_error() {
        let root = tempdir().unwrap();
        assert!(flatten(&root.path().join("missing")).is_err());
    }
}
