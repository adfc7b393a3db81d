//! Path sandbox (`spec.md` §4.1, §4.1.A).
//!
//! The trust boundary for every filesystem-touching tool: resolve a
//! caller-supplied relative path against the fixed project root and refuse
//! anything that would escape it. Grounded in `safe_path()` in
//! `original_source/sources/workflow/tools.py`, generalized to also handle
//! write targets whose final path component does not exist yet (Python's
//! `Path.resolve()` tolerates this; Rust's `std::fs::canonicalize` does
//! not).

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("escapes_root")]
pub struct EscapesRoot;

/// Resolves `rel` against `root`, following symlinks on every existing
/// path component, and confirms the result is `root` itself or a
/// descendant of it.
///
/// Empty and `"."` resolve to `root` itself (`spec.md` §4.1). Non-existent
/// trailing components (write targets) are resolved lexically against the
/// canonical form of the nearest existing ancestor, since a component that
/// doesn't exist can't be a symlink.
pub fn resolve(root: &Path, rel: &str) -> Result<PathBuf, EscapesRoot> {
    let root = root.canonicalize().map_err(|_| EscapesRoot)?;
    let joined = root.join(rel);

    let mut existing = joined.as_path();
    let mut missing_tail: Vec<std::ffi::OsString> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canon_existing) => {
                let mut resolved = canon_existing;
                for component in missing_tail.iter().rev() {
                    resolved.push(component);
                }
                let resolved = normalize_lexically(&resolved);
                return contain(&root, resolved);
            }
            Err(_) => {
                let Some(parent) = existing.parent() else {
                    return Err(EscapesRoot);
                };
                if let Some(name) = existing.file_name() {
                    missing_tail.push(name.to_os_string());
                }
                existing = parent;
            }
        }
    }
}

fn contain(root: &Path, candidate: PathBuf) -> Result<PathBuf, EscapesRoot> {
    if candidate == root || candidate.starts_with(root) {
        Ok(candidate)
    } else {
        Err(EscapesRoot)
    }
}

/// Purely lexical `.`/`..` normalization for path components that don't
/// exist on disk yet and therefore cannot be resolved by `canonicalize`.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
