//! Lexical path helpers.
//!
//! None of these touch the filesystem: `..` is collapsed textually, the way
//! Node's `path.resolve` does, so symlinks are not followed.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem.
///
/// `..` at the root stays at the root. Leading `..` components of a relative
/// path are kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }

    out
}

/// Resolve `target` against `base` and normalize the result.
///
/// An absolute `target` replaces `base` entirely.
#[must_use]
pub fn resolve(base: &Path, target: impl AsRef<Path>) -> PathBuf {
    normalize(&base.join(target))
}

/// Append a raw suffix (typically an extension like `.js`) to a path.
///
/// Unlike [`Path::with_extension`] this never replaces an existing extension:
/// `foo.min` + `.js` is `foo.min.js`.
#[must_use]
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Whether the final component of `spec` carries a file extension.
#[must_use]
pub fn has_extension(spec: &str) -> bool {
    Path::new(spec).extension().is_some()
}

/// Directory part of a file path, falling back to `.` for bare names.
#[must_use]
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
