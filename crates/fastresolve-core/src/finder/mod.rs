//! Path-finder seam.
//!
//! A [`PathFinder`] turns a specifier plus a base directory into a file,
//! doing package lookup, manifest entry resolution and extension probing.
//! The resolver wraps it with its own rules; [`NodePathFinder`] is the
//! default Node-style implementation.

mod node;

pub use node::NodePathFinder;

use crate::fs::{CachedFs, SharedIoError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What a manifest handed to a [`ManifestHook`] is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestRole {
    /// The manifest of a directory being resolved; its `main` picks the file.
    Entry,
    /// The nearest manifest enclosing a file that was found.
    Scope,
}

/// Callback invoked for every manifest the path finder reads.
///
/// The hook may rewrite the manifest (the finder uses the rewritten `main`)
/// and record whatever it needs for the caller to inspect afterwards.
pub trait ManifestHook: Send + Sync {
    fn filter(&mut self, manifest: &mut Value, manifest_path: &Path, role: ManifestRole);
}

/// Hook that leaves manifests untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl ManifestHook for NoopHook {
    fn filter(&mut self, _manifest: &mut Value, _manifest_path: &Path, _role: ManifestRole) {}
}

/// Inputs of one path-finder call.
pub struct FindOptions<'a> {
    /// Directory relative specifiers and package lookup start from.
    pub base_dir: &'a Path,
    pub manifest_hook: &'a mut dyn ManifestHook,
    /// Memoized filesystem all reads and stats must go through.
    pub fs: &'a CachedFs,
    /// Extensions to probe, in order.
    pub extensions: &'a [String],
    /// Explicit symlink policy; `None` leaves the finder's default.
    pub preserve_symlinks: Option<bool>,
    /// Finder-specific options, passed through from configuration.
    pub custom: &'a Map<String, Value>,
}

impl std::fmt::Debug for FindOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindOptions")
            .field("base_dir", &self.base_dir)
            .field("extensions", &self.extensions)
            .field("preserve_symlinks", &self.preserve_symlinks)
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

/// Why a path finder produced no file.
#[derive(Error, Debug)]
pub enum FindError {
    #[error("Cannot find module '{specifier}' from '{}'", base_dir.display())]
    NotFound {
        specifier: String,
        base_dir: PathBuf,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: SharedIoError,
    },
}

/// Locates the file a specifier refers to.
#[async_trait]
pub trait PathFinder: Send + Sync + std::fmt::Debug {
    async fn find(&self, specifier: &str, options: FindOptions<'_>) -> Result<PathBuf, FindError>;
}
