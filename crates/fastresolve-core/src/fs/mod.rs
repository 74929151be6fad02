//! Filesystem access for the resolver.
//!
//! [`FileSystem`] is the raw, uncached backend; [`CachedFs`] layers the
//! per-path memoization every resolution goes through on top of it.

mod memo;

pub use memo::{CachedFs, SharedIoError};

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};

/// Raw filesystem operations used during resolution.
///
/// Implementations report "not found" as an [`io::ErrorKind::NotFound`]
/// error; the caching layer decides what that means.
#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Read a whole file.
    async fn read(&self, path: &Path) -> io::Result<Bytes>;

    /// Whether `path` exists and is a regular file (after following symlinks).
    async fn is_file(&self, path: &Path) -> io::Result<bool>;

    /// Resolve symlinks and return the absolute canonical path.
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The real filesystem, via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

#[async_trait]
impl FileSystem for OsFileSystem {
    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        tokio::fs::read(path).await.map(Bytes::from)
    }

    async fn is_file(&self, path: &Path) -> io::Result<bool> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(meta.is_file())
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let canonical = tokio::fs::canonicalize(path).await?;
        // Strip the `\\?\` prefix on Windows so paths compare with user input.
        Ok(dunce::simplified(&canonical).to_path_buf())
    }
}
