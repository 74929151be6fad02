//! Memoized filesystem reads.
//!
//! Each operation is keyed by path. The first caller stores a shared pending
//! future before the I/O starts; concurrent and later callers await that same
//! future. Failures other than "not found" are evicted so the next call retries.

use super::FileSystem;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// I/O error shared between every caller waiting on the same operation.
pub type SharedIoError = Arc<io::Error>;

type Pending<T> = Shared<BoxFuture<'static, Result<T, SharedIoError>>>;

struct Memo<T> {
    op: &'static str,
    entries: Mutex<HashMap<PathBuf, Pending<T>>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(op: &'static str) -> Self {
        Self {
            op,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Pending<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn get_or_start<F>(&self, path: &Path, start: F) -> Result<T, SharedIoError>
    where
        F: FnOnce(PathBuf) -> BoxFuture<'static, Result<T, SharedIoError>>,
    {
        let pending = {
            let mut entries = self.entries();
            if let Some(existing) = entries.get(path) {
                trace!(op = self.op, path = %path.display(), "io cache hit");
                existing.clone()
            } else {
                trace!(op = self.op, path = %path.display(), "io cache miss");
                let pending = start(path.to_path_buf()).shared();
                entries.insert(path.to_path_buf(), pending.clone());
                pending
            }
        };

        let result = pending.clone().await;

        if result.is_err() {
            let mut entries = self.entries();
            // A newer attempt may already have replaced this entry.
            if entries
                .get(path)
                .is_some_and(|current| current.ptr_eq(&pending))
            {
                entries.remove(path);
            }
        }

        result
    }

    fn clear(&self) {
        self.entries().clear();
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

impl<T> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().map_or(0, |entries| entries.len());
        f.debug_struct("Memo")
            .field("op", &self.op)
            .field("entries", &len)
            .finish()
    }
}

/// Filesystem wrapper deduplicating reads, stats and canonicalizations.
#[derive(Debug)]
pub struct CachedFs {
    backend: Arc<dyn FileSystem>,
    reads: Memo<Bytes>,
    stats: Memo<bool>,
    real_paths: Memo<PathBuf>,
}

impl CachedFs {
    /// Wrap a filesystem backend.
    #[must_use]
    pub fn new(backend: Arc<dyn FileSystem>) -> Self {
        Self {
            backend,
            reads: Memo::new("read_file"),
            stats: Memo::new("is_file"),
            real_paths: Memo::new("real_path"),
        }
    }

    /// Read a file's contents.
    pub async fn read_file(&self, path: &Path) -> Result<Bytes, SharedIoError> {
        let backend = Arc::clone(&self.backend);
        self.reads
            .get_or_start(path, move |path| {
                async move { backend.read(&path).await.map_err(Arc::new) }.boxed()
            })
            .await
    }

    /// Whether `path` is a regular file. A missing path is `Ok(false)`.
    pub async fn is_file(&self, path: &Path) -> Result<bool, SharedIoError> {
        let backend = Arc::clone(&self.backend);
        self.stats
            .get_or_start(path, move |path| {
                async move {
                    match backend.is_file(&path).await {
                        Ok(is_file) => Ok(is_file),
                        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
                        Err(err) => Err(Arc::new(err)),
                    }
                }
                .boxed()
            })
            .await
    }

    /// Canonical path of `path`, following symlinks.
    pub async fn real_path(&self, path: &Path) -> Result<PathBuf, SharedIoError> {
        let backend = Arc::clone(&self.backend);
        self.real_paths
            .get_or_start(path, move |path| {
                async move { backend.canonicalize(&path).await.map_err(Arc::new) }.boxed()
            })
            .await
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.reads.clear();
        self.stats.clear();
        self.real_paths.clear();
    }

    /// Number of paths currently cached across all operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len() + self.stats.len() + self.real_paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
