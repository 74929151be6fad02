//! Resolution orchestration.
//!
//! [`Resolver::resolve`] wraps a [`PathFinder`] with the package-aware rules
//! a bundler needs, applied in a fixed order:
//!
//! 1. Ignore virtual ids (containing `\0`) and entry modules (no importer)
//! 2. Rewrite the specifier through the importer's browser map
//! 3. Drop package ids outside the `only` allow-list
//! 4. Run the path finder, capturing browser maps and main-field decisions
//! 5. Treat path-finder failures as "unresolved"
//! 6. Apply the package's browser map to the found file
//! 7. Drop results that relied on a manifest without a preferred main field
//! 8. Canonicalize, then reject built-ins and anything outside the jail
//! 9. With `modules_only`, keep only files written as ES modules

use crate::browser::{
    build_browser_map, rewrite_import, BrowserMap, BrowserMapCache, BrowserTarget, ImportRewrite,
};
use crate::builtins::is_builtin;
use crate::config::{ResolverConfig, ResolverOptions};
use crate::error::Result;
use crate::finder::{FindOptions, ManifestHook, ManifestRole, NodePathFinder, PathFinder};
use crate::fs::{CachedFs, FileSystem, OsFileSystem};
use crate::manifest::select_main_field;
use crate::specifier::package_id;
use crate::syntax::is_module;
use fastresolve_util::path;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

/// Receives advisory warnings (deprecated options, shadowed built-ins).
pub type WarningHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    options: ResolverOptions,
    file_system: Arc<dyn FileSystem>,
    path_finder: Arc<dyn PathFinder>,
    on_warn: Option<WarningHandler>,
}

impl ResolverBuilder {
    /// Use a different filesystem backend (defaults to [`OsFileSystem`]).
    #[must_use]
    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = file_system;
        self
    }

    /// Use a different path finder (defaults to [`NodePathFinder`]).
    #[must_use]
    pub fn path_finder(mut self, path_finder: Arc<dyn PathFinder>) -> Self {
        self.path_finder = path_finder;
        self
    }

    /// Route warnings to `handler` instead of the `tracing` log.
    #[must_use]
    pub fn on_warn(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_warn = Some(Arc::new(handler));
        self
    }

    /// Validate the options and create the resolver.
    pub fn build(self) -> Result<Resolver> {
        let warnings = Warnings::new(self.on_warn.unwrap_or_else(|| Arc::new(log_warning)));
        let config = ResolverConfig::from_options(self.options, &mut |msg| warnings.emit(msg))?;

        Ok(Resolver {
            preserve_symlinks: RwLock::new(config.preserve_symlinks),
            config,
            fs: CachedFs::new(self.file_system),
            path_finder: self.path_finder,
            browser_maps: BrowserMapCache::new(),
            warnings,
        })
    }
}

fn log_warning(msg: &str) {
    tracing::warn!("{msg}");
}

/// Warning sink reporting each distinct message once.
struct Warnings {
    handler: WarningHandler,
    emitted: Mutex<HashSet<String>>,
}

impl Warnings {
    fn new(handler: WarningHandler) -> Self {
        Self {
            handler,
            emitted: Mutex::new(HashSet::new()),
        }
    }

    fn emit(&self, msg: String) {
        let first = self
            .emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(msg.clone());
        if first {
            (self.handler)(&msg);
        }
    }
}

/// Per-request side channel filled in by the manifest hook.
struct RequestContext<'c> {
    config: &'c ResolverConfig,
    browser_map: Option<BrowserMap>,
    disregard: bool,
}

impl<'c> RequestContext<'c> {
    fn new(config: &'c ResolverConfig) -> Self {
        Self {
            config,
            browser_map: None,
            disregard: false,
        }
    }
}

impl ManifestHook for RequestContext<'_> {
    fn filter(&mut self, manifest: &mut Value, manifest_path: &Path, role: ManifestRole) {
        if self.config.browser_enabled() {
            let manifest_dir = path::parent_dir(manifest_path);
            if let Some(map) = build_browser_map(manifest, manifest_dir, &self.config.extensions) {
                self.browser_map = Some(map);
            }
        }

        let disregard = select_main_field(manifest, &self.config.main_fields);
        // Only a directory's entry point depends on the main field.
        if disregard && role == ManifestRole::Entry {
            self.disregard = true;
        }
    }
}

/// Package-aware module resolver.
///
/// Owns the I/O and browser-map caches; both live until
/// [`Resolver::invalidate_caches`] is called.
pub struct Resolver {
    config: ResolverConfig,
    fs: CachedFs,
    path_finder: Arc<dyn PathFinder>,
    browser_maps: BrowserMapCache,
    preserve_symlinks: RwLock<Option<bool>>,
    warnings: Warnings,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("fs", &self.fs)
            .field("path_finder", &self.path_finder)
            .field("browser_maps", &self.browser_maps)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Start building a resolver from options.
    #[must_use]
    pub fn builder(options: ResolverOptions) -> ResolverBuilder {
        ResolverBuilder {
            options,
            file_system: Arc::new(OsFileSystem),
            path_finder: Arc::new(NodePathFinder),
            on_warn: None,
        }
    }

    /// Create a resolver with the default filesystem and path finder.
    pub fn new(options: ResolverOptions) -> Result<Self> {
        Self::builder(options).build()
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Host hook: set the symlink policy before resolving anything.
    ///
    /// `Some(true)` keeps symlinked paths as found; otherwise results are
    /// canonicalized.
    pub fn set_preserve_symlinks(&self, preserve: Option<bool>) {
        *self
            .preserve_symlinks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = preserve;
    }

    fn preserve_symlinks(&self) -> Option<bool> {
        *self
            .preserve_symlinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget every cached read, stat and browser map.
    ///
    /// Must only be called while no resolution is in flight.
    pub fn invalidate_caches(&self) {
        debug!(
            io_entries = self.fs.len(),
            browser_maps = self.browser_maps.len(),
            "invalidating resolver caches"
        );
        self.fs.clear();
        self.browser_maps.clear();
    }

    /// Resolve `specifier` imported from `importer`.
    ///
    /// `None` means "not this resolver's business": the host should treat
    /// the import as external or try another strategy.
    pub async fn resolve(&self, specifier: &str, importer: Option<&Path>) -> Option<PathBuf> {
        if specifier.contains('\0') {
            return None;
        }
        // Entry modules are resolved by the host.
        let importer = importer?;
        let importer_dir = path::parent_dir(importer);

        let mut target = specifier.to_string();
        if self.config.browser_enabled() {
            if let Some(map) = self.browser_maps.lookup(importer) {
                match rewrite_import(&map, specifier, importer_dir) {
                    ImportRewrite::Empty => {
                        debug!(specifier, "browser map disables import");
                        return Some(self.config.empty_module.clone());
                    }
                    ImportRewrite::Replace(replacement) => {
                        debug!(specifier, replacement = %replacement, "browser map rewrites import");
                        target = replacement;
                    }
                    ImportRewrite::Unchanged => {}
                }
            }
        }

        let id = package_id(&target, importer);
        if !self.config.allows(&id) {
            debug!(specifier, package_id = %id, "package not in allow-list");
            return None;
        }

        let mut ctx = RequestContext::new(&self.config);
        let found = self
            .path_finder
            .find(
                &target,
                FindOptions {
                    base_dir: importer_dir,
                    manifest_hook: &mut ctx,
                    fs: &self.fs,
                    extensions: &self.config.extensions,
                    preserve_symlinks: self.preserve_symlinks(),
                    custom: &self.config.custom_resolve_options,
                },
            )
            .await;

        let mut resolved = match found {
            Ok(path) => Some(path),
            Err(err) => {
                debug!(specifier, error = %err, "path finder found nothing");
                None
            }
        };

        let mut browser_map = None;
        if let (Some(map), Some(file)) = (ctx.browser_map.take(), resolved.as_mut()) {
            match map.get_path(file) {
                Some(BrowserTarget::Path(replacement)) => *file = replacement.clone(),
                Some(BrowserTarget::Empty) => file.clone_from(&self.config.empty_module),
                None => {}
            }
            let map = Arc::new(map);
            self.browser_maps.record(file.clone(), Arc::clone(&map));
            browser_map = Some(map);
        }

        if ctx.disregard && resolved.is_some() {
            debug!(specifier, "package has no entry under the configured main fields");
            resolved = None;
        }

        let mut resolved = resolved?;

        if self.preserve_symlinks() != Some(true) {
            if let Ok(real) = self.fs.real_path(&resolved).await {
                if real != resolved {
                    if let Some(map) = &browser_map {
                        self.browser_maps.record(real.clone(), Arc::clone(map));
                    }
                    resolved = real;
                }
            }
        }

        if is_builtin(&resolved.to_string_lossy()) {
            return None;
        }

        if is_builtin(specifier) && self.config.prefer_builtins.enabled() {
            if !self.config.prefer_builtins.is_explicit() {
                self.warnings.emit(format!(
                    "preferring built-in module '{specifier}' over local alternative at '{}', \
                     pass 'preferBuiltins: false' to disable this behavior or \
                     'preferBuiltins: true' to disable this warning",
                    resolved.display()
                ));
            }
            return None;
        }

        if let Some(jail) = &self.config.jail {
            if !resolved.starts_with(path::normalize(jail)) {
                debug!(specifier, resolved = %resolved.display(), "resolved outside jail");
                return None;
            }
        }

        if self.config.modules_only {
            let is_esm = match self.fs.read_file(&resolved).await {
                Ok(contents) => is_module(&String::from_utf8_lossy(&contents)),
                Err(err) => {
                    debug!(resolved = %resolved.display(), error = %err, "cannot read resolved file");
                    false
                }
            };
            if !is_esm {
                return None;
            }
        }

        Some(resolved)
    }
}
