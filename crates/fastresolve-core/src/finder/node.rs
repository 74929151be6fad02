//! Node-style path finder.
//!
//! Supports:
//! - Relative (`./`, `../`) and absolute specifiers
//! - Bare specifiers via `node_modules` lookup, walking up from the base dir
//! - Extension probing (appended, never replacing an existing extension)
//! - Directory resolution (`package.json` main, then `index.*`)
//!
//! Custom options: `moduleDirectory` (string or list, default
//! `node_modules`) and `paths` (extra lookup directories).

use super::{FindError, FindOptions, ManifestHook, ManifestRole, PathFinder};
use crate::config::MAIN_FIELD;
use crate::fs::CachedFs;
use async_trait::async_trait;
use fastresolve_util::path;
use serde_json::{Map, Value};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Package lookup directory used when `moduleDirectory` is not set.
pub const DEFAULT_MODULE_DIRECTORY: &str = "node_modules";

const MANIFEST_FILE: &str = "package.json";

/// Default path finder, following Node's `require.resolve` lookup rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePathFinder;

#[async_trait]
impl PathFinder for NodePathFinder {
    async fn find(&self, specifier: &str, options: FindOptions<'_>) -> Result<PathBuf, FindError> {
        let FindOptions {
            base_dir,
            manifest_hook,
            fs,
            extensions,
            preserve_symlinks,
            custom,
        } = options;

        let base_dir = if preserve_symlinks == Some(false) {
            fs.real_path(base_dir)
                .await
                .unwrap_or_else(|_| base_dir.to_path_buf())
        } else {
            base_dir.to_path_buf()
        };

        let module_dirs = module_directories(custom);
        let mut lookup = Lookup {
            fs,
            hook: manifest_hook,
            extensions,
            module_dirs: &module_dirs,
        };

        let found = if is_path_specifier(specifier) {
            let target = path::resolve(&base_dir, specifier);
            lookup.load(&target).await?
        } else {
            let mut found = None;
            for dir in module_paths(&base_dir, &module_dirs, custom) {
                let target = path::resolve(&dir, specifier);
                if let Some(file) = lookup.load(&target).await? {
                    found = Some(file);
                    break;
                }
            }
            found
        };

        found.ok_or_else(|| FindError::NotFound {
            specifier: specifier.to_string(),
            base_dir,
        })
    }
}

/// Whether a specifier names a path rather than a package.
fn is_path_specifier(spec: &str) -> bool {
    spec == "."
        || spec == ".."
        || spec.starts_with("./")
        || spec.starts_with("../")
        || Path::new(spec).is_absolute()
        || spec.starts_with('/')
}

/// Package directory names from `moduleDirectory`, defaulting to `node_modules`.
fn module_directories(custom: &Map<String, Value>) -> Vec<String> {
    let mut module_dirs = string_list(custom.get("moduleDirectory"));
    if module_dirs.is_empty() {
        module_dirs.push(DEFAULT_MODULE_DIRECTORY.to_string());
    }
    module_dirs
}

fn is_module_dir(dir: &Path, module_dirs: &[String]) -> bool {
    dir.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| module_dirs.iter().any(|m| m == name))
}

/// Directories searched for bare specifiers, nearest first.
fn module_paths(
    base_dir: &Path,
    module_dirs: &[String],
    custom: &Map<String, Value>,
) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for ancestor in base_dir.ancestors() {
        // Never look for `node_modules/node_modules`
        if is_module_dir(ancestor, module_dirs) {
            continue;
        }
        for module_dir in module_dirs {
            dirs.push(ancestor.join(module_dir));
        }
    }

    dirs.extend(
        string_list(custom.get("paths"))
            .into_iter()
            .map(|extra| path::resolve(base_dir, extra)),
    );
    dirs
}

/// A string or list of strings from a custom option.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

/// State of one lookup.
struct Lookup<'a> {
    fs: &'a CachedFs,
    hook: &'a mut dyn ManifestHook,
    extensions: &'a [String],
    module_dirs: &'a [String],
}

impl Lookup<'_> {
    /// Load `target` as a file, then as a directory.
    async fn load(&mut self, target: &Path) -> Result<Option<PathBuf>, FindError> {
        if let Some(file) = self.load_as_file(target).await? {
            return Ok(Some(file));
        }
        self.load_as_directory(target).await
    }

    async fn load_as_file(&mut self, target: &Path) -> Result<Option<PathBuf>, FindError> {
        let mut found = None;
        if self.is_file(target).await? {
            found = Some(target.to_path_buf());
        } else {
            for ext in self.extensions {
                let candidate = path::append_suffix(target, ext);
                if self.is_file(&candidate).await? {
                    found = Some(candidate);
                    break;
                }
            }
        }

        if let Some(file) = &found {
            self.apply_scope_manifest(file).await?;
        }
        Ok(found)
    }

    async fn load_as_directory(&mut self, dir: &Path) -> Result<Option<PathBuf>, FindError> {
        let manifest_path = dir.join(MANIFEST_FILE);

        if let Some(mut manifest) = self.read_manifest(&manifest_path).await? {
            self.hook
                .filter(&mut manifest, &manifest_path, ManifestRole::Entry);

            if let Some(main) = manifest.get(MAIN_FIELD).and_then(Value::as_str) {
                let main_path = path::resolve(dir, main);
                if main_path != dir {
                    if let Some(file) = self.load_as_file(&main_path).await? {
                        return Ok(Some(file));
                    }
                }
                if let Some(file) = self.load_as_file(&main_path.join("index")).await? {
                    return Ok(Some(file));
                }
            }
        }

        self.load_as_file(&dir.join("index")).await
    }

    /// Hand the nearest manifest enclosing `file` to the hook.
    ///
    /// The search stops at a package-directory boundary so a package
    /// without a manifest never picks up its consumer's.
    async fn apply_scope_manifest(&mut self, file: &Path) -> Result<(), FindError> {
        let mut dir = Some(path::parent_dir(file));

        while let Some(current) = dir {
            if is_module_dir(current, self.module_dirs) {
                break;
            }

            let manifest_path = current.join(MANIFEST_FILE);
            if let Some(mut manifest) = self.read_manifest(&manifest_path).await? {
                self.hook
                    .filter(&mut manifest, &manifest_path, ManifestRole::Scope);
                break;
            }

            dir = current.parent();
        }

        Ok(())
    }

    async fn is_file(&self, path: &Path) -> Result<bool, FindError> {
        self.fs.is_file(path).await.map_err(|source| FindError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a manifest. Missing or malformed manifests are `None`.
    async fn read_manifest(&self, manifest_path: &Path) -> Result<Option<Value>, FindError> {
        if !self.is_file(manifest_path).await? {
            return Ok(None);
        }

        let bytes = self
            .fs
            .read_file(manifest_path)
            .await
            .map_err(|source| FindError::Io {
                path: manifest_path.to_path_buf(),
                source,
            })?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(path = %manifest_path.display(), error = %err, "ignoring invalid package.json");
                Ok(None)
            }
        }
    }
}
