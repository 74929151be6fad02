//! Package `browser` field support.
//!
//! A manifest's `browser` object remaps module paths (or disables them with
//! `false`). [`build_browser_map`] expands it into every key form a later
//! lookup may use; [`BrowserMapCache`] remembers which map applied to each
//! resolved file so imports made from that file are rewritten the same way.

use crate::config::BROWSER_FIELD;
use fastresolve_util::path;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Replacement registered for a browser-map key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserTarget {
    /// Load this absolute path instead.
    Path(PathBuf),
    /// The key was mapped to `false`: substitute an empty module.
    Empty,
}

/// Expanded browser map of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserMap {
    entries: HashMap<String, BrowserTarget>,
}

impl BrowserMap {
    /// Look up a raw key (specifier or absolute path string).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BrowserTarget> {
        self.entries.get(key)
    }

    /// Look up an absolute path.
    #[must_use]
    pub fn get_path(&self, path: &Path) -> Option<&BrowserTarget> {
        self.entries.get(path.to_string_lossy().as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: impl Into<String>, target: BrowserTarget) {
        self.entries.insert(key.into(), target);
    }
}

/// Build the browser map for a manifest located in `manifest_dir`.
///
/// Returns `None` unless the manifest's `browser` field is an object. Every
/// key is registered as written; keys starting with `.` are also registered
/// in absolute form and, when extensionless, with each of `extensions`
/// appended.
#[must_use]
pub fn build_browser_map(
    manifest: &Value,
    manifest_dir: &Path,
    extensions: &[String],
) -> Option<BrowserMap> {
    let table = manifest.get(BROWSER_FIELD)?.as_object()?;
    let mut map = BrowserMap::default();

    for (key, value) in table {
        let target = match value {
            Value::Bool(false) => BrowserTarget::Empty,
            Value::String(replacement) => {
                BrowserTarget::Path(path::resolve(manifest_dir, replacement))
            }
            _ => continue,
        };

        if key.starts_with('.') {
            let absolute = path::resolve(manifest_dir, key);
            if !path::has_extension(key) {
                for ext in extensions {
                    map.insert(
                        path::append_suffix(&absolute, ext).to_string_lossy(),
                        target.clone(),
                    );
                }
            }
            map.insert(absolute.to_string_lossy(), target.clone());
        }
        map.insert(key.clone(), target);
    }

    Some(map)
}

/// How an importer's browser map rewrites one of its imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRewrite {
    Unchanged,
    /// Resolve this specifier instead.
    Replace(String),
    /// Short-circuit to the empty module.
    Empty,
}

/// Apply `map` to `specifier` imported from a file in `importer_dir`.
///
/// Only the raw specifier and its resolved form can disable a module. For
/// replacements, the resolved form is also tried with `.js` and `.json`
/// appended, which are the extensions an earlier resolution most likely added.
#[must_use]
pub fn rewrite_import(map: &BrowserMap, specifier: &str, importer_dir: &Path) -> ImportRewrite {
    let resolved = path::resolve(importer_dir, specifier);
    let resolved_key = resolved.to_string_lossy().into_owned();

    if map.get(specifier) == Some(&BrowserTarget::Empty)
        || map.get(&resolved_key) == Some(&BrowserTarget::Empty)
    {
        return ImportRewrite::Empty;
    }

    let js_key = format!("{resolved_key}.js");
    let json_key = format!("{resolved_key}.json");
    let replacement = [
        specifier,
        resolved_key.as_str(),
        js_key.as_str(),
        json_key.as_str(),
    ]
    .into_iter()
    .filter_map(|key| map.get(key))
    .find_map(|target| match target {
        BrowserTarget::Path(path) => Some(path),
        BrowserTarget::Empty => None,
    });

    match replacement {
        Some(path) => ImportRewrite::Replace(path.to_string_lossy().into_owned()),
        None => ImportRewrite::Unchanged,
    }
}

/// Resolved file → browser map of the package it belongs to.
#[derive(Debug, Default)]
pub struct BrowserMapCache {
    entries: RwLock<HashMap<PathBuf, Arc<BrowserMap>>>,
}

impl BrowserMapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the map that applied when `resolved` was resolved.
    pub fn record(&self, resolved: PathBuf, map: Arc<BrowserMap>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resolved, map);
    }

    /// The map recorded for an importer, if any.
    #[must_use]
    pub fn lookup(&self, importer: &Path) -> Option<Arc<BrowserMap>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(importer)
            .cloned()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
