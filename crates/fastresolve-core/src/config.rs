//! Resolver options and their validated form.
//!
//! [`ResolverOptions`] is the user-facing, serde-friendly shape (every field
//! optional, legacy toggles included). [`ResolverConfig`] is what the resolver
//! actually runs with: validated once, immutable afterwards.

use crate::error::{Error, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Manifest fields consulted when no preference is configured.
pub const DEFAULT_MAIN_FIELDS: &[&str] = &["module", "main"];

/// Extensions probed when none are configured.
///
/// `.mjs` comes before `.js` so packages shipping both an ESM `.mjs` and a
/// CommonJS `.js` build resolve to the ESM one.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mjs", ".js", ".json", ".node"];

/// Contents of the module substituted for browser-map entries set to `false`.
pub const EMPTY_MODULE_SOURCE: &str = include_str!("../assets/empty.js");

/// The shipped empty module, valid while the source tree is around.
const BUNDLED_EMPTY_MODULE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/empty.js");

/// The manifest field holding a package's default entry point.
pub const MAIN_FIELD: &str = "main";

/// The manifest field holding the browser substitution table.
pub const BROWSER_FIELD: &str = "browser";

/// An entry of the `only` allow-list.
///
/// Plain strings match a package id exactly; `{ "regex": "..." }` entries are
/// matched as regular expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OnlyPattern {
    Exact(String),
    Regex { regex: String },
}

impl OnlyPattern {
    fn compile(&self) -> Result<Regex> {
        let source = match self {
            Self::Exact(name) => format!("^{}$", regex_lite::escape(name)),
            Self::Regex { regex } => regex.clone(),
        };
        Regex::new(&source).map_err(|source_err| Error::InvalidOnlyPattern {
            pattern: source,
            source: source_err,
        })
    }
}

/// User-facing resolver options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    /// Ordered manifest fields to take the entry point from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_fields: Option<Vec<String>>,

    /// Return `None` for specifiers naming a built-in module even when a
    /// local package of that name exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_builtins: Option<bool>,

    /// Reject every resolution falling outside this directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jail: Option<PathBuf>,

    /// Only resolve package ids matching one of these patterns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<OnlyPattern>>,

    /// Extensions to probe, in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Only keep resolutions whose contents use ES module syntax.
    #[serde(default)]
    pub modules_only: bool,

    /// Keep symlinked paths as-is instead of canonicalizing them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_symlinks: Option<bool>,

    /// Passed through untouched to the path finder.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_resolve_options: Map<String, Value>,

    /// Replacement for browser-map entries set to `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_module: Option<PathBuf>,

    /// Deprecated: toggles the `browser` main field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<bool>,

    /// Deprecated: toggles the `module` main field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<bool>,

    /// Deprecated: toggles the `main` main field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<bool>,

    /// Deprecated: toggles the `jsnext:main` main field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsnext: Option<bool>,

    /// Removed option, rejected at validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Value>,
}

impl ResolverOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the preferred main fields.
    #[must_use]
    pub fn with_main_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.main_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the built-in preference explicitly.
    #[must_use]
    pub fn with_prefer_builtins(mut self, prefer: bool) -> Self {
        self.prefer_builtins = Some(prefer);
        self
    }

    /// Confine resolutions to a directory.
    #[must_use]
    pub fn with_jail(mut self, jail: impl Into<PathBuf>) -> Self {
        self.jail = Some(jail.into());
        self
    }

    /// Set the package-id allow-list.
    #[must_use]
    pub fn with_only(mut self, only: Vec<OnlyPattern>) -> Self {
        self.only = Some(only);
        self
    }

    /// Set the probed extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Only keep ES module resolutions.
    #[must_use]
    pub fn with_modules_only(mut self, modules_only: bool) -> Self {
        self.modules_only = modules_only;
        self
    }
}

/// Whether built-in module names win over local packages.
///
/// Tracks whether the choice was made explicitly, since only the implicit
/// default warns when it shadows a local package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferBuiltins {
    /// Not configured; behaves as `true`.
    #[default]
    Unset,
    Explicit(bool),
}

impl PreferBuiltins {
    #[must_use]
    pub fn from_option(value: Option<bool>) -> Self {
        value.map_or(Self::Unset, Self::Explicit)
    }

    #[must_use]
    pub fn enabled(self) -> bool {
        match self {
            Self::Unset => true,
            Self::Explicit(value) => value,
        }
    }

    #[must_use]
    pub fn is_explicit(self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

/// Validated resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Manifest fields in preference order (unique, non-empty).
    pub main_fields: Vec<String>,
    pub prefer_builtins: PreferBuiltins,
    pub jail: Option<PathBuf>,
    pub only: Option<Vec<Regex>>,
    pub extensions: Vec<String>,
    pub modules_only: bool,
    pub preserve_symlinks: Option<bool>,
    pub custom_resolve_options: Map<String, Value>,
    pub empty_module: PathBuf,
}

impl ResolverConfig {
    /// Validate options, reporting deprecation notices through `warn`.
    pub fn from_options(options: ResolverOptions, warn: &mut dyn FnMut(String)) -> Result<Self> {
        let has_legacy_toggle = [options.browser, options.module, options.main, options.jsnext]
            .iter()
            .any(Option::is_some);
        if options.main_fields.is_some() && has_legacy_toggle {
            return Err(Error::ConflictingMainFields);
        }
        if options.skip.as_ref().is_some_and(is_truthy) {
            return Err(Error::SkipUnsupported);
        }

        let mut main_fields = options.main_fields.unwrap_or_else(|| {
            DEFAULT_MAIN_FIELDS
                .iter()
                .map(|field| (*field).to_string())
                .collect()
        });
        if main_fields.iter().any(String::is_empty) {
            return Err(Error::BlankMainField);
        }
        let mut seen = std::collections::HashSet::new();
        main_fields.retain(|field| seen.insert(field.clone()));

        apply_legacy_toggle(&mut main_fields, "browser", options.browser, BROWSER_FIELD, warn);
        apply_legacy_toggle(&mut main_fields, "module", options.module, "module", warn);
        apply_legacy_toggle(&mut main_fields, "jsnext", options.jsnext, "jsnext:main", warn);
        apply_legacy_toggle(&mut main_fields, "main", options.main, MAIN_FIELD, warn);

        if main_fields.is_empty() {
            return Err(Error::EmptyMainFields);
        }

        let only = options
            .only
            .map(|patterns| {
                patterns
                    .iter()
                    .map(OnlyPattern::compile)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let extensions = options.extensions.unwrap_or_else(|| {
            DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect()
        });

        Ok(Self {
            main_fields,
            prefer_builtins: PreferBuiltins::from_option(options.prefer_builtins),
            jail: options.jail,
            only,
            extensions,
            modules_only: options.modules_only,
            preserve_symlinks: options.preserve_symlinks,
            custom_resolve_options: options.custom_resolve_options,
            empty_module: match options.empty_module {
                Some(path) => path,
                None => default_empty_module()?,
            },
        })
    }

    /// Whether package browser maps take part in resolution.
    #[must_use]
    pub fn browser_enabled(&self) -> bool {
        self.main_fields.iter().any(|field| field == BROWSER_FIELD)
    }

    /// Whether `package_id` passes the allow-list (always true without one).
    #[must_use]
    pub fn allows(&self, package_id: &str) -> bool {
        self.only
            .as_ref()
            .map_or(true, |patterns| patterns.iter().any(|re| re.is_match(package_id)))
    }
}

/// Path of the default empty module.
///
/// Installed binaries no longer have the source tree, so the module is
/// written to the temp directory instead.
fn default_empty_module() -> Result<PathBuf> {
    let bundled = Path::new(BUNDLED_EMPTY_MODULE);
    if bundled.is_file() {
        return Ok(bundled.to_path_buf());
    }
    materialize_empty_module(&std::env::temp_dir().join("fastresolve"))
}

/// Write [`EMPTY_MODULE_SOURCE`] as `empty.js` under `dir` unless present.
fn materialize_empty_module(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("empty.js");
    if !path.is_file() {
        std::fs::create_dir_all(dir)
            .and_then(|()| std::fs::write(&path, EMPTY_MODULE_SOURCE))
            .map_err(|source| Error::EmptyModuleWrite {
                path: path.clone(),
                source,
            })?;
    }
    Ok(path)
}

/// JavaScript truthiness, for options hosts may set to `false` or `null`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn apply_legacy_toggle(
    main_fields: &mut Vec<String>,
    option: &str,
    value: Option<bool>,
    field: &str,
    warn: &mut dyn FnMut(String),
) {
    let Some(enabled) = value else {
        return;
    };

    warn(format!(
        "setting options.{option} is deprecated, please override options.mainFields instead"
    ));

    if enabled {
        if !main_fields.iter().any(|existing| existing == field) {
            main_fields.push(field.to_string());
        }
    } else {
        main_fields.retain(|existing| existing != field);
    }
}
