#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

//! Package-aware module resolution for bundlers.
//!
//! A [`Resolver`] maps an import specifier plus its importer to a file on
//! disk, or to `None` when the host should treat the import as external.
//! Package manifests are honored (preferred main fields, `browser` maps),
//! along with an allow-list, a jail directory and built-in module
//! preference. All filesystem access is memoized per path until
//! [`Resolver::invalidate_caches`].

pub mod browser;
pub mod builtins;
pub mod config;
pub mod error;
pub mod finder;
pub mod fs;
pub mod manifest;
pub mod resolver;
pub mod specifier;
pub mod syntax;
pub mod version;

pub use config::{OnlyPattern, PreferBuiltins, ResolverConfig, ResolverOptions};
pub use error::Error;
pub use finder::{FindError, FindOptions, ManifestHook, ManifestRole, NodePathFinder, PathFinder};
pub use fs::{CachedFs, FileSystem, OsFileSystem};
pub use resolver::{Resolver, ResolverBuilder, WarningHandler};
pub use version::VERSION;
