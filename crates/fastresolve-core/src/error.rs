use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fastresolve.
///
/// Only configuration problems are errors; unresolvable specifiers are
/// reported as `None` by the resolver.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read resolver options at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse resolver options at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("do not use deprecated 'browser', 'module', 'main', 'jsnext' options with 'mainFields'")]
    ConflictingMainFields,

    #[error("Please ensure at least one 'mainFields' value is specified")]
    EmptyMainFields,

    #[error("'mainFields' entries must be non-empty strings")]
    BlankMainField,

    #[error("options.skip is no longer supported, use the host's `external` option instead")]
    SkipUnsupported,

    #[error("Failed to write the default empty module to {path}: {source}")]
    EmptyModuleWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid 'only' pattern {pattern:?}: {source}")]
    InvalidOnlyPattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

/// Result alias for fastresolve operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
