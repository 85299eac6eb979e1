//! Compile request errors.

use std::path::PathBuf;

use thiserror::Error;
use tplc_codegen::CodegenError;
use tplc_types::CompileErrors;

/// A failure of one compile request. Every variant aborts the request.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A template glob is malformed. Matching nothing is not an error.
    #[error("invalid template glob {pattern:?}: {source}")]
    Discovery {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The template front end rejected a unit.
    #[error("template {unit:?} ({path}) has errors:\n{errors}")]
    Parse {
        unit: String,
        /// File path, or `<inline>` for inline content.
        path: String,
        errors: CompileErrors,
    },

    /// A template construct could not be translated to Go.
    #[error("failed to convert template {template:?} of {unit:?}: {source}")]
    Conversion {
        unit: String,
        template: String,
        #[source]
        source: CodegenError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't determine the package name for {}: {reason}", path.display())]
    PackageLookup { path: PathBuf, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type CompileResult<T> = Result<T, CompileError>;
