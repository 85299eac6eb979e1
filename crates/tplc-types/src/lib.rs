//! Shared types for the tplc template compiler.
//!
//! This crate defines the template tree nodes, source spans, structured
//! diagnostics, data shapes, function libraries and the scope state produced
//! by the analyzer. Every other stage depends on it.

mod error;
mod span;
pub mod ast;
pub mod scope;
pub mod shape;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, Severity, TemplateError, MAX_ERRORS};
pub use scope::{Binding, ScopeState};
pub use shape::{
    builtin_result, direct_index, DataConfiguration, FuncDescriptor, FunctionLibrary, Shape,
    BUILTIN_FUNCTIONS,
};
pub use span::{SourceFile, Span};

/// Result type used throughout the template front end.
pub type Result<T> = std::result::Result<T, TemplateError>;
