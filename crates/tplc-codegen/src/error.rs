//! Codegen error types.

use thiserror::Error;

/// Errors that can occur while converting a template tree to Go.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A template construct has no Go translation.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// A variable or dot binding is missing from the scope state.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// A value's shape does not allow the requested operation.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
