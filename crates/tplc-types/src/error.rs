use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Reference,
    Shape,
    Escaping,
}

/// Numeric diagnostic code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_ACTION: Self = Self(101);
    pub const UNEXPECTED_END: Self = Self(102);
    pub const UNCLOSED_BLOCK: Self = Self(103);
    pub const UNTERMINATED_STRING: Self = Self(104);
    pub const BAD_NUMBER: Self = Self(105);
    pub const UNCLOSED_COMMENT: Self = Self(106);
    pub const EMPTY_PIPELINE: Self = Self(107);

    // ── Reference errors (E200–E299) ──
    pub const UNDEFINED_FUNCTION: Self = Self(200);
    pub const UNDEFINED_VARIABLE: Self = Self(201);
    pub const NOT_A_FUNCTION: Self = Self(202);

    // ── Shape errors (E300–E399) ──
    pub const UNKNOWN_FIELD: Self = Self(300);
    pub const NOT_RANGEABLE: Self = Self(301);
    pub const WRONG_ARG_COUNT: Self = Self(302);

    // ── Escaping errors (E400–E499) ──
    pub const BRANCH_CONTEXT_MISMATCH: Self = Self(400);
    pub const UNSAFE_ACTION_CONTEXT: Self = Self(401);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Reference,
            300..=399 => ErrorCategory::Shape,
            400..=499 => ErrorCategory::Escaping,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Reference => write!(f, "reference"),
            Self::Shape => write!(f, "shape"),
            Self::Escaping => write!(f, "escaping"),
        }
    }
}

/// A structured template diagnostic.
///
/// Carries the originating source name so a failure deep inside a glob of
/// templates can be traced back to its file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{file}:{span}: {code} [{category}] {message}")]
pub struct TemplateError {
    /// Template source name (file base name or inline name).
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The source line the error points into.
    pub source_line: String,
}

impl TemplateError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }
}

/// Diagnostics collected by one front-end stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<TemplateError>,
    pub warnings: Vec<TemplateError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the [`MAX_ERRORS`] limit.
    pub fn push_error(&mut self, error: TemplateError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Add a diagnostic that does not fail the stage. It is stored with
    /// [`Severity::Warning`].
    pub fn push_warning(&mut self, mut warning: TemplateError) {
        warning.severity = Severity::Warning;
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Move every diagnostic of `other` into `self`.
    pub fn extend(&mut self, other: CompileErrors) {
        let uncounted = other.total_errors.saturating_sub(other.errors.len());
        for e in other.errors {
            self.push_error(e);
        }
        self.total_errors += uncounted;
        for w in other.warnings {
            self.push_warning(w);
        }
    }

    pub fn first(&self) -> Option<&TemplateError> {
        self.errors.first()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        if self.total_errors > self.errors.len() {
            write!(
                f,
                "\n... and {} more",
                self.total_errors - self.errors.len()
            )?;
        }
        Ok(())
    }
}
