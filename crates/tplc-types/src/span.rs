use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span inside a template source.
///
/// Line and column values are 1-based. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "line")]
    pub start_line: u32,
    #[serde(rename = "column")]
    pub start_col: u32,
    pub end_line: u32,
    #[serde(rename = "end_column")]
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a zero-width span at a single position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) =
            (self.start_line, self.start_col).min((other.start_line, other.start_col));
        let (end_line, end_col) = (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Span::new(start_line, start_col, end_line, end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A named template source held for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// Extract a source line by 1-based line number, without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s.saturating_sub(1))
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_spans_across_lines() {
        let merged = Span::new(1, 5, 1, 10).merge(Span::new(2, 3, 2, 8));
        assert_eq!(merged, Span::new(1, 5, 2, 8));
    }

    #[test]
    fn merge_spans_same_line() {
        let merged = Span::new(1, 5, 1, 10).merge(Span::new(1, 3, 1, 8));
        assert_eq!(merged, Span::new(1, 3, 1, 10));
    }

    #[test]
    fn span_display_is_start_position() {
        assert_eq!(Span::new(3, 7, 3, 15).to_string(), "3:7");
    }

    #[test]
    fn source_file_lines() {
        let src = SourceFile::new("page.tpl", "<p>\r\n{{.Name}}\n</p>");
        assert_eq!(src.line(1), Some("<p>"));
        assert_eq!(src.line(2), Some("{{.Name}}"));
        assert_eq!(src.line(3), Some("</p>"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
    }

    #[test]
    fn span_serializes_with_line_and_column() {
        let json = serde_json::to_string(&Span::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"line":1,"column":2,"end_line":3,"end_column":4}"#);
    }
}
