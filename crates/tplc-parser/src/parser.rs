//! Core parser infrastructure: token cursor, tree collection, error reporting.

use std::collections::BTreeMap;

use tplc_lexer::token::{Token, TokenKind};
use tplc_types::ast::{ListNode, NodeId, Tree};
use tplc_types::{CompileErrors, ErrorCode, FunctionLibrary, SourceFile, Span, TemplateError};

/// The template parser.
///
/// Consumes the token stream of one source and builds one [`Tree`] per
/// template name it declares. Errors are collected; after an error the parser
/// resumes at the next action.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    pub(crate) funcs: &'src FunctionLibrary,
    errors: CompileErrors,
    next_id: u32,
    /// Nesting depth of `if`/`range`/`with`; `define` is only legal at 0.
    pub(crate) depth: u32,
    trees: BTreeMap<String, Tree>,
}

/// Result of parsing one source.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Template name → tree, including the main template.
    pub trees: BTreeMap<String, Tree>,
    pub errors: CompileErrors,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile, funcs: &'src FunctionLibrary) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            funcs,
            errors: CompileErrors::empty(),
            next_id: 0,
            depth: 0,
            trees: BTreeMap::new(),
        }
    }

    /// Parse the whole stream. `main_name` names the top-level template.
    pub fn parse(mut self, main_name: &str) -> ParseResult {
        let root = self.parse_top_level();
        self.add_tree(main_name.to_string(), root);
        ParseResult {
            trees: self.trees,
            errors: self.errors,
        }
    }

    // ── Tree collection ───────────────────────────────────────────────────────

    /// Register a tree under `name`.
    ///
    /// An empty body never replaces an existing non-empty definition; any
    /// other redefinition wins.
    pub(crate) fn add_tree(&mut self, name: String, root: ListNode) {
        let tree = Tree {
            name: name.clone(),
            source: self.source_file.name.clone(),
            root,
        };
        if let Some(existing) = self.trees.get(&name) {
            if tree.is_empty() && !existing.is_empty() {
                return;
            }
        }
        self.trees.insert(name, tree);
    }

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .expect("token stream ends with Eof")
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// The current token starts right where the previous one ended, with no
    /// whitespace in between. Distinguishes `$x.A` from `$x .A`.
    pub(crate) fn is_adjacent(&self) -> bool {
        let prev = self.previous_span();
        let cur = self.current_span();
        self.pos > 0 && cur.start_line == prev.end_line && cur.start_col == prev.end_col + 1
    }

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    pub(crate) fn expect_string_literal(&mut self, context: &str) -> Option<String> {
        match self.peek_kind().clone() {
            TokenKind::StringLit(s) => {
                self.advance();
                Some(s)
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected quoted name in {context}, got '{other}'"),
                );
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self
            .source_file
            .line(span.start_line)
            .unwrap_or("")
            .to_string();
        self.errors.push_error(TemplateError::new(
            self.source_file.name.clone(),
            code,
            message,
            span,
            source_line,
        ));
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.total_errors >= tplc_types::MAX_ERRORS
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip past the next `}}` so parsing resumes at the following node.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            if self.advance().kind == TokenKind::RightDelim {
                return;
            }
        }
    }
}
