//! Token types for the template lexer.

use std::fmt;
use tplc_types::Span;

/// Identifiers with a fixed meaning inside actions.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "nil", "true", "false",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Outside actions ──────────────────────────────────────

    /// Verbatim text between actions, already trimmed by `{{-`/`-}}`.
    Text(String),
    /// `{{/* … */}}`
    Comment,
    /// `{{`
    LeftDelim,
    /// `}}`
    RightDelim,

    // ── Operands ─────────────────────────────────────────────

    /// `.`
    Dot,
    /// `.Name`; a chain `.A.B` is two consecutive field tokens.
    Field(String),
    /// `$` or `$name`, carried with the leading `$`.
    Variable(String),
    Identifier(String),
    StringLit(String),
    Number { text: String, is_float: bool },
    Bool(bool),
    Nil,

    // ── Keywords ─────────────────────────────────────────────
    If,
    Else,
    End,
    Range,
    With,
    Define,
    Template,
    Block,

    // ── Punctuation ──────────────────────────────────────────
    Pipe,
    LeftParen,
    RightParen,
    Comma,
    /// `:=`
    Declare,
    /// `=`
    Assign,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "range" => TokenKind::Range,
            "with" => TokenKind::With,
            "define" => TokenKind::Define,
            "template" => TokenKind::Template,
            "block" => TokenKind::Block,
            "nil" => TokenKind::Nil,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => return None,
        })
    }

    /// Tokens that can start an operand.
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Dot
                | TokenKind::Field(_)
                | TokenKind::Variable(_)
                | TokenKind::Identifier(_)
                | TokenKind::StringLit(_)
                | TokenKind::Number { .. }
                | TokenKind::Bool(_)
                | TokenKind::Nil
                | TokenKind::LeftParen
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Text(_) => write!(f, "text"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::LeftDelim => write!(f, "{{{{"),
            TokenKind::RightDelim => write!(f, "}}}}"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Field(name) => write!(f, ".{name}"),
            TokenKind::Variable(name) => write!(f, "{name}"),
            TokenKind::Identifier(name) => write!(f, "{name}"),
            TokenKind::StringLit(s) => write!(f, "{s:?}"),
            TokenKind::Number { text, .. } => write!(f, "{text}"),
            TokenKind::Bool(b) => write!(f, "{b}"),
            TokenKind::Nil => write!(f, "nil"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::End => write!(f, "end"),
            TokenKind::Range => write!(f, "range"),
            TokenKind::With => write!(f, "with"),
            TokenKind::Define => write!(f, "define"),
            TokenKind::Template => write!(f, "template"),
            TokenKind::Block => write!(f, "block"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Declare => write!(f, ":="),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
