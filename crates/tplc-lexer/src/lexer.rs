//! Template lexer.
//!
//! Features:
//! - Text runs between `{{` and `}}` delimiters
//! - Trim markers: `{{- ` strips trailing whitespace from the preceding text,
//!   ` -}}` strips leading whitespace from the following text
//! - Comments `{{/* … */}}`, which must close right before the delimiter
//! - Interpreted (`"…"`) and raw (`` `…` ``) strings, numbers, fields,
//!   variables, identifiers and keywords inside actions
//! - Error recovery: a bad character is reported and skipped, an unclosed
//!   action or comment ends the stream

use tplc_types::{CompileErrors, ErrorCode, SourceFile, Span, TemplateError};

use crate::token::{Token, TokenKind};

const LEFT_DELIM: &[u8] = b"{{";
const RIGHT_DELIM: &[u8] = b"}}";

pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based, in characters).
    col: u32,
    errors: CompileErrors,
    /// The previous action ended with ` -}}`.
    trim_next_text: bool,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream, always terminated by [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
            trim_next_text: false,
        }
    }

    /// Lex the entire source into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        while !self.at_end() && self.errors.total_errors < tplc_types::MAX_ERRORS {
            self.lex_text(&mut tokens);
            if self.at_end() {
                break;
            }
            if !self.lex_action(&mut tokens) {
                break;
            }
        }

        tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'src [u8] {
        &self.source[self.pos.min(self.source.len())..]
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.col += 1;
        }
        Some(ch)
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
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

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.rest().starts_with(prefix)
    }

    /// `{{-` followed by whitespace.
    fn at_left_trim(&self) -> bool {
        self.starts_with(b"{{-") && self.peek_at(3).is_some_and(is_space)
    }

    // ─────────────────────────────────────────────────────────────
    // Text
    // ─────────────────────────────────────────────────────────────

    fn lex_text(&mut self, tokens: &mut Vec<Token>) {
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.col;
        let end = find(self.rest(), LEFT_DELIM).map_or(self.source.len(), |i| self.pos + i);
        while self.pos < end {
            self.advance();
        }
        let mut text = self.slice(start);
        if std::mem::take(&mut self.trim_next_text) {
            text = text.trim_start_matches(is_space_char).to_string();
        }
        if self.at_left_trim() {
            text = text.trim_end_matches(is_space_char).to_string();
        }
        if !text.is_empty() {
            tokens.push(Token::new(
                TokenKind::Text(text),
                self.span_from(start_line, start_col),
            ));
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────

    /// Lex one `{{ … }}`. Returns `false` when the rest of the input is
    /// unusable.
    fn lex_action(&mut self, tokens: &mut Vec<Token>) -> bool {
        let start_line = self.line;
        let start_col = self.col;
        let left_trim = self.at_left_trim();
        self.advance_by(if left_trim { 3 } else { 2 });

        let mut probe = 0;
        while self.peek_at(probe).is_some_and(is_space) {
            probe += 1;
        }
        if self.rest()[probe..].starts_with(b"/*") {
            self.advance_by(probe);
            return self.lex_comment(tokens, start_line, start_col);
        }

        tokens.push(Token::new(
            TokenKind::LeftDelim,
            self.span_from(start_line, start_col),
        ));

        loop {
            let skipped = self.skip_whitespace();
            if self.at_end() {
                self.emit_error(
                    ErrorCode::UNCLOSED_ACTION,
                    "unclosed action",
                    Span::point(start_line, start_col),
                );
                return false;
            }
            let tok_line = self.line;
            let tok_col = self.col;
            if skipped && self.starts_with(b"-}}") {
                self.advance_by(3);
                self.trim_next_text = true;
                tokens.push(Token::new(
                    TokenKind::RightDelim,
                    self.span_from(tok_line, tok_col),
                ));
                return true;
            }
            if self.starts_with(RIGHT_DELIM) {
                self.advance_by(2);
                tokens.push(Token::new(
                    TokenKind::RightDelim,
                    self.span_from(tok_line, tok_col),
                ));
                return true;
            }
            if let Some(kind) = self.scan_token() {
                tokens.push(Token::new(kind, self.span_from(tok_line, tok_col)));
            }
        }
    }

    fn lex_comment(&mut self, tokens: &mut Vec<Token>, start_line: u32, start_col: u32) -> bool {
        let Some(close) = find(self.rest(), b"*/") else {
            self.emit_error(
                ErrorCode::UNCLOSED_COMMENT,
                "unclosed comment",
                Span::point(start_line, start_col),
            );
            return false;
        };
        self.advance_by(close + 2);
        let mut trim = false;
        let mut probe = 0;
        while self.peek_at(probe).is_some_and(is_space) {
            probe += 1;
        }
        if probe > 0 && self.rest()[probe..].starts_with(b"-}}") {
            trim = true;
            self.advance_by(probe + 1);
        }
        if !self.starts_with(RIGHT_DELIM) {
            self.emit_error(
                ErrorCode::UNCLOSED_COMMENT,
                "comment ends before closing delimiter",
                self.current_span(),
            );
            return false;
        }
        self.advance_by(2);
        self.trim_next_text = trim;
        tokens.push(Token::new(
            TokenKind::Comment,
            self.span_from(start_line, start_col),
        ));
        true
    }

    /// Skip whitespace inside an action; reports whether anything was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_space) {
            self.advance();
        }
        self.pos > start
    }

    fn scan_token(&mut self) -> Option<TokenKind> {
        let start_line = self.line;
        let start_col = self.col;
        let ch = self.peek()?;
        let kind = match ch {
            b'|' => {
                self.advance();
                TokenKind::Pipe
            }
            b'(' => {
                self.advance();
                TokenKind::LeftParen
            }
            b')' => {
                self.advance();
                TokenKind::RightParen
            }
            b',' => {
                self.advance();
                TokenKind::Comma
            }
            b'=' => {
                self.advance();
                TokenKind::Assign
            }
            b':' if self.peek_at(1) == Some(b'=') => {
                self.advance_by(2);
                TokenKind::Declare
            }
            b'"' => return self.scan_string(start_line, start_col),
            b'`' => return self.scan_raw_string(start_line, start_col),
            b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            b'.' => {
                self.advance();
                if self.peek().is_some_and(is_ident_start) {
                    TokenKind::Field(self.scan_ident())
                } else {
                    TokenKind::Dot
                }
            }
            b'$' => {
                self.advance();
                TokenKind::Variable(format!("${}", self.scan_ident()))
            }
            b'0'..=b'9' => self.scan_number(),
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                self.scan_number()
            }
            c if is_ident_start(c) => {
                let ident = self.scan_ident();
                TokenKind::keyword(&ident).unwrap_or(TokenKind::Identifier(ident))
            }
            _ => {
                self.advance();
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.advance();
                }
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected character in action: {:?}", self.source_char(span)),
                    span,
                );
                return None;
            }
        };
        Some(kind)
    }

    fn source_char(&self, span: Span) -> String {
        self.source_file
            .line(span.start_line)
            .and_then(|l| l.chars().nth(span.start_col.saturating_sub(1) as usize))
            .map(String::from)
            .unwrap_or_default()
    }

    fn scan_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        self.slice(start)
    }

    fn scan_number(&mut self) -> TokenKind {
        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.advance();
        }
        let mut prev = 0u8;
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, b'-' | b'+') && matches!(prev, b'e' | b'E' | b'p' | b'P');
            if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
                prev = c;
                self.advance();
            } else {
                break;
            }
        }
        let text = self.slice(start);
        let digits = text.trim_start_matches(['-', '+']).replace('_', "");
        let is_hex = digits.starts_with("0x") || digits.starts_with("0X");
        let is_float = !is_hex && (digits.contains('.') || digits.contains(['e', 'E']));
        let valid = if is_hex {
            i64::from_str_radix(&digits[2..], 16).is_ok()
        } else if is_float {
            digits.parse::<f64>().is_ok()
        } else {
            digits.parse::<i64>().is_ok()
        };
        if !valid {
            self.emit_error(
                ErrorCode::BAD_NUMBER,
                format!("bad number syntax: {text:?}"),
                self.span_from(start_line, start_col),
            );
        }
        TokenKind::Number { text, is_float }
    }

    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Option<TokenKind> {
        self.advance();
        let mut value = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated quoted string",
                        self.span_from(start_line, start_col),
                    );
                    return None;
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    let esc = self.advance()?;
                    match esc {
                        b'n' => value.push(b'\n'),
                        b't' => value.push(b'\t'),
                        b'r' => value.push(b'\r'),
                        b'\\' => value.push(b'\\'),
                        b'"' => value.push(b'"'),
                        b'\'' => value.push(b'\''),
                        b'x' => {
                            let hex = [self.advance()?, self.advance()?];
                            match std::str::from_utf8(&hex)
                                .ok()
                                .and_then(|h| u8::from_str_radix(h, 16).ok())
                            {
                                Some(b) => value.push(b),
                                None => self.emit_error(
                                    ErrorCode::UNTERMINATED_STRING,
                                    "invalid \\x escape in string",
                                    self.span_from(start_line, start_col),
                                ),
                            }
                        }
                        other => {
                            self.emit_error(
                                ErrorCode::UNTERMINATED_STRING,
                                format!("unknown escape sequence \\{}", other as char),
                                self.span_from(start_line, start_col),
                            );
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Some(TokenKind::StringLit(
            String::from_utf8_lossy(&value).into_owned(),
        ))
    }

    fn scan_raw_string(&mut self, start_line: u32, start_col: u32) -> Option<TokenKind> {
        self.advance();
        let start = self.pos;
        while self.peek().is_some_and(|c| c != b'`') {
            self.advance();
        }
        if self.at_end() {
            self.emit_error(
                ErrorCode::UNTERMINATED_STRING,
                "unterminated raw quoted string",
                self.span_from(start_line, start_col),
            );
            return None;
        }
        let value = self.slice(start);
        self.advance();
        Some(TokenKind::StringLit(value))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_space_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}
