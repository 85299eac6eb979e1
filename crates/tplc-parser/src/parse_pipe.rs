//! Pipeline, command and operand parsing.

use tplc_lexer::TokenKind;
use tplc_types::ast::{Command, NumberLit, Operand, OperandKind, Pipeline, VarDecl};
use tplc_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse `[decl :=] cmd | cmd …` up to (not including) `}}` or `)`.
    ///
    /// `range` pipelines may declare two variables; every other context at
    /// most one.
    pub(crate) fn parse_pipeline(&mut self, context: &str, allow_two_decls: bool) -> Option<Pipeline> {
        let id = self.next_id();
        let start = self.current_span();
        let (decl, is_assign) = self.parse_declarations(allow_two_decls)?;

        let mut cmds = Vec::new();
        loop {
            if !self.peek_kind().starts_operand() {
                if matches!(self.peek_kind(), TokenKind::RightDelim | TokenKind::RightParen) {
                    let message = if cmds.is_empty() {
                        format!("missing value for {context}")
                    } else {
                        "missing command after '|'".to_string()
                    };
                    self.error_at(ErrorCode::EMPTY_PIPELINE, message, start.merge(self.current_span()));
                } else {
                    let other = self.peek_kind().clone();
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("unexpected '{other}' in {context}"),
                    );
                }
                return None;
            }
            cmds.push(self.parse_command()?);
            match self.peek_kind().clone() {
                TokenKind::Pipe => {
                    self.advance();
                }
                TokenKind::RightDelim | TokenKind::RightParen => break,
                other => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("unexpected '{other}' in operand"),
                    );
                    return None;
                }
            }
        }

        Some(Pipeline {
            id,
            decl,
            is_assign,
            cmds,
            span: start.merge(self.previous_span()),
        })
    }

    /// `$x :=`, `$x =` or `$i, $e :=`. Returns no declarations when the
    /// pipeline does not start with one.
    fn parse_declarations(&mut self, allow_two: bool) -> Option<(Vec<VarDecl>, bool)> {
        let TokenKind::Variable(first) = self.peek_kind().clone() else {
            return Some((Vec::new(), false));
        };
        match self.look_ahead(1).clone() {
            kind @ (TokenKind::Declare | TokenKind::Assign) => {
                let is_assign = kind == TokenKind::Assign;
                let decl = self.var_decl(first);
                self.advance();
                Some((vec![decl], is_assign))
            }
            TokenKind::Comma if allow_two => {
                let first = self.var_decl(first);
                self.advance();
                let TokenKind::Variable(second) = self.peek_kind().clone() else {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "expected variable after ',' in range",
                    );
                    return None;
                };
                let second = self.var_decl(second);
                let is_assign = match self.peek_kind() {
                    TokenKind::Declare => false,
                    TokenKind::Assign => true,
                    _ => {
                        self.error_at_current(
                            ErrorCode::UNEXPECTED_TOKEN,
                            "expected ':=' after range variables",
                        );
                        return None;
                    }
                };
                self.advance();
                Some((vec![first, second], is_assign))
            }
            _ => Some((Vec::new(), false)),
        }
    }

    fn var_decl(&mut self, name: String) -> VarDecl {
        let span = self.advance().span;
        VarDecl {
            id: self.next_id(),
            name,
            span,
        }
    }

    /// A command: operands up to `|`, `}}` or `)`.
    fn parse_command(&mut self) -> Option<Command> {
        let id = self.next_id();
        let start = self.current_span();
        let mut args = Vec::new();
        while self.peek_kind().starts_operand() {
            args.push(self.parse_operand()?);
        }
        if args.len() > 1 && !matches!(args[0].kind, OperandKind::Function(_)) {
            self.error_at(
                ErrorCode::NOT_A_FUNCTION,
                "can't give argument to non-function",
                args[0].span,
            );
            return None;
        }
        Some(Command {
            id,
            args,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_operand(&mut self) -> Option<Operand> {
        let id = self.next_id();
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Dot => OperandKind::Dot,
            TokenKind::Nil => OperandKind::Nil,
            TokenKind::Bool(b) => OperandKind::Bool(b),
            TokenKind::StringLit(s) => OperandKind::String(s),
            TokenKind::Number { text, is_float } => OperandKind::Number(NumberLit { text, is_float }),
            TokenKind::Field(first) => {
                let mut fields = vec![first];
                fields.extend(self.adjacent_fields());
                OperandKind::Field(fields)
            }
            TokenKind::Variable(name) => OperandKind::Variable {
                name,
                fields: self.adjacent_fields(),
            },
            TokenKind::Identifier(name) => {
                if !self.funcs.is_defined(&name) {
                    self.error_at(
                        ErrorCode::UNDEFINED_FUNCTION,
                        format!("function {name:?} not defined"),
                        token.span,
                    );
                    return None;
                }
                OperandKind::Function(name)
            }
            TokenKind::LeftParen => {
                let inner = self.parse_pipeline("parenthesized pipeline", false)?;
                self.expect(&TokenKind::RightParen)?;
                let span = token.span.merge(self.previous_span());
                let pipe = Operand {
                    id,
                    kind: OperandKind::Pipe(Box::new(inner)),
                    span,
                };
                let fields = self.adjacent_fields();
                if fields.is_empty() {
                    return Some(pipe);
                }
                return Some(Operand {
                    id: self.next_id(),
                    kind: OperandKind::Chain {
                        operand: Box::new(pipe),
                        fields,
                    },
                    span: span.merge(self.previous_span()),
                });
            }
            other => {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected '{other}' in operand"),
                    token.span,
                );
                return None;
            }
        };
        Some(Operand {
            id,
            kind,
            span: token.span.merge(self.previous_span()),
        })
    }

    /// Field tokens glued to the previous token: `$x.A.B`, `(…).A`.
    fn adjacent_fields(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let TokenKind::Field(name) = self.peek_kind().clone() {
            if !self.is_adjacent() {
                break;
            }
            self.advance();
            fields.push(name);
        }
        fields
    }
}
