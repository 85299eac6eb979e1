//! List and control-structure parsing: text, actions, `if`/`range`/`with`,
//! `define`, `block`, `template`.

use tplc_lexer::TokenKind;
use tplc_types::ast::{ActionNode, BranchNode, ListNode, Node, TemplateNode, TextNode};
use tplc_types::{ErrorCode, Span};

use crate::parser::Parser;

/// Why a list stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListEnd {
    /// `{{end}}`, consumed.
    End,
    /// `{{else`, with the `{{` and `else` consumed.
    Else,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchKind {
    If,
    Range,
    With,
}

impl BranchKind {
    fn keyword(self) -> &'static str {
        match self {
            BranchKind::If => "if",
            BranchKind::Range => "range",
            BranchKind::With => "with",
        }
    }

    fn token(self) -> TokenKind {
        match self {
            BranchKind::If => TokenKind::If,
            BranchKind::Range => TokenKind::Range,
            BranchKind::With => TokenKind::With,
        }
    }
}

impl<'src> Parser<'src> {
    /// Parse the main template body, collecting `define`s along the way.
    pub(crate) fn parse_top_level(&mut self) -> ListNode {
        let (list, end) = self.parse_list();
        match end {
            ListEnd::Eof => {}
            ListEnd::End => {
                self.error_at(
                    ErrorCode::UNEXPECTED_END,
                    "unexpected {{end}}",
                    self.previous_span(),
                );
            }
            ListEnd::Else => {
                self.error_at(
                    ErrorCode::UNEXPECTED_END,
                    "unexpected {{else}}",
                    self.previous_span(),
                );
            }
        }
        list
    }

    /// Parse nodes until `{{end}}`, `{{else` or end of input.
    pub(crate) fn parse_list(&mut self) -> (ListNode, ListEnd) {
        let start = self.current_span();
        let mut nodes = Vec::new();
        loop {
            if self.too_many_errors() {
                return (self.finish_list(nodes, start), ListEnd::Eof);
            }
            match self.peek_kind().clone() {
                TokenKind::Eof => return (self.finish_list(nodes, start), ListEnd::Eof),
                TokenKind::Text(text) => {
                    let span = self.advance().span;
                    nodes.push(Node::Text(TextNode { text, span }));
                }
                TokenKind::Comment => {
                    let span = self.advance().span;
                    nodes.push(Node::Comment(span));
                }
                TokenKind::LeftDelim => match self.look_ahead(1) {
                    TokenKind::End => {
                        self.advance();
                        self.advance();
                        if self.expect(&TokenKind::RightDelim).is_none() {
                            self.synchronize();
                        }
                        return (self.finish_list(nodes, start), ListEnd::End);
                    }
                    TokenKind::Else => {
                        self.advance();
                        self.advance();
                        return (self.finish_list(nodes, start), ListEnd::Else);
                    }
                    _ => {
                        if let Some(node) = self.parse_delimited() {
                            nodes.push(node);
                        }
                    }
                },
                other => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("unexpected '{other}' outside action"),
                    );
                    self.advance();
                }
            }
        }
    }

    fn finish_list(&self, nodes: Vec<Node>, start: Span) -> ListNode {
        let span = nodes
            .iter()
            .map(Node::span)
            .fold(start, |acc, s| acc.merge(s));
        ListNode { nodes, span }
    }

    /// Parse one `{{ … }}` starting at the left delimiter. `define` adds a
    /// tree and yields no node.
    fn parse_delimited(&mut self) -> Option<Node> {
        let open = self.advance().span;
        match self.peek_kind() {
            TokenKind::If => {
                self.advance();
                self.parse_branch(BranchKind::If, open).map(Node::If)
            }
            TokenKind::Range => {
                self.advance();
                self.parse_branch(BranchKind::Range, open).map(Node::Range)
            }
            TokenKind::With => {
                self.advance();
                self.parse_branch(BranchKind::With, open).map(Node::With)
            }
            TokenKind::Define => {
                self.advance();
                self.parse_define(open);
                None
            }
            TokenKind::Block => {
                self.advance();
                self.parse_block(open).map(Node::Template)
            }
            TokenKind::Template => {
                self.advance();
                self.parse_template(open).map(Node::Template)
            }
            _ => self.parse_action(open).map(Node::Action),
        }
    }

    fn parse_action(&mut self, open: Span) -> Option<ActionNode> {
        let id = self.next_id();
        let Some(pipe) = self.parse_pipeline("command", false) else {
            self.synchronize();
            return None;
        };
        self.expect(&TokenKind::RightDelim)?;
        Some(ActionNode {
            id,
            pipe,
            escaper: None,
            span: open.merge(self.previous_span()),
        })
    }

    /// Parse the rest of `{{if pipeline}} list [{{else}} list] {{end}}` after
    /// the keyword. `{{else if …}}` and `{{else with …}}` chain into a nested
    /// branch that shares the final `{{end}}`.
    fn parse_branch(&mut self, kind: BranchKind, open: Span) -> Option<BranchNode> {
        let id = self.next_id();
        let Some(pipe) = self.parse_pipeline(kind.keyword(), kind == BranchKind::Range) else {
            self.synchronize();
            return None;
        };
        if self.expect(&TokenKind::RightDelim).is_none() {
            self.synchronize();
        }

        self.depth += 1;
        let (list, end) = self.parse_list();
        let else_list = match end {
            ListEnd::End => None,
            ListEnd::Eof => {
                self.depth -= 1;
                self.error_at(
                    ErrorCode::UNCLOSED_BLOCK,
                    format!("unexpected EOF: {{{{{}}}}} has no matching {{{{end}}}}", kind.keyword()),
                    open,
                );
                return None;
            }
            ListEnd::Else => self.parse_else(kind),
        };
        self.depth -= 1;

        Some(BranchNode {
            id,
            pipe,
            list,
            else_list,
            span: open.merge(self.previous_span()),
        })
    }

    /// After `{{else`: either a chained branch or `}}` list `{{end}}`.
    fn parse_else(&mut self, kind: BranchKind) -> Option<ListNode> {
        let else_span = self.previous_span();
        if kind != BranchKind::Range && self.check(&kind.token()) {
            self.advance();
            let nested = self.parse_branch(kind, else_span)?;
            let span = nested.span;
            let node = match kind {
                BranchKind::If => Node::If(nested),
                _ => Node::With(nested),
            };
            return Some(ListNode {
                nodes: vec![node],
                span,
            });
        }
        if self.expect(&TokenKind::RightDelim).is_none() {
            self.synchronize();
        }
        let (list, end) = self.parse_list();
        match end {
            ListEnd::End => Some(list),
            ListEnd::Else => {
                self.error_at(
                    ErrorCode::UNEXPECTED_END,
                    format!("expected {{{{end}}}}; found second {{{{else}}}} in {}", kind.keyword()),
                    self.previous_span(),
                );
                self.synchronize();
                Some(list)
            }
            ListEnd::Eof => {
                self.error_at(
                    ErrorCode::UNCLOSED_BLOCK,
                    format!("unexpected EOF in {{{{else}}}} of {}", kind.keyword()),
                    else_span,
                );
                None
            }
        }
    }

    /// `{{define "name"}} list {{end}}`
    fn parse_define(&mut self, open: Span) {
        if self.depth > 0 {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                "{{define}} is only allowed at top level",
                open,
            );
        }
        let Some(name) = self.expect_string_literal("define clause") else {
            self.synchronize();
            return;
        };
        if self.expect(&TokenKind::RightDelim).is_none() {
            self.synchronize();
        }
        let (list, end) = self.parse_list();
        match end {
            ListEnd::End => self.add_tree(name, list),
            ListEnd::Else => {
                self.error_at(
                    ErrorCode::UNEXPECTED_END,
                    format!("unexpected {{{{else}}}} in definition of {name:?}"),
                    self.previous_span(),
                );
                self.synchronize();
            }
            ListEnd::Eof => self.error_at(
                ErrorCode::UNCLOSED_BLOCK,
                format!("unexpected EOF in definition of {name:?}"),
                open,
            ),
        }
    }

    /// `{{block "name" pipeline}} list {{end}}`: defines `name` and invokes it.
    fn parse_block(&mut self, open: Span) -> Option<TemplateNode> {
        let id = self.next_id();
        let name = self.expect_string_literal("block clause")?;
        let pipe = if self.check(&TokenKind::RightDelim) {
            None
        } else {
            Some(self.parse_pipeline("block", false)?)
        };
        self.expect(&TokenKind::RightDelim)?;
        self.depth += 1;
        let (list, end) = self.parse_list();
        self.depth -= 1;
        if end != ListEnd::End {
            self.error_at(
                ErrorCode::UNCLOSED_BLOCK,
                format!("{{{{block {name:?}}}}} has no matching {{{{end}}}}"),
                open,
            );
            return None;
        }
        self.add_tree(name.clone(), list);
        Some(TemplateNode {
            id,
            name,
            pipe,
            span: open.merge(self.previous_span()),
        })
    }

    /// `{{template "name" [pipeline]}}`
    fn parse_template(&mut self, open: Span) -> Option<TemplateNode> {
        let id = self.next_id();
        let Some(name) = self.expect_string_literal("template clause") else {
            self.synchronize();
            return None;
        };
        let pipe = if self.check(&TokenKind::RightDelim) {
            None
        } else {
            match self.parse_pipeline("template", false) {
                Some(p) => Some(p),
                None => {
                    self.synchronize();
                    return None;
                }
            }
        };
        self.expect(&TokenKind::RightDelim)?;
        Some(TemplateNode {
            id,
            name,
            pipe,
            span: open.merge(self.previous_span()),
        })
    }
}
