//! Template tree node types.
//!
//! Every node carries a [`Span`]. Nodes that the analyzer annotates also carry
//! a [`NodeId`], unique within one [`Tree`], which keys the maps of
//! [`crate::ScopeState`]. Trees are never mutated after parsing.

use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Trees
// ══════════════════════════════════════════════════════════════════════════════

/// Identity of an annotated node inside one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One named template: either the main template of a source or a
/// `{{define}}`/`{{block}}` declared inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub name: String,
    /// Name of the source that declared this tree.
    pub source: String,
    pub root: ListNode,
}

impl Tree {
    /// Only whitespace text and comments. An empty tree never replaces an
    /// existing definition of the same name.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// A sequence of nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNode {
    pub nodes: Vec<Node>,
    pub span: Span,
}

impl ListNode {
    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| match n {
            Node::Text(t) => t.text.trim().is_empty(),
            Node::Comment(_) => true,
            _ => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Comment(Span),
    Action(ActionNode),
    If(BranchNode),
    Range(BranchNode),
    With(BranchNode),
    Template(TemplateNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(t) => t.span,
            Node::Comment(span) => *span,
            Node::Action(a) => a.span,
            Node::If(b) | Node::Range(b) | Node::With(b) => b.span,
            Node::Template(t) => t.span,
        }
    }
}

/// Literal text copied verbatim to the output.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub span: Span,
}

/// `{{pipeline}}`: evaluates and, unless it declares variables, prints.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub id: NodeId,
    pub pipe: Pipeline,
    /// Escaper chosen by the markup-mode contextual pass; `None` in plain mode.
    pub escaper: Option<Escaper>,
    pub span: Span,
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub id: NodeId,
    pub pipe: Pipeline,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
    pub span: Span,
}

/// `{{template "name" pipeline}}`
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub id: NodeId,
    pub name: String,
    pub pipe: Option<Pipeline>,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Pipelines
// ══════════════════════════════════════════════════════════════════════════════

/// `$x := cmd | cmd | cmd`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub id: NodeId,
    pub decl: Vec<VarDecl>,
    /// `=` instead of `:=`.
    pub is_assign: bool,
    pub cmds: Vec<Command>,
    pub span: Span,
}

/// A `$name` on the left of `:=` or `=`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

/// One stage of a pipeline: a function or a single value with arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub id: NodeId,
    pub args: Vec<Operand>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub id: NodeId,
    pub kind: OperandKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    /// `.`
    Dot,
    Nil,
    Bool(bool),
    Number(NumberLit),
    String(String),
    /// `.A.B` relative to dot.
    Field(Vec<String>),
    /// `$` or `$x`, optionally followed by `.A.B`.
    Variable { name: String, fields: Vec<String> },
    /// A function identifier.
    Function(String),
    /// `(pipeline).A.B`
    Chain {
        operand: Box<Operand>,
        fields: Vec<String>,
    },
    /// `(pipeline)`
    Pipe(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLit {
    /// Source text, emitted verbatim into generated code.
    pub text: String,
    pub is_float: bool,
}

// ══════════════════════════════════════════════════════════════════════════════
// Markup escaping
// ══════════════════════════════════════════════════════════════════════════════

/// Escaping applied to an action's output in markup mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escaper {
    /// Element content.
    Html,
    /// Quoted or unquoted attribute value.
    Attr,
    /// URL-valued attribute (`href`, `src`, `action`, …).
    Url,
    /// Inside `<script>` or an `on*` handler.
    Js,
    /// Inside `<style>` or a `style` attribute.
    Css,
    /// Inside `<textarea>` or `<title>`.
    RcData,
}

impl Escaper {
    pub fn name(self) -> &'static str {
        match self {
            Escaper::Html => "html",
            Escaper::Attr => "attr",
            Escaper::Url => "url",
            Escaper::Js => "js",
            Escaper::Css => "css",
            Escaper::RcData => "rcdata",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(TextNode {
            text: s.to_string(),
            span: Span::point(1, 1),
        })
    }

    #[test]
    fn whitespace_and_comments_are_empty() {
        let tree = Tree {
            name: "a".into(),
            source: "a".into(),
            root: ListNode {
                nodes: vec![text("\n  "), Node::Comment(Span::point(1, 1)), text("\t")],
                span: Span::point(1, 1),
            },
        };
        assert!(tree.is_empty());
    }

    #[test]
    fn visible_text_is_not_empty() {
        let list = ListNode {
            nodes: vec![text(" hi ")],
            span: Span::point(1, 1),
        };
        assert!(!list.is_empty());
    }
}
