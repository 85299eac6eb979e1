//! Contextual escaping for markup-mode templates.
//!
//! Walks a tree in output order, tracking where in an HTML document each
//! action lands, and records on every printing action the escaper its value
//! must go through. Branches must leave the document in the same context on
//! every path.

use std::fmt;

use tplc_types::ast::{ActionNode, BranchNode, Escaper, ListNode, Node, Tree};
use tplc_types::{CompileErrors, ErrorCode, SourceFile, Span, TemplateError};

/// Attributes whose value is a URL.
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "cite",
    "poster",
    "background",
];

/// Element whose body is not ordinary markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Normal,
    Script,
    Style,
    Textarea,
    Title,
}

impl Element {
    fn from_tag(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "script" => Element::Script,
            "style" => Element::Style,
            "textarea" => Element::Textarea,
            "title" => Element::Title,
            _ => Element::Normal,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Element::Normal => "",
            Element::Script => "script",
            Element::Style => "style",
            Element::Textarea => "textarea",
            Element::Title => "title",
        }
    }

    /// Context right after the start tag's `>`.
    fn body(self) -> Context {
        match self {
            Element::Normal => Context::Text,
            other => Context::RawText(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    Normal,
    Url,
    Js,
    Css,
}

impl AttrKind {
    fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.starts_with("on") {
            AttrKind::Js
        } else if name == "style" {
            AttrKind::Css
        } else if URL_ATTRIBUTES.contains(&name.as_str()) {
            AttrKind::Url
        } else {
            AttrKind::Normal
        }
    }

    fn escaper(self) -> Escaper {
        match self {
            AttrKind::Normal => Escaper::Attr,
            AttrKind::Url => Escaper::Url,
            AttrKind::Js => Escaper::Js,
            AttrKind::Css => Escaper::Css,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Position inside the document being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Text,
    /// `<!-- … -->`
    Comment,
    /// Body of `script`, `style`, `textarea` or `title`.
    RawText(Element),
    /// Inside a start tag, between attributes.
    Tag(Element),
    AttrName(Element, AttrKind),
    AfterAttrName(Element, AttrKind),
    BeforeValue(Element, AttrKind),
    AttrValue(Element, AttrKind, Quote),
}

impl Context {
    fn escaper(self) -> Option<Escaper> {
        match self {
            Context::Text => Some(Escaper::Html),
            Context::RawText(Element::Script) => Some(Escaper::Js),
            Context::RawText(Element::Style) => Some(Escaper::Css),
            Context::RawText(_) => Some(Escaper::RcData),
            Context::BeforeValue(_, kind) | Context::AttrValue(_, kind, _) => Some(kind.escaper()),
            Context::Comment
            | Context::Tag(_)
            | Context::AttrName(..)
            | Context::AfterAttrName(..) => None,
        }
    }

    /// Context after an action printed a value here.
    fn after_action(self) -> Context {
        match self {
            Context::BeforeValue(el, kind) => Context::AttrValue(el, kind, Quote::None),
            other => other,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Text => write!(f, "text"),
            Context::Comment => write!(f, "markup comment"),
            Context::RawText(el) => write!(f, "<{}> body", el.tag()),
            Context::Tag(_) => write!(f, "tag"),
            Context::AttrName(..) => write!(f, "attribute name"),
            Context::AfterAttrName(..) => write!(f, "after attribute name"),
            Context::BeforeValue(..) => write!(f, "before attribute value"),
            Context::AttrValue(_, _, Quote::None) => write!(f, "unquoted attribute value"),
            Context::AttrValue(..) => write!(f, "quoted attribute value"),
        }
    }
}

/// Assign an escaper to every printing action of `tree`, reporting actions in
/// unsafe positions and branches that end in different contexts.
pub fn annotate_escapers(tree: &mut Tree, source: &SourceFile, errors: &mut CompileErrors) {
    let mut pass = EscapePass { source, errors };
    pass.escape_list(&mut tree.root, Context::Text);
}

struct EscapePass<'a> {
    source: &'a SourceFile,
    errors: &'a mut CompileErrors,
}

impl EscapePass<'_> {
    fn escape_list(&mut self, list: &mut ListNode, mut ctx: Context) -> Context {
        for node in &mut list.nodes {
            ctx = match node {
                Node::Text(text) => transition(ctx, &text.text),
                Node::Comment(_) | Node::Template(_) => ctx,
                Node::Action(action) => self.escape_action(action, ctx),
                Node::If(branch) | Node::With(branch) => self.escape_branch(branch, ctx, false),
                Node::Range(branch) => self.escape_branch(branch, ctx, true),
            };
        }
        ctx
    }

    fn escape_action(&mut self, action: &mut ActionNode, ctx: Context) -> Context {
        if !action.pipe.decl.is_empty() {
            return ctx;
        }
        match ctx.escaper() {
            Some(escaper) => {
                action.escaper = Some(escaper);
                ctx.after_action()
            }
            None => {
                self.report(
                    ErrorCode::UNSAFE_ACTION_CONTEXT,
                    format!("action in {ctx} context cannot be escaped"),
                    action.span,
                );
                ctx
            }
        }
    }

    fn escape_branch(&mut self, branch: &mut BranchNode, ctx: Context, is_loop: bool) -> Context {
        let body_end = self.escape_list(&mut branch.list, ctx);
        let else_end = match branch.else_list.as_mut() {
            Some(list) => self.escape_list(list, ctx),
            None => ctx,
        };
        if body_end != else_end {
            self.report(
                ErrorCode::BRANCH_CONTEXT_MISMATCH,
                format!("branches end in different contexts: {body_end} and {else_end}"),
                branch.span,
            );
        } else if is_loop && body_end != ctx {
            self.report(
                ErrorCode::BRANCH_CONTEXT_MISMATCH,
                format!("range body starts in {ctx} but ends in {body_end}"),
                branch.span,
            );
        }
        body_end
    }

    fn report(&mut self, code: ErrorCode, message: String, span: Span) {
        let line = self.source.line(span.start_line).unwrap_or("").to_string();
        self.errors.push_error(TemplateError::new(
            self.source.name.clone(),
            code,
            message,
            span,
            line,
        ));
    }
}

// ── Text scanning ─────────────────────────────────────────────────────────────

/// Context after `ctx` is followed by literal `text`.
fn transition(mut ctx: Context, text: &str) -> Context {
    let mut rest = text.as_bytes();
    while !rest.is_empty() {
        let (next, consumed) = step(ctx, rest);
        ctx = next;
        rest = &rest[consumed..];
    }
    ctx
}

/// One transition. Either consumes input or moves to a context that will.
fn step(ctx: Context, s: &[u8]) -> (Context, usize) {
    match ctx {
        Context::Text => step_text(s),
        Context::Comment => match find(s, b"-->") {
            Some(i) => (Context::Text, i + 3),
            None => (ctx, s.len()),
        },
        Context::RawText(el) => step_raw_text(el, s),
        Context::Tag(el) => step_tag(el, s),
        Context::AttrName(el, kind) => {
            let len = name_len(s);
            if len == s.len() {
                (ctx, len)
            } else {
                (Context::AfterAttrName(el, kind), len)
            }
        }
        Context::AfterAttrName(el, kind) => {
            let ws = whitespace_len(s);
            match s.get(ws) {
                None => (ctx, ws),
                Some(b'=') => (Context::BeforeValue(el, kind), ws + 1),
                Some(_) => (Context::Tag(el), ws),
            }
        }
        Context::BeforeValue(el, kind) => {
            let ws = whitespace_len(s);
            match s.get(ws) {
                None => (ctx, ws),
                Some(b'"') => (Context::AttrValue(el, kind, Quote::Double), ws + 1),
                Some(b'\'') => (Context::AttrValue(el, kind, Quote::Single), ws + 1),
                Some(b'>') => (el.body(), ws + 1),
                Some(_) => (Context::AttrValue(el, kind, Quote::None), ws),
            }
        }
        Context::AttrValue(el, _, quote) => {
            let end = match quote {
                Quote::Double => s.iter().position(|&b| b == b'"').map(|i| i + 1),
                Quote::Single => s.iter().position(|&b| b == b'\'').map(|i| i + 1),
                Quote::None => s
                    .iter()
                    .position(|&b| b.is_ascii_whitespace() || b == b'>'),
            };
            match end {
                Some(i) => (Context::Tag(el), i),
                None => (ctx, s.len()),
            }
        }
    }
}

fn step_text(s: &[u8]) -> (Context, usize) {
    let Some(lt) = s.iter().position(|&b| b == b'<') else {
        return (Context::Text, s.len());
    };
    let after = &s[lt + 1..];
    if after.starts_with(b"!--") {
        return (Context::Comment, lt + 4);
    }
    if after.first() == Some(&b'/') && after.get(1).is_some_and(u8::is_ascii_alphabetic) {
        return match after.iter().position(|&b| b == b'>') {
            Some(gt) => (Context::Text, lt + 1 + gt + 1),
            None => (Context::Text, s.len()),
        };
    }
    if after.first().is_some_and(u8::is_ascii_alphabetic) {
        let len = after
            .iter()
            .position(|&b| !(b.is_ascii_alphanumeric() || b == b'-'))
            .unwrap_or(after.len());
        let name = String::from_utf8_lossy(&after[..len]);
        return (Context::Tag(Element::from_tag(&name)), lt + 1 + len);
    }
    (Context::Text, lt + 1)
}

fn step_raw_text(el: Element, s: &[u8]) -> (Context, usize) {
    let close = format!("</{}", el.tag());
    let lowered = s.to_ascii_lowercase();
    let Some(start) = find(&lowered, close.as_bytes()) else {
        return (Context::RawText(el), s.len());
    };
    match s[start..].iter().position(|&b| b == b'>') {
        Some(gt) => (Context::Text, start + gt + 1),
        None => (Context::Text, s.len()),
    }
}

fn step_tag(el: Element, s: &[u8]) -> (Context, usize) {
    let ws = whitespace_len(s);
    let rest = &s[ws..];
    match rest.first() {
        None => (Context::Tag(el), ws),
        Some(b'>') => (el.body(), ws + 1),
        Some(b'/') if rest.get(1) == Some(&b'>') => (Context::Text, ws + 2),
        Some(_) => {
            let len = name_len(rest);
            if len == 0 {
                return (Context::Tag(el), ws + 1);
            }
            let name = String::from_utf8_lossy(&rest[..len]);
            let kind = AttrKind::from_name(&name);
            if len == rest.len() {
                (Context::AttrName(el, kind), ws + len)
            } else {
                (Context::AfterAttrName(el, kind), ws + len)
            }
        }
    }
}

fn name_len(s: &[u8]) -> usize {
    s.iter()
        .position(|&b| b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'"' | b'\''))
        .unwrap_or(s.len())
}

fn whitespace_len(s: &[u8]) -> usize {
    s.iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(s.len())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
