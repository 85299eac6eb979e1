//! Template analyzer: resolves shapes and allocates Go locals for one tree.
//!
//! Entry point: [`analyze`].
//!
//! The analyzer never rewrites the tree. Its output, a [`ScopeState`], maps
//! every variable declaration and reference to a unique Go local and every
//! `range`/`with` node to the local holding its dot, so shadowed template
//! variables never share an identifier in generated code.
//!
//! Error codes emitted:
//! - E201: undefined variable
//! - E202: argument given to a non-function
//! - E300: unknown field
//! - E301: range over a value that can't be iterated
//! - E302: wrong argument count

use tplc_codegen::{DATA_IDENT, INPUT_IDENT};
use tplc_types::ast::*;
use tplc_types::{
    builtin_result, Binding, CompileErrors, ErrorCode, FunctionLibrary, ScopeState, Shape,
    SourceFile, Span, TemplateError,
};

use crate::env::VarEnv;

/// Prefix of Go locals holding template variables.
const VAR_PREFIX: &str = "var";

/// Prefix of Go locals holding the dot of a `range` or `with` body.
const DOT_PREFIX: &str = "dot";

/// Analyze `tree` against the data `shape`.
///
/// Pure: calling it again with another shape starts from scratch.
pub fn analyze(
    tree: &Tree,
    shape: &Shape,
    funcs: &FunctionLibrary,
    source: &SourceFile,
) -> Result<ScopeState, CompileErrors> {
    let mut errors = CompileErrors::empty();
    let scope = Analyzer::new(shape, funcs, source, &mut errors).run(tree);
    if errors.has_errors() {
        Err(errors)
    } else {
        Ok(scope)
    }
}

/// The binding of `$` and the initial dot for data of `shape`.
pub fn root_binding(shape: &Shape) -> Binding {
    if shape.is_dynamic() {
        Binding::new(INPUT_IDENT, Shape::Interface)
    } else {
        Binding::new(DATA_IDENT, shape.clone())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Analyzer
// ══════════════════════════════════════════════════════════════════════════════

struct Analyzer<'a> {
    env: VarEnv,
    errors: &'a mut CompileErrors,
    source: &'a SourceFile,
    funcs: &'a FunctionLibrary,
    scope: ScopeState,
    /// Shape of `.`, innermost last.
    dots: Vec<Shape>,
    next_var: usize,
    next_dot: usize,
}

impl<'a> Analyzer<'a> {
    fn new(
        shape: &Shape,
        funcs: &'a FunctionLibrary,
        source: &'a SourceFile,
        errors: &'a mut CompileErrors,
    ) -> Self {
        let root = root_binding(shape);
        Self {
            env: VarEnv::new(root.clone()),
            errors,
            source,
            funcs,
            dots: vec![root.shape.clone()],
            scope: ScopeState {
                root,
                ..Default::default()
            },
            next_var: 0,
            next_dot: 0,
        }
    }

    fn run(mut self, tree: &Tree) -> ScopeState {
        self.list(&tree.root);
        log::debug!(
            "analyzed {:?}: {} variable reference(s), {} dot(s)",
            tree.name,
            self.scope.variables.len(),
            self.scope.dots.len()
        );
        self.scope
    }

    // ══════════════════════════════════════════════════════════════════════
    // Nodes
    // ══════════════════════════════════════════════════════════════════════

    fn list(&mut self, list: &ListNode) {
        for node in &list.nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Text(_) | Node::Comment(_) => {}
            Node::Action(action) => {
                self.pipeline(&action.pipe);
            }
            Node::If(branch) => {
                self.env.push_scope();
                self.pipeline(&branch.pipe);
                self.list(&branch.list);
                if let Some(list) = &branch.else_list {
                    self.list(list);
                }
                self.env.pop_scope();
            }
            Node::With(branch) => {
                self.env.push_scope();
                let shape = self.pipeline(&branch.pipe);
                self.bind_dot(branch.id, shape.clone());
                self.in_dot(shape, &branch.list);
                if let Some(list) = &branch.else_list {
                    self.list(list);
                }
                self.env.pop_scope();
            }
            Node::Range(branch) => self.range(branch),
            Node::Template(template) => {
                if let Some(pipe) = &template.pipe {
                    self.pipeline(pipe);
                }
            }
        }
    }

    fn range(&mut self, branch: &BranchNode) {
        self.env.push_scope();
        let subject = self.commands(&branch.pipe.cmds);
        let (key, elem) = match subject.range_shapes() {
            Some(shapes) => shapes,
            None => {
                self.error(
                    ErrorCode::NOT_RANGEABLE,
                    format!("range can't iterate over {}", describe(&subject)),
                    branch.pipe.span,
                );
                (Shape::Interface, Shape::Interface)
            }
        };
        let shapes = match branch.pipe.decl.len() {
            1 => vec![elem.clone()],
            _ => vec![key, elem.clone()],
        };
        for (decl, shape) in branch.pipe.decl.iter().zip(shapes) {
            self.declare(decl, shape, branch.pipe.is_assign);
        }
        self.bind_dot(branch.id, elem.clone());
        self.in_dot(elem, &branch.list);
        if let Some(list) = &branch.else_list {
            self.list(list);
        }
        self.env.pop_scope();
    }

    fn in_dot(&mut self, shape: Shape, list: &ListNode) {
        self.dots.push(shape);
        self.list(list);
        self.dots.pop();
    }

    fn bind_dot(&mut self, id: NodeId, shape: Shape) {
        let ident = format!("{DOT_PREFIX}{}", self.next_dot);
        self.next_dot += 1;
        self.scope.dots.insert(id, Binding::new(ident, shape));
    }

    // ══════════════════════════════════════════════════════════════════════
    // Pipelines
    // ══════════════════════════════════════════════════════════════════════

    /// Shape of `pipe`'s value; a declaring pipeline yields its variable.
    fn pipeline(&mut self, pipe: &Pipeline) -> Shape {
        let shape = self.commands(&pipe.cmds);
        match pipe.decl.first() {
            Some(decl) => self.declare(decl, shape, pipe.is_assign),
            None => shape,
        }
    }

    /// Bind `decl` to a fresh local, or to the existing one on assignment.
    fn declare(&mut self, decl: &VarDecl, shape: Shape, is_assign: bool) -> Shape {
        let binding = if is_assign {
            match self.env.lookup(&decl.name) {
                Some(existing) => existing.clone(),
                None => {
                    self.error(
                        ErrorCode::UNDEFINED_VARIABLE,
                        format!("undefined variable: {}", decl.name),
                        decl.span,
                    );
                    Binding::default()
                }
            }
        } else {
            let ident = format!("{VAR_PREFIX}{}", self.next_var);
            self.next_var += 1;
            let binding = Binding::new(ident, shape);
            self.env.define(&decl.name, binding.clone());
            binding
        };
        let shape = binding.shape.clone();
        self.scope.variables.insert(decl.id, binding);
        shape
    }

    fn commands(&mut self, cmds: &[Command]) -> Shape {
        let mut piped: Option<Shape> = None;
        for cmd in cmds {
            piped = Some(self.command(cmd, piped));
        }
        piped.unwrap_or(Shape::Interface)
    }

    fn command(&mut self, cmd: &Command, piped: Option<Shape>) -> Shape {
        let Some(first) = cmd.args.first() else {
            return Shape::Interface;
        };
        if let OperandKind::Function(name) = &first.kind {
            let mut args: Vec<Shape> = cmd.args[1..].iter().map(|a| self.operand(a)).collect();
            args.extend(piped);
            return self.call(name, &args, cmd.span);
        }
        if piped.is_some() {
            self.error(
                ErrorCode::NOT_A_FUNCTION,
                "can't give argument to non-function".to_string(),
                cmd.span,
            );
        }
        self.operand(first)
    }

    fn call(&mut self, name: &str, args: &[Shape], span: Span) -> Shape {
        if let Some(func) = self.funcs.get(name) {
            if !func.accepts(args.len()) {
                self.error(
                    ErrorCode::WRONG_ARG_COUNT,
                    format!(
                        "wrong number of args for {name}: want {} got {}",
                        func.params.len(),
                        args.len()
                    ),
                    span,
                );
            }
            return func.result.clone();
        }
        let (min, max) = builtin_arity(name);
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            self.error(
                ErrorCode::WRONG_ARG_COUNT,
                format!("wrong number of args for {name}: got {}", args.len()),
                span,
            );
        }
        builtin_result(name, args)
    }

    fn operand(&mut self, operand: &Operand) -> Shape {
        match &operand.kind {
            OperandKind::Dot => self.dot(),
            OperandKind::Nil => Shape::Nil,
            OperandKind::Bool(_) => Shape::bool(),
            OperandKind::Number(n) if n.is_float => Shape::basic("float64"),
            OperandKind::Number(_) => Shape::int(),
            OperandKind::String(_) => Shape::string(),
            OperandKind::Field(fields) => {
                let dot = self.dot();
                self.fields(dot, fields, operand.span)
            }
            OperandKind::Variable { name, fields } => {
                let binding = match self.env.lookup(name) {
                    Some(binding) => binding.clone(),
                    None => {
                        self.error(
                            ErrorCode::UNDEFINED_VARIABLE,
                            format!("undefined variable: {name}"),
                            operand.span,
                        );
                        Binding::default()
                    }
                };
                let shape = binding.shape.clone();
                self.scope.variables.insert(operand.id, binding);
                self.fields(shape, fields, operand.span)
            }
            OperandKind::Function(name) => self.call(name, &[], operand.span),
            OperandKind::Chain { operand: inner, fields } => {
                let base = self.operand(inner);
                self.fields(base, fields, operand.span)
            }
            OperandKind::Pipe(pipe) => self.pipeline(pipe),
        }
    }

    fn dot(&self) -> Shape {
        self.dots.last().cloned().unwrap_or(Shape::Interface)
    }

    fn fields(&mut self, base: Shape, fields: &[String], span: Span) -> Shape {
        let mut shape = base;
        for name in fields {
            shape = match shape.field(name) {
                Some(next) => next,
                None => {
                    self.error(
                        ErrorCode::UNKNOWN_FIELD,
                        format!("can't evaluate field {name} in {}", describe(&shape)),
                        span,
                    );
                    // One report per chain.
                    return Shape::Interface;
                }
            };
        }
        shape
    }

    // ══════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ══════════════════════════════════════════════════════════════════════

    fn error(&mut self, code: ErrorCode, message: String, span: Span) {
        let source_line = self.source.line(span.start_line).unwrap_or("").to_string();
        self.errors.push_error(TemplateError::new(
            &self.source.name,
            code,
            message,
            span,
            source_line,
        ));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// `(min, max)` argument counts of a builtin.
fn builtin_arity(name: &str) -> (usize, Option<usize>) {
    match name {
        "not" | "len" => (1, Some(1)),
        "ne" | "lt" | "le" | "gt" | "ge" => (2, Some(2)),
        "eq" => (2, None),
        "and" | "or" | "index" | "printf" => (1, None),
        _ => (0, None),
    }
}

fn describe(shape: &Shape) -> String {
    match shape {
        Shape::Nil => "nil".to_string(),
        Shape::Basic { name } => format!("type {name}"),
        Shape::Struct { name, pointer, .. } => {
            format!("type {}{name}", if *pointer { "*" } else { "" })
        }
        Shape::Slice { .. } => "slice".to_string(),
        Shape::Map { .. } => "map".to_string(),
        Shape::Interface => "interface{}".to_string(),
    }
}
