//! Template tree → Go function conversion.
//!
//! Every tree becomes one function with the signature
//!
//! ```text
//! func NAME(t parse.Templater, w io.Writer, indata interface{}) error
//! ```
//!
//! Text nodes write a shared literal constant, actions evaluate their
//! pipeline into a Go expression and write its string form. Calls that can
//! fail are hoisted into `tmpN, err := …` statements that return the error.
//! Import aliases and literal constants always come from the shared
//! [`Namespace`] and [`LiteralTable`].

use tplc_types::ast::{
    ActionNode, BranchNode, Command, ListNode, Node, Operand, OperandKind, Pipeline, TemplateNode,
    Tree,
};
use tplc_types::{Binding, FunctionLibrary, ScopeState, Shape};

use crate::builtins::{builtin_call, output_string, truth};
use crate::error::{CodegenError, CodegenResult};
use crate::go_type::go_type;
use crate::literals::LiteralTable;
use crate::namespace::Namespace;
use crate::quote::quote_str;
use crate::writer::GoWriter;

/// Local holding the asserted template data.
pub const DATA_IDENT: &str = "data";

/// Parameter receiving the untyped template data.
pub const INPUT_IDENT: &str = "indata";

/// Templater parameter, used for `{{template}}` calls.
pub const TEMPLATER_IDENT: &str = "t";

/// Writer parameter.
pub const WRITER_IDENT: &str = "w";

const SORT: &str = "sort";

/// A Go expression and the shape of the value it yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub expr: String,
    pub shape: Shape,
}

impl Value {
    pub fn new(expr: impl Into<String>, shape: Shape) -> Self {
        Self {
            expr: expr.into(),
            shape,
        }
    }

    fn from_binding(binding: &Binding) -> Self {
        Self::new(binding.ident.clone(), binding.shape.clone())
    }

    fn is_nil_literal(&self) -> bool {
        self.expr == "nil"
    }
}

/// One generated Go function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    /// Complete declaration text, ending with a newline.
    pub source: String,
}

/// Convert `tree` into the Go function `function_name`.
///
/// `shape` is the data shape the tree was analyzed against and `scope` the
/// analyzer's bindings for it. Imports and literal constants the body needs
/// are requested from `ns` and `literals`.
pub fn convert(
    function_name: &str,
    tree: &Tree,
    funcs: &FunctionLibrary,
    shape: &Shape,
    scope: &ScopeState,
    ns: &mut Namespace,
    literals: &mut LiteralTable,
) -> CodegenResult<FunctionDecl> {
    log::debug!("converting template {:?} into {function_name}", tree.name);
    let io = ns.io_alias();
    let parse = ns.templater_alias();

    let mut converter = Converter {
        funcs,
        scope,
        ns,
        literals,
        out: GoWriter::new(),
        dots: vec![scope.root.clone()],
        next_tmp: 0,
    };
    converter.out.open(format!(
        "func {function_name}({TEMPLATER_IDENT} {parse}.Templater, {WRITER_IDENT} {io}.Writer, {INPUT_IDENT} interface{{}}) error {{"
    ));
    converter.bind_data(shape)?;
    converter.list(&tree.root)?;
    converter.out.line("return nil");
    converter.out.close("}");

    Ok(FunctionDecl {
        name: function_name.to_string(),
        source: converter.out.finish(),
    })
}

struct Converter<'a> {
    funcs: &'a FunctionLibrary,
    scope: &'a ScopeState,
    ns: &'a mut Namespace,
    literals: &'a mut LiteralTable,
    out: GoWriter,
    /// Innermost binding of `.` last.
    dots: Vec<Binding>,
    next_tmp: usize,
}

impl Converter<'_> {
    // ── Prologue ──────────────────────────────────────────────────────────────

    /// Assert the untyped input to the configured data type. A failed
    /// assertion leaves the zero value.
    fn bind_data(&mut self, shape: &Shape) -> CodegenResult<()> {
        if shape.is_dynamic() {
            return Ok(());
        }
        let ty = go_type(shape, self.ns);
        self.out.line(format!("{DATA_IDENT}, _ := {INPUT_IDENT}.({ty})"));
        self.out.line(format!("_ = {DATA_IDENT}"));
        Ok(())
    }

    // ── Nodes ─────────────────────────────────────────────────────────────────

    fn list(&mut self, list: &ListNode) -> CodegenResult<()> {
        for node in &list.nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> CodegenResult<()> {
        match node {
            Node::Text(text) => {
                if !text.text.is_empty() {
                    let name = self.literals.intern(text.text.as_bytes());
                    self.write_checked(format!("{WRITER_IDENT}.Write({name})"));
                }
                Ok(())
            }
            Node::Comment(_) => Ok(()),
            Node::Action(action) => self.action(action),
            Node::If(branch) => self.if_node(branch),
            Node::Range(branch) => self.range_node(branch),
            Node::With(branch) => self.with_node(branch),
            Node::Template(template) => self.template_node(template),
        }
    }

    fn action(&mut self, action: &ActionNode) -> CodegenResult<()> {
        if !action.pipe.decl.is_empty() {
            self.pipeline(&action.pipe)?;
            return Ok(());
        }
        let value = self.pipeline(&action.pipe)?;
        let text = output_string(&value, action.escaper, self.ns);
        let io = self.ns.io_alias();
        self.write_checked(format!("{io}.WriteString({WRITER_IDENT}, {text})"));
        Ok(())
    }

    fn if_node(&mut self, branch: &BranchNode) -> CodegenResult<()> {
        let value = self.pipeline(&branch.pipe)?;
        let cond = truth(&value, self.ns);
        self.out.open(format!("if {cond} {{"));
        self.list(&branch.list)?;
        self.else_list(branch.else_list.as_ref())
    }

    fn with_node(&mut self, branch: &BranchNode) -> CodegenResult<()> {
        let value = self.pipeline(&branch.pipe)?;
        let dot = self.dot_binding(branch)?;
        self.out.line(format!("{} := {}", dot.ident, value.expr));
        self.out.line(format!("_ = {}", dot.ident));
        let cond = truth(&Value::from_binding(&dot), self.ns);
        self.out.open(format!("if {cond} {{"));
        self.dots.push(dot);
        let body = self.list(&branch.list);
        self.dots.pop();
        body?;
        self.else_list(branch.else_list.as_ref())
    }

    fn range_node(&mut self, branch: &BranchNode) -> CodegenResult<()> {
        let subject = self.commands(&branch.pipe.cmds)?;
        let dot = self.dot_binding(branch)?;
        let has_else = branch.else_list.is_some();

        let key = match subject.shape.clone() {
            Shape::Map { key, .. } if key.is_string() || key.is_number() => {
                self.sorted_map_loop(&subject, &key, &dot, has_else)?
            }
            Shape::Slice { .. } | Shape::Map { .. } => {
                let items = self.tmp();
                self.out.line(format!("{items} := {}", subject.expr));
                self.open_loop(&items, &dot, has_else)
            }
            s if s.is_dynamic() => {
                let funcs = self.ns.funcs_alias();
                let items = self.hoist(format!("{funcs}.Items({})", subject.expr), Shape::Interface);
                self.open_loop(&items.expr, &dot, has_else)
            }
            other => {
                return Err(CodegenError::ShapeMismatch(format!(
                    "range can't iterate over {} of shape {other:?}",
                    subject.expr
                )))
            }
        };

        let scope = self.scope;
        let decl = &branch.pipe.decl;
        let sources: Vec<&str> = match decl.len() {
            0 => Vec::new(),
            1 => vec![dot.ident.as_str()],
            _ => vec![key.as_str(), dot.ident.as_str()],
        };
        for (decl, source) in decl.iter().zip(sources) {
            let binding = scope
                .variable(decl.id)
                .ok_or_else(|| CodegenError::UnresolvedSymbol(decl.name.clone()))?;
            self.bind(binding, source, branch.pipe.is_assign);
        }

        self.dots.push(dot);
        let body = self.list(&branch.list);
        self.dots.pop();
        body?;
        self.out.close("}");

        if let Some(list) = &branch.else_list {
            self.out.reopen("} else {");
            self.list(list)?;
            self.out.close("}");
        }
        Ok(())
    }

    /// Open `for KEY, DOT := range items {`, guarded by a length check when
    /// the range has an else branch. Returns the key local.
    fn open_loop(&mut self, items: &str, dot: &Binding, has_else: bool) -> String {
        if has_else {
            self.out.open(format!("if len({items}) > 0 {{"));
        }
        let key = self.tmp();
        self.out.open(format!("for {key}, {} := range {items} {{", dot.ident));
        self.out.line(format!("_, _ = {key}, {}", dot.ident));
        key
    }

    /// Maps are visited in sorted key order.
    fn sorted_map_loop(
        &mut self,
        subject: &Value,
        key_shape: &Shape,
        dot: &Binding,
        has_else: bool,
    ) -> CodegenResult<String> {
        let map = self.tmp();
        let keys = self.tmp();
        let k = self.tmp();
        let key_type = go_type(key_shape, self.ns);
        let sort = self.ns.reserve_import(SORT);

        self.out.line(format!("{map} := {}", subject.expr));
        self.out.line(format!("{keys} := make([]{key_type}, 0, len({map}))"));
        self.out.open(format!("for {k} := range {map} {{"));
        self.out.line(format!("{keys} = append({keys}, {k})"));
        self.out.close("}");
        self.out.line(format!(
            "{sort}.Slice({keys}, func(i, j int) bool {{ return {keys}[i] < {keys}[j] }})"
        ));
        if has_else {
            self.out.open(format!("if len({keys}) > 0 {{"));
        }
        let key = self.tmp();
        self.out.open(format!("for _, {key} := range {keys} {{"));
        self.out.line(format!("{} := {map}[{key}]", dot.ident));
        self.out.line(format!("_, _ = {key}, {}", dot.ident));
        Ok(key)
    }

    fn template_node(&mut self, template: &TemplateNode) -> CodegenResult<()> {
        let arg = match &template.pipe {
            Some(pipe) => self.pipeline(pipe)?.expr,
            None => "nil".to_string(),
        };
        self.out.open(format!(
            "if err := {TEMPLATER_IDENT}.ExecuteTemplate({WRITER_IDENT}, {}, {arg}); err != nil {{",
            quote_str(&template.name)
        ));
        self.out.line("return err");
        self.out.close("}");
        Ok(())
    }

    /// Close the `if` body, emitting the else branch when present.
    fn else_list(&mut self, else_list: Option<&ListNode>) -> CodegenResult<()> {
        if let Some(list) = else_list {
            self.out.reopen("} else {");
            self.list(list)?;
        }
        self.out.close("}");
        Ok(())
    }

    fn dot_binding(&self, branch: &BranchNode) -> CodegenResult<Binding> {
        self.scope
            .dot(branch.id)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("dot of node {}", branch.id)))
    }

    // ── Pipelines ─────────────────────────────────────────────────────────────

    /// Evaluate `pipe`. A declaring pipeline binds its variable and yields it.
    fn pipeline(&mut self, pipe: &Pipeline) -> CodegenResult<Value> {
        let value = self.commands(&pipe.cmds)?;
        let Some(decl) = pipe.decl.first() else {
            return Ok(value);
        };
        if value.is_nil_literal() {
            return Err(CodegenError::Unsupported(format!(
                "can't assign nil to {}",
                decl.name
            )));
        }
        let scope = self.scope;
        let binding = scope
            .variable(decl.id)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(decl.name.clone()))?;
        let source = if pipe.is_assign {
            self.coerce(&value, &binding.shape)
        } else {
            value.expr.clone()
        };
        self.bind(binding, &source, pipe.is_assign);
        Ok(Value::from_binding(binding))
    }

    fn bind(&mut self, binding: &Binding, source: &str, is_assign: bool) {
        if is_assign {
            self.out.line(format!("{} = {source}", binding.ident));
        } else {
            self.out.line(format!("{} := {source}", binding.ident));
            self.out.line(format!("_ = {}", binding.ident));
        }
    }

    /// Run the commands of a pipeline, feeding each result to the next one
    /// as its final argument.
    fn commands(&mut self, cmds: &[Command]) -> CodegenResult<Value> {
        let mut piped: Option<Value> = None;
        for cmd in cmds {
            piped = Some(self.command(cmd, piped)?);
        }
        piped.ok_or_else(|| CodegenError::Internal("empty pipeline".to_string()))
    }

    fn command(&mut self, cmd: &Command, piped: Option<Value>) -> CodegenResult<Value> {
        let Some(first) = cmd.args.first() else {
            return Err(CodegenError::Internal("empty command".to_string()));
        };
        if let OperandKind::Function(name) = &first.kind {
            let mut args = cmd.args[1..]
                .iter()
                .map(|arg| self.operand(arg))
                .collect::<CodegenResult<Vec<_>>>()?;
            args.extend(piped);
            return self.call(name, args);
        }
        if piped.is_some() || cmd.args.len() > 1 {
            return Err(CodegenError::Unsupported(
                "can't give argument to non-function".to_string(),
            ));
        }
        if first.kind == OperandKind::Nil {
            return Err(CodegenError::Unsupported("nil is not a command".to_string()));
        }
        self.operand(first)
    }

    fn operand(&mut self, operand: &Operand) -> CodegenResult<Value> {
        match &operand.kind {
            OperandKind::Dot => self.dot(),
            OperandKind::Nil => Ok(Value::new("nil", Shape::Nil)),
            OperandKind::Bool(b) => Ok(Value::new(b.to_string(), Shape::bool())),
            OperandKind::Number(n) => {
                let shape = if n.is_float {
                    Shape::basic("float64")
                } else {
                    Shape::int()
                };
                Ok(Value::new(n.text.clone(), shape))
            }
            OperandKind::String(s) => Ok(Value::new(quote_str(s), Shape::string())),
            OperandKind::Field(fields) => {
                let dot = self.dot()?;
                self.fields(dot, fields)
            }
            OperandKind::Variable { name, fields } => {
                let scope = self.scope;
                let binding = scope
                    .variable(operand.id)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.clone()))?;
                self.fields(Value::from_binding(binding), fields)
            }
            OperandKind::Function(name) => self.call(name, Vec::new()),
            OperandKind::Chain { operand, fields } => {
                let base = self.operand(operand)?;
                self.fields(base, fields)
            }
            OperandKind::Pipe(pipe) => self.pipeline(pipe),
        }
    }

    fn dot(&self) -> CodegenResult<Value> {
        self.dots
            .last()
            .map(Value::from_binding)
            .ok_or_else(|| CodegenError::Internal("no binding for dot".to_string()))
    }

    /// Follow `.A.B…` from `base`.
    fn fields(&mut self, base: Value, fields: &[String]) -> CodegenResult<Value> {
        let mut value = base;
        for name in fields {
            value = match value.shape.clone() {
                Shape::Struct { fields, name: ty, .. } => {
                    let shape = fields.get(name).cloned().ok_or_else(|| {
                        CodegenError::ShapeMismatch(format!("{ty} has no field {name}"))
                    })?;
                    Value::new(format!("{}.{name}", value.expr), shape)
                }
                Shape::Map { key, value: elem } if key.is_string() => {
                    Value::new(format!("{}[{}]", value.expr, quote_str(name)), *elem)
                }
                s if s.is_dynamic() => {
                    let funcs = self.ns.funcs_alias();
                    self.hoist(
                        format!("{funcs}.Field({}, {})", value.expr, quote_str(name)),
                        Shape::Interface,
                    )
                }
                other => {
                    return Err(CodegenError::ShapeMismatch(format!(
                        "can't evaluate field {name} of {} with shape {other:?}",
                        value.expr
                    )))
                }
            };
        }
        Ok(value)
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    /// Call a library function or builtin. Library functions shadow builtins.
    fn call(&mut self, name: &str, args: Vec<Value>) -> CodegenResult<Value> {
        let funcs = self.funcs;
        let Some(func) = funcs.get(name) else {
            let call = builtin_call(name, &args, self.ns)?;
            return Ok(if call.fallible {
                self.hoist(call.expr, call.shape)
            } else {
                Value::new(call.expr, call.shape)
            });
        };
        if !func.accepts(args.len()) {
            return Err(CodegenError::Unsupported(format!(
                "wrong number of arguments for {name}: {}",
                args.len()
            )));
        }
        let alias = self.ns.reserve_import(&func.package);
        let exprs: Vec<String> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                let param = if func.variadic && i + 1 >= func.params.len() {
                    func.params.last()
                } else {
                    func.params.get(i)
                };
                match param {
                    Some(param) => self.coerce(arg, param),
                    None => arg.expr.clone(),
                }
            })
            .collect();
        let expr = format!("{alias}.{}({})", func.symbol, exprs.join(", "));
        Ok(if func.returns_error {
            self.hoist(expr, func.result.clone())
        } else {
            Value::new(expr, func.result.clone())
        })
    }

    /// `value` as an expression of `target`'s Go type: dynamic values are
    /// type-asserted, numbers of another width converted.
    fn coerce(&mut self, value: &Value, target: &Shape) -> String {
        if target.is_dynamic() || value.is_nil_literal() || value.shape == *target {
            return value.expr.clone();
        }
        if value.shape.is_dynamic() {
            let ty = go_type(target, self.ns);
            return format!("{}.({ty})", value.expr);
        }
        if value.shape.is_number() && target.is_number() {
            let ty = go_type(target, self.ns);
            return format!("{ty}({})", value.expr);
        }
        value.expr.clone()
    }

    /// Bind a `(value, error)` expression to a fresh local, returning on error.
    fn hoist(&mut self, expr: String, shape: Shape) -> Value {
        let tmp = self.tmp();
        self.out.line(format!("{tmp}, err := {expr}"));
        self.out.open("if err != nil {");
        self.out.line("return err");
        self.out.close("}");
        Value::new(tmp, shape)
    }

    fn write_checked(&mut self, call: String) {
        self.out.open(format!("if _, werr := {call}; werr != nil {{"));
        self.out.line("return werr");
        self.out.close("}");
    }

    fn tmp(&mut self) -> String {
        loop {
            let name = format!("tmp{}", self.next_tmp);
            self.next_tmp += 1;
            if !self.ns.is_reserved(&name) {
                return name;
            }
        }
    }
}
