//! Builtin template functions and output escapers.
//!
//! A builtin whose argument shapes are statically known becomes a plain Go
//! expression; otherwise it calls the runtime helper package, which may
//! report an error.

use tplc_types::ast::Escaper;
use tplc_types::{builtin_result, direct_index, Shape};

use crate::convert::Value;
use crate::error::{CodegenError, CodegenResult};
use crate::namespace::Namespace;

const FMT: &str = "fmt";
const HTML_TEMPLATE: &str = "html/template";

/// A translated call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub expr: String,
    pub shape: Shape,
    /// The expression yields `(value, error)` and must be hoisted.
    pub fallible: bool,
}

impl Call {
    fn pure(expr: String, shape: Shape) -> Self {
        Self {
            expr,
            shape,
            fallible: false,
        }
    }

    fn fallible(expr: String, shape: Shape) -> Self {
        Self {
            expr,
            shape,
            fallible: true,
        }
    }
}

/// Translate the builtin `name` applied to `args`.
pub fn builtin_call(name: &str, args: &[Value], ns: &mut Namespace) -> CodegenResult<Call> {
    let shapes: Vec<Shape> = args.iter().map(|a| a.shape.clone()).collect();
    let result = builtin_result(name, &shapes);
    let list = join(args);
    let call = match name {
        "and" | "or" => {
            require(name, args, 1, None)?;
            if result.is_basic("bool") {
                let op = if name == "and" { " && " } else { " || " };
                Call::pure(format!("({})", join_with(args, op)), result)
            } else {
                let funcs = ns.funcs_alias();
                let symbol = if name == "and" { "And" } else { "Or" };
                Call::pure(format!("{funcs}.{symbol}({list})"), result)
            }
        }
        "not" => {
            require(name, args, 1, Some(1))?;
            Call::pure(format!("!({})", truth(&args[0], ns)), result)
        }
        "len" => {
            require(name, args, 1, Some(1))?;
            match &args[0].shape {
                Shape::Slice { .. } | Shape::Map { .. } => Call::pure(format!("len({list})"), result),
                s if s.is_string() => Call::pure(format!("len({list})"), result),
                _ => {
                    let funcs = ns.funcs_alias();
                    Call::fallible(format!("{funcs}.Len({list})"), result)
                }
            }
        }
        "index" => {
            require(name, args, 1, None)?;
            if direct_index(&shapes).is_some() {
                Call::pure(format!("{}[{}]", args[0].expr, args[1].expr), result)
            } else {
                let funcs = ns.funcs_alias();
                Call::fallible(format!("{funcs}.Index({list})"), result)
            }
        }
        "print" | "printf" | "println" => {
            if name == "printf" {
                require(name, args, 1, None)?;
            }
            let fmt = ns.reserve_import(FMT);
            let symbol = match name {
                "print" => "Sprint",
                "printf" => "Sprintf",
                _ => "Sprintln",
            };
            Call::pure(format!("{fmt}.{symbol}({list})"), result)
        }
        "html" | "js" | "urlquery" => {
            let template = ns.reserve_import(HTML_TEMPLATE);
            let symbol = match name {
                "html" => "HTMLEscaper",
                "js" => "JSEscaper",
                _ => "URLQueryEscaper",
            };
            Call::pure(format!("{template}.{symbol}({list})"), result)
        }
        "eq" => {
            require(name, args, 2, None)?;
            if args.len() == 2 && args[0].shape.directly_comparable(&args[1].shape) {
                Call::pure(format!("({} == {})", args[0].expr, args[1].expr), result)
            } else {
                let funcs = ns.funcs_alias();
                Call::fallible(format!("{funcs}.Eq({list})"), result)
            }
        }
        "ne" | "lt" | "le" | "gt" | "ge" => {
            require(name, args, 2, Some(2))?;
            let (op, symbol) = match name {
                "ne" => ("!=", "Ne"),
                "lt" => ("<", "Lt"),
                "le" => ("<=", "Le"),
                "gt" => (">", "Gt"),
                _ => (">=", "Ge"),
            };
            let operator_applies = name == "ne" || !args[0].shape.is_basic("bool");
            if operator_applies && args[0].shape.directly_comparable(&args[1].shape) {
                Call::pure(format!("({} {op} {})", args[0].expr, args[1].expr), result)
            } else {
                let funcs = ns.funcs_alias();
                Call::fallible(format!("{funcs}.{symbol}({list})"), result)
            }
        }
        other => return Err(CodegenError::UnresolvedSymbol(format!("function {other:?}"))),
    };
    Ok(call)
}

/// Go boolean expression testing `value` for template truth.
pub fn truth(value: &Value, ns: &mut Namespace) -> String {
    let expr = &value.expr;
    match &value.shape {
        s if s.is_basic("bool") => expr.clone(),
        s if s.is_string() => format!("{expr} != \"\""),
        s if s.is_number() => format!("{expr} != 0"),
        Shape::Slice { .. } | Shape::Map { .. } => format!("len({expr}) > 0"),
        Shape::Struct { pointer: true, .. } => format!("{expr} != nil"),
        Shape::Struct { pointer: false, .. } => "true".to_string(),
        _ => {
            let funcs = ns.funcs_alias();
            format!("{funcs}.IsTrue({expr})")
        }
    }
}

/// Go string expression printing `value`, escaped when markup mode chose an
/// escaper for it.
pub fn output_string(value: &Value, escaper: Option<Escaper>, ns: &mut Namespace) -> String {
    let expr = &value.expr;
    match escaper {
        None if value.shape.is_string() => expr.clone(),
        None => {
            let fmt = ns.reserve_import(FMT);
            format!("{fmt}.Sprint({expr})")
        }
        Some(escaper) => {
            let (package, symbol) = escaper_function(escaper, ns);
            format!("{package}.{symbol}({expr})")
        }
    }
}

/// Package alias and function escaping a value for `escaper`'s context.
fn escaper_function(escaper: Escaper, ns: &mut Namespace) -> (String, &'static str) {
    match escaper {
        Escaper::Html | Escaper::Attr | Escaper::RcData => {
            (ns.reserve_import(HTML_TEMPLATE), "HTMLEscaper")
        }
        Escaper::Js => (ns.reserve_import(HTML_TEMPLATE), "JSEscaper"),
        Escaper::Url => (ns.funcs_alias(), "URLEscaper"),
        Escaper::Css => (ns.funcs_alias(), "CSSEscaper"),
    }
}

fn require(name: &str, args: &[Value], min: usize, max: Option<usize>) -> CodegenResult<()> {
    let count = args.len();
    if count < min || max.is_some_and(|max| count > max) {
        return Err(CodegenError::Unsupported(format!(
            "wrong number of arguments for {name}: {count}"
        )));
    }
    Ok(())
}

fn join(args: &[Value]) -> String {
    join_with(args, ", ")
}

fn join_with(args: &[Value], sep: &str) -> String {
    args.iter()
        .map(|a| a.expr.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::RuntimeImports;

    fn ns() -> Namespace {
        Namespace::new("compiledTemplates", RuntimeImports::default())
    }

    fn value(expr: &str, shape: Shape) -> Value {
        Value::new(expr, shape)
    }

    #[test]
    fn static_comparison_is_inlined() {
        let mut ns = ns();
        let call = builtin_call(
            "eq",
            &[value("data.N", Shape::int()), value("3", Shape::int())],
            &mut ns,
        )
        .unwrap();
        assert_eq!(call.expr, "(data.N == 3)");
        assert!(!call.fallible);
    }

    #[test]
    fn dynamic_comparison_uses_runtime() {
        let mut ns = ns();
        let call = builtin_call(
            "lt",
            &[value("indata", Shape::Interface), value("3", Shape::int())],
            &mut ns,
        )
        .unwrap();
        assert_eq!(call.expr, "funcmap.Lt(indata, 3)");
        assert!(call.fallible);
        assert_eq!(call.shape, Shape::bool());
    }

    #[test]
    fn map_index_is_inlined() {
        let mut ns = ns();
        let m = Shape::map(Shape::string(), Shape::int());
        let call = builtin_call(
            "index",
            &[value("data.M", m), value("\"k\"", Shape::string())],
            &mut ns,
        )
        .unwrap();
        assert_eq!(call.expr, "data.M[\"k\"]");
        assert_eq!(call.shape, Shape::int());
    }

    #[test]
    fn printf_imports_fmt() {
        let mut ns = ns();
        let call = builtin_call(
            "printf",
            &[value("\"%d\"", Shape::string()), value("1", Shape::int())],
            &mut ns,
        )
        .unwrap();
        assert_eq!(call.expr, "fmt.Sprintf(\"%d\", 1)");
        assert!(ns.imports().iter().any(|r| r.path == "fmt"));
    }

    #[test]
    fn arity_is_checked() {
        let mut ns = ns();
        assert!(builtin_call("not", &[], &mut ns).is_err());
        assert!(builtin_call("eq", &[value("1", Shape::int())], &mut ns).is_err());
    }

    #[test]
    fn truth_by_shape() {
        let mut ns = ns();
        assert_eq!(truth(&value("x", Shape::bool()), &mut ns), "x");
        assert_eq!(truth(&value("x", Shape::string()), &mut ns), "x != \"\"");
        assert_eq!(truth(&value("x", Shape::int()), &mut ns), "x != 0");
        assert_eq!(truth(&value("x", Shape::slice(Shape::int())), &mut ns), "len(x) > 0");
        assert_eq!(truth(&value("x", Shape::Interface), &mut ns), "funcmap.IsTrue(x)");
    }

    #[test]
    fn escaped_output() {
        let mut ns = ns();
        let v = value("data.Name", Shape::string());
        assert_eq!(output_string(&v, None, &mut ns), "data.Name");
        assert_eq!(
            output_string(&v, Some(Escaper::Html), &mut ns),
            "template.HTMLEscaper(data.Name)"
        );
        let n = value("data.N", Shape::int());
        assert_eq!(output_string(&n, None, &mut ns), "fmt.Sprint(data.N)");
    }
}
