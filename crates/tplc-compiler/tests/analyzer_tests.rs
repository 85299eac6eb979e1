//! Analyzer tests: variable locals, dot bindings, shape resolution and
//! shape diagnostics.

use std::collections::BTreeMap;

use tplc_compiler::analyze;
use tplc_parser::{parse_source, Dialect};
use tplc_types::ast::*;
use tplc_types::{
    CompileErrors, ErrorCode, FuncDescriptor, FunctionLibrary, ScopeState, Shape, SourceFile,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn user() -> Shape {
    Shape::Struct {
        package: "example.com/app/model".into(),
        name: "User".into(),
        pointer: true,
        fields: BTreeMap::from([
            ("Name".to_string(), Shape::string()),
            ("Tags".to_string(), Shape::slice(Shape::string())),
            ("Scores".to_string(), Shape::map(Shape::string(), Shape::int())),
        ]),
    }
}

fn tree_with(source: &str, funcs: &FunctionLibrary) -> Tree {
    let result = parse_source("main", source, funcs, Dialect::Text);
    assert!(
        !result.errors.has_errors(),
        "unexpected parse errors: {:?}",
        result.errors.errors
    );
    result.trees["main"].clone()
}

fn run_with(source: &str, shape: &Shape, funcs: &FunctionLibrary) -> Result<ScopeState, CompileErrors> {
    let tree = tree_with(source, funcs);
    analyze(&tree, shape, funcs, &SourceFile::new("main", source))
}

fn run(source: &str, shape: &Shape) -> (Tree, ScopeState) {
    let funcs = FunctionLibrary::new();
    let tree = tree_with(source, &funcs);
    let scope = analyze(&tree, shape, &funcs, &SourceFile::new("main", source))
        .unwrap_or_else(|e| panic!("unexpected analyzer errors:\n{e}"));
    (tree, scope)
}

fn codes(source: &str, shape: &Shape) -> Vec<ErrorCode> {
    run_with(source, shape, &FunctionLibrary::new())
        .expect_err("expected analyzer errors")
        .errors
        .iter()
        .map(|e| e.code)
        .collect()
}

/// Id of the first operand of the action at `index` in the main list.
fn action_operand(tree: &Tree, index: usize) -> NodeId {
    match &tree.root.nodes[index] {
        Node::Action(a) => a.pipe.cmds[0].args[0].id,
        other => panic!("expected action, got {other:?}"),
    }
}

fn action_decl(tree: &Tree, index: usize) -> NodeId {
    match &tree.root.nodes[index] {
        Node::Action(a) => a.pipe.decl[0].id,
        other => panic!("expected action, got {other:?}"),
    }
}

fn branch(tree: &Tree, index: usize) -> &BranchNode {
    match &tree.root.nodes[index] {
        Node::If(b) | Node::Range(b) | Node::With(b) => b,
        other => panic!("expected branch, got {other:?}"),
    }
}

fn ident(scope: &ScopeState, id: NodeId) -> &str {
    scope
        .variable(id)
        .map(|b| b.ident.as_str())
        .unwrap_or_else(|| panic!("no binding for {id}"))
}

// ══════════════════════════════════════════════════════════════════════════════
// Root binding
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn typed_root_is_data() {
    let (_, scope) = run("{{.Name}}", &user());
    assert_eq!(scope.root.ident, "data");
    assert_eq!(scope.root.shape, user());
}

#[test]
fn dynamic_root_is_input() {
    let (_, scope) = run("{{.Anything.Goes}}", &Shape::Nil);
    assert_eq!(scope.root.ident, "indata");
    assert_eq!(scope.root.shape, Shape::Interface);
}

#[test]
fn dollar_refers_to_root() {
    let (tree, scope) = run("{{$.Name}}", &user());
    assert_eq!(ident(&scope, action_operand(&tree, 0)), "data");
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn declaration_and_use_share_a_local() {
    let (tree, scope) = run("{{$x := .Name}}{{$x}}", &user());
    assert_eq!(ident(&scope, action_decl(&tree, 0)), "var0");
    assert_eq!(ident(&scope, action_operand(&tree, 1)), "var0");
    assert_eq!(scope.variable(action_decl(&tree, 0)).unwrap().shape, Shape::string());
}

#[test]
fn shadowed_variables_get_distinct_locals() {
    let (tree, scope) = run(
        "{{$x := 1}}{{if true}}{{$x := \"a\"}}{{$x}}{{end}}{{$x}}",
        &Shape::Nil,
    );
    let inner = &branch(&tree, 1).list.nodes;
    let inner_use = match &inner[1] {
        Node::Action(a) => a.pipe.cmds[0].args[0].id,
        other => panic!("expected action, got {other:?}"),
    };
    assert_eq!(ident(&scope, inner_use), "var1");
    assert_eq!(ident(&scope, action_operand(&tree, 2)), "var0");
    assert_eq!(scope.locals(), vec!["var0", "var1"]);
}

#[test]
fn assignment_reuses_the_declared_local() {
    let (tree, scope) = run("{{$x := 1}}{{$x = 2}}", &Shape::Nil);
    assert_eq!(ident(&scope, action_decl(&tree, 1)), "var0");
}

#[test]
fn branch_variables_do_not_leak() {
    assert_eq!(
        codes("{{if true}}{{$y := 1}}{{end}}{{$y}}", &Shape::Nil),
        vec![ErrorCode::UNDEFINED_VARIABLE]
    );
}

#[test]
fn assignment_to_undeclared_variable() {
    assert_eq!(codes("{{$z = 1}}", &Shape::Nil), vec![ErrorCode::UNDEFINED_VARIABLE]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Dots
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn range_binds_key_element_and_dot() {
    let (tree, scope) = run("{{range $i, $e := .Tags}}{{$e}}{{end}}", &user());
    let range = branch(&tree, 0);
    let i = scope.variable(range.pipe.decl[0].id).unwrap();
    let e = scope.variable(range.pipe.decl[1].id).unwrap();
    assert_eq!((i.ident.as_str(), &i.shape), ("var0", &Shape::int()));
    assert_eq!((e.ident.as_str(), &e.shape), ("var1", &Shape::string()));
    let dot = scope.dot(range.id).unwrap();
    assert_eq!(dot.ident, "dot0");
    assert_eq!(dot.shape, Shape::string());
}

#[test]
fn single_range_variable_is_the_element() {
    let (tree, scope) = run("{{range $v := .Scores}}{{end}}", &user());
    let range = branch(&tree, 0);
    assert_eq!(scope.variable(range.pipe.decl[0].id).unwrap().shape, Shape::int());
}

#[test]
fn with_binds_dot_to_its_value() {
    let (tree, scope) = run("{{with .Tags}}{{len .}}{{end}}", &user());
    let with = branch(&tree, 0);
    assert_eq!(scope.dot(with.id).unwrap().shape, Shape::slice(Shape::string()));
}

#[test]
fn nested_dots_resolve_against_the_innermost() {
    let (tree, scope) = run("{{range .Tags}}{{with .}}{{.}}{{end}}{{end}}", &user());
    let range = branch(&tree, 0);
    let with = match &range.list.nodes[0] {
        Node::With(b) => b,
        other => panic!("expected with, got {other:?}"),
    };
    assert_eq!(scope.dot(range.id).unwrap().ident, "dot0");
    assert_eq!(scope.dot(with.id).unwrap().ident, "dot1");
    assert_eq!(scope.dot(with.id).unwrap().shape, Shape::string());
}

#[test]
fn dynamic_range_yields_interface_elements() {
    let (tree, scope) = run("{{range .}}{{.X}}{{end}}", &Shape::Interface);
    assert_eq!(scope.dot(branch(&tree, 0).id).unwrap().shape, Shape::Interface);
}

// ══════════════════════════════════════════════════════════════════════════════
// Diagnostics
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_field() {
    let errors = run_with("line one\n{{.Missing}}", &user(), &FunctionLibrary::new()).unwrap_err();
    let error = errors.first().unwrap();
    assert_eq!(error.code, ErrorCode::UNKNOWN_FIELD);
    assert_eq!(error.span.start_line, 2);
    assert_eq!(error.source_line, "{{.Missing}}");
    assert!(error.message.contains("Missing"));
}

#[test]
fn field_of_a_scalar() {
    assert_eq!(codes("{{.Name.Length}}", &user()), vec![ErrorCode::UNKNOWN_FIELD]);
}

#[test]
fn range_over_scalar() {
    assert_eq!(codes("{{range .Name}}{{end}}", &user()), vec![ErrorCode::NOT_RANGEABLE]);
}

#[test]
fn builtin_arity() {
    assert_eq!(codes("{{not 1 2}}", &Shape::Nil), vec![ErrorCode::WRONG_ARG_COUNT]);
    assert_eq!(codes("{{lt 1}}", &Shape::Nil), vec![ErrorCode::WRONG_ARG_COUNT]);
}

#[test]
fn library_arity_and_result() {
    let funcs = FunctionLibrary::new().with(
        "upper",
        FuncDescriptor::new("example.com/app/text", "Upper")
            .params(vec![Shape::string()])
            .result(Shape::string()),
    );
    assert!(run_with("{{$u := upper .Name}}", &user(), &funcs).is_ok());
    let errors = run_with("{{upper .Name .Name}}", &user(), &funcs).unwrap_err();
    assert_eq!(errors.first().unwrap().code, ErrorCode::WRONG_ARG_COUNT);
}

#[test]
fn piping_into_a_value_is_rejected() {
    assert_eq!(codes("{{.Name | .Name}}", &user()), vec![ErrorCode::NOT_A_FUNCTION]);
}

#[test]
fn analysis_is_repeatable_with_other_shapes() {
    let funcs = FunctionLibrary::new();
    let source = "{{.Name}}";
    let tree = tree_with(source, &funcs);
    let file = SourceFile::new("main", source);
    assert!(analyze(&tree, &user(), &funcs, &file).is_ok());
    assert!(analyze(&tree, &Shape::string(), &funcs, &file).is_err());
    assert!(analyze(&tree, &Shape::Nil, &funcs, &file).is_ok());
}
