//! Parser tests: template collection, control structures, pipelines,
//! operand forms, syntax errors and markup-mode escaping.

use tplc_parser::{parse_source, Dialect, ParseResult};
use tplc_types::ast::*;
use tplc_types::{ErrorCode, FuncDescriptor, FunctionLibrary, Severity, Shape};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse_in(source: &str, dialect: Dialect) -> ParseResult {
    parse_source("main", source, &FunctionLibrary::new(), dialect)
}

fn parse(source: &str) -> ParseResult {
    parse_in(source, Dialect::Text)
}

/// Parse and return the main tree's nodes, panicking on errors.
fn main_nodes(source: &str) -> Vec<Node> {
    let result = parse(source);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {e}");
        }
        panic!("unexpected parse errors (see above)");
    }
    result.trees["main"].root.nodes.clone()
}

fn warning_codes(result: &ParseResult) -> Vec<ErrorCode> {
    result.errors.warnings.iter().map(|w| w.code).collect()
}

fn error_codes_in(source: &str, dialect: Dialect) -> Vec<ErrorCode> {
    parse_in(source, dialect)
        .errors
        .errors
        .iter()
        .map(|e| e.code)
        .collect()
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    error_codes_in(source, Dialect::Text)
}

/// The single action of `source`.
fn action(source: &str) -> ActionNode {
    match main_nodes(source).as_slice() {
        [Node::Action(a)] => a.clone(),
        other => panic!("expected one action, got {other:?}"),
    }
}

fn first_operand(a: &ActionNode) -> OperandKind {
    a.pipe.cmds[0].args[0].kind.clone()
}

/// Escapers of every action in output order, descending into branches.
fn escapers(list: &ListNode, out: &mut Vec<Option<Escaper>>) {
    for node in &list.nodes {
        match node {
            Node::Action(a) => out.push(a.escaper),
            Node::If(b) | Node::Range(b) | Node::With(b) => {
                escapers(&b.list, out);
                if let Some(e) = &b.else_list {
                    escapers(e, out);
                }
            }
            _ => {}
        }
    }
}

fn html_escapers(source: &str) -> Vec<Option<Escaper>> {
    let result = parse_in(source, Dialect::Html);
    assert!(
        !result.errors.has_errors(),
        "unexpected errors: {:?}",
        result.errors.errors
    );
    let mut out = Vec::new();
    escapers(&result.trees["main"].root, &mut out);
    out
}

// ─────────────────────────────────────────────────────────────────────
// Template collection
// ─────────────────────────────────────────────────────────────────────

#[test]
fn text_and_field_action() {
    let nodes = main_nodes("hello {{.Name}}");
    assert_eq!(nodes.len(), 2);
    assert!(matches!(&nodes[0], Node::Text(t) if t.text == "hello "));
    match &nodes[1] {
        Node::Action(a) => assert_eq!(first_operand(a), OperandKind::Field(vec!["Name".into()])),
        other => panic!("expected action, got {other:?}"),
    }
}

#[test]
fn define_adds_a_named_tree() {
    let result = parse(r#"hello!{{define "embed"}}{{.Email}} {{.Name}}{{end}}"#);
    assert!(!result.errors.has_errors());
    let names: Vec<&str> = result.trees.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["embed", "main"]);
    assert_eq!(result.trees["main"].root.nodes.len(), 1);
    assert_eq!(result.trees["embed"].root.nodes.len(), 3);
    assert_eq!(result.trees["embed"].source, "main");
}

#[test]
fn empty_redefinition_keeps_existing_body() {
    let result = parse(r#"{{define "a"}}x{{end}}{{define "a"}}  {{end}}"#);
    assert!(!result.errors.has_errors());
    assert!(!result.trees["a"].is_empty());
}

#[test]
fn non_empty_redefinition_replaces() {
    let result = parse(r#"{{define "a"}}x{{end}}{{define "a"}}y{{end}}"#);
    match result.trees["a"].root.nodes.as_slice() {
        [Node::Text(t)] => assert_eq!(t.text, "y"),
        other => panic!("unexpected body {other:?}"),
    }
}

#[test]
fn block_defines_and_invokes() {
    let result = parse(r#"{{block "side" .}}S{{end}}"#);
    assert!(!result.errors.has_errors());
    assert!(result.trees.contains_key("side"));
    match result.trees["main"].root.nodes.as_slice() {
        [Node::Template(t)] => {
            assert_eq!(t.name, "side");
            assert!(t.pipe.is_some());
        }
        other => panic!("expected template node, got {other:?}"),
    }
}

#[test]
fn template_invocation_without_pipeline() {
    match main_nodes(r#"{{template "x"}}"#).as_slice() {
        [Node::Template(t)] => {
            assert_eq!(t.name, "x");
            assert!(t.pipe.is_none());
        }
        other => panic!("expected template node, got {other:?}"),
    }
}

#[test]
fn define_inside_branch_is_rejected() {
    let codes = error_codes(r#"{{if .A}}{{define "x"}}y{{end}}{{end}}"#);
    assert!(codes.contains(&ErrorCode::UNEXPECTED_TOKEN));
}

// ─────────────────────────────────────────────────────────────────────
// Control structures
// ─────────────────────────────────────────────────────────────────────

#[test]
fn range_with_two_declarations() {
    match main_nodes("{{range $i, $e := .Items}}{{$i}}{{end}}").as_slice() {
        [Node::Range(b)] => {
            let names: Vec<&str> = b.pipe.decl.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["$i", "$e"]);
            assert!(!b.pipe.is_assign);
            assert_eq!(b.list.nodes.len(), 1);
            assert!(b.else_list.is_none());
        }
        other => panic!("expected range, got {other:?}"),
    }
}

#[test]
fn else_if_chains_into_nested_branch() {
    match main_nodes("{{if .A}}a{{else if .B}}b{{else}}c{{end}}").as_slice() {
        [Node::If(outer)] => {
            let else_list = outer.else_list.as_ref().expect("else list");
            match else_list.nodes.as_slice() {
                [Node::If(inner)] => {
                    assert_eq!(first_operand_of(&inner.pipe), OperandKind::Field(vec!["B".into()]));
                    assert!(inner.else_list.is_some());
                }
                other => panic!("expected nested if, got {other:?}"),
            }
        }
        other => panic!("expected if, got {other:?}"),
    }
}

fn first_operand_of(pipe: &Pipeline) -> OperandKind {
    pipe.cmds[0].args[0].kind.clone()
}

#[test]
fn with_and_else() {
    match main_nodes("{{with .User}}{{.Email}}{{else}}none{{end}}").as_slice() {
        [Node::With(b)] => {
            assert_eq!(b.list.nodes.len(), 1);
            assert_eq!(b.else_list.as_ref().map(|l| l.nodes.len()), Some(1));
        }
        other => panic!("expected with, got {other:?}"),
    }
}

#[test]
fn comments_are_kept_as_nodes() {
    let nodes = main_nodes("a{{/* c */}}b");
    assert!(matches!(nodes[1], Node::Comment(_)));
}

// ─────────────────────────────────────────────────────────────────────
// Pipelines and operands
// ─────────────────────────────────────────────────────────────────────

#[test]
fn pipeline_with_function_stage() {
    let a = action(r#"{{.Name | printf "%s!"}}"#);
    assert_eq!(a.pipe.cmds.len(), 2);
    assert_eq!(
        a.pipe.cmds[1]
            .args
            .iter()
            .map(|o| o.kind.clone())
            .collect::<Vec<_>>(),
        vec![
            OperandKind::Function("printf".into()),
            OperandKind::String("%s!".into())
        ]
    );
}

#[test]
fn variable_declaration_and_field_access() {
    let nodes = main_nodes("{{$x := .User}}{{$x.Email}}");
    match (&nodes[0], &nodes[1]) {
        (Node::Action(decl), Node::Action(use_)) => {
            assert_eq!(decl.pipe.decl[0].name, "$x");
            assert_eq!(
                first_operand(use_),
                OperandKind::Variable {
                    name: "$x".into(),
                    fields: vec!["Email".into()]
                }
            );
        }
        other => panic!("unexpected nodes {other:?}"),
    }
}

#[test]
fn assignment_is_flagged() {
    let nodes = main_nodes("{{$x := 1}}{{$x = 2}}");
    match &nodes[1] {
        Node::Action(a) => assert!(a.pipe.is_assign),
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn parenthesized_pipeline_with_field_chain() {
    let a = action(r#"{{(index .M "k").Name}}"#);
    match first_operand(&a) {
        OperandKind::Chain { operand, fields } => {
            assert_eq!(fields, vec!["Name".to_string()]);
            assert!(matches!(operand.kind, OperandKind::Pipe(_)));
        }
        other => panic!("expected chain, got {other:?}"),
    }
}

#[test]
fn literals() {
    let a = action("{{print 1.5 true nil `raw`}}");
    let kinds: Vec<OperandKind> = a.pipe.cmds[0].args.iter().map(|o| o.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            OperandKind::Function("print".into()),
            OperandKind::Number(NumberLit {
                text: "1.5".into(),
                is_float: true
            }),
            OperandKind::Bool(true),
            OperandKind::Nil,
            OperandKind::String("raw".into()),
        ]
    );
}

#[test]
fn library_functions_are_recognized() {
    let funcs = FunctionLibrary::new().with(
        "upper",
        FuncDescriptor::new("strings", "ToUpper")
            .params(vec![Shape::string()])
            .result(Shape::string()),
    );
    let result = parse_source("main", "{{upper .Name}}", &funcs, Dialect::Text);
    assert!(!result.errors.has_errors());
}

#[test]
fn node_ids_are_unique_within_a_source() {
    let a = action(r#"{{printf "%s" .A | html}}"#);
    let mut ids = vec![a.id, a.pipe.id];
    for cmd in &a.pipe.cmds {
        ids.push(cmd.id);
        ids.extend(cmd.args.iter().map(|o| o.id));
    }
    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len());
}

#[test]
fn parsing_is_deterministic() {
    let source = r#"{{define "a"}}{{range .Items}}{{.}}{{end}}{{end}}x{{template "a" .}}"#;
    let first = parse(source).trees;
    for _ in 0..20 {
        assert_eq!(parse(source).trees, first);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn undefined_function() {
    assert_eq!(error_codes("{{nope .X}}"), vec![ErrorCode::UNDEFINED_FUNCTION]);
}

#[test]
fn arguments_to_non_function() {
    assert_eq!(error_codes("{{$x .A}}"), vec![ErrorCode::NOT_A_FUNCTION]);
}

#[test]
fn empty_action() {
    assert_eq!(error_codes("{{}}"), vec![ErrorCode::EMPTY_PIPELINE]);
}

#[test]
fn dangling_pipe() {
    assert_eq!(error_codes("{{.A |}}"), vec![ErrorCode::EMPTY_PIPELINE]);
}

#[test]
fn unclosed_branch() {
    assert_eq!(error_codes("{{if .A}}x"), vec![ErrorCode::UNCLOSED_BLOCK]);
}

#[test]
fn stray_end() {
    assert_eq!(error_codes("x{{end}}"), vec![ErrorCode::UNEXPECTED_END]);
}

#[test]
fn parser_recovers_after_bad_action() {
    let result = parse("{{nope}} ok {{.A}}");
    assert_eq!(result.errors.total_errors, 1);
    let nodes = &result.trees["main"].root.nodes;
    assert!(nodes.iter().any(|n| matches!(n, Node::Action(_))));
}

#[test]
fn lexer_errors_are_merged() {
    assert!(error_codes("{{.A").contains(&ErrorCode::UNCLOSED_ACTION));
}

// ─────────────────────────────────────────────────────────────────────
// Markup mode
// ─────────────────────────────────────────────────────────────────────

#[test]
fn text_mode_assigns_no_escapers() {
    assert_eq!(action("{{.A}}").escaper, None);
}

#[test]
fn escapers_follow_document_context() {
    assert_eq!(
        html_escapers(r#"<a href="{{.U}}" title='{{.T}}' onclick="{{.J}}">{{.Body}}</a><script>{{.S}}</script><textarea>{{.X}}</textarea>"#),
        vec![
            Some(Escaper::Url),
            Some(Escaper::Attr),
            Some(Escaper::Js),
            Some(Escaper::Html),
            Some(Escaper::Js),
            Some(Escaper::RcData),
        ]
    );
}

#[test]
fn style_attribute_and_unquoted_value() {
    assert_eq!(
        html_escapers(r#"<p style="{{.C}}" class={{.K}}>x</p>"#),
        vec![Some(Escaper::Css), Some(Escaper::Attr)]
    );
}

#[test]
fn declarations_are_not_escaped() {
    assert_eq!(html_escapers("{{$x := .A}}{{$x}}"), vec![None, Some(Escaper::Html)]);
}

#[test]
fn branches_ending_in_same_context() {
    assert_eq!(
        html_escapers(r#"{{if .A}}<b>{{.X}}</b>{{else}}{{.Y}}{{end}}"#),
        vec![Some(Escaper::Html), Some(Escaper::Html)]
    );
}

#[test]
fn action_inside_tag_is_unsafe() {
    let result = parse_in("<div {{.A}}>", Dialect::Html);
    assert!(!result.errors.has_errors());
    assert_eq!(warning_codes(&result), vec![ErrorCode::UNSAFE_ACTION_CONTEXT]);
    assert!(!result.trees.contains_key("main"));
}

#[test]
fn branch_context_mismatch() {
    let result = parse_in(r#"{{if .A}}<a href="{{end}}x"#, Dialect::Html);
    assert_eq!(warning_codes(&result), vec![ErrorCode::BRANCH_CONTEXT_MISMATCH]);
    assert_eq!(result.errors.warnings[0].severity, Severity::Warning);
    assert!(result.trees.is_empty());
}

#[test]
fn unescapable_define_is_dropped_alone() {
    let result = parse_in(
        r#"ok{{define "bad"}}{{if .}}<a href="{{end}}x">{{end}}{{define "good"}}<b>{{.}}</b>{{end}}"#,
        Dialect::Html,
    );
    assert!(!result.errors.has_errors());
    assert_eq!(warning_codes(&result), vec![ErrorCode::BRANCH_CONTEXT_MISMATCH]);
    let names: Vec<&str> = result.trees.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["good", "main"]);
}

#[test]
fn text_mode_never_drops_for_context() {
    let result = parse(r#"{{if .A}}<a href="{{end}}x"#);
    assert!(!result.errors.has_errors());
    assert!(result.errors.warnings.is_empty());
    assert!(result.trees.contains_key("main"));
}

#[test]
fn defined_templates_are_escaped_too() {
    let result = parse_in(r#"{{define "e"}}<i>{{.}}</i>{{end}}"#, Dialect::Html);
    let mut out = Vec::new();
    escapers(&result.trees["e"].root, &mut out);
    assert_eq!(out, vec![Some(Escaper::Html)]);
}
