//! tplc parser: converts a token stream into named template trees.
//!
//! One source declares its main template plus any number of `{{define}}` and
//! `{{block}}` templates. [`parse_source`] runs the whole front end for one
//! source in the requested [`Dialect`].

mod escape;
mod parse_node;
mod parse_pipe;
mod parser;

use serde::{Deserialize, Serialize};
use tplc_lexer::Lexer;
use tplc_types::{CompileErrors, FunctionLibrary, SourceFile};

pub use escape::annotate_escapers;
pub use parser::{ParseResult, Parser};

/// Which template language a source is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Plain text output, no escaping.
    #[default]
    Text,
    /// Markup output with contextual escaping of every action.
    Html,
}

impl Dialect {
    pub fn from_markup_flag(html: bool) -> Self {
        if html {
            Dialect::Html
        } else {
            Dialect::Text
        }
    }
}

/// Lex, parse and (in markup mode) escape one template source.
///
/// `name` becomes the main template name; every `{{define}}` adds another
/// entry to [`ParseResult::trees`]. In markup mode a template the escaper
/// rejects is left out of the trees and reported in
/// [`CompileErrors::warnings`].
pub fn parse_source(
    name: &str,
    content: &str,
    funcs: &FunctionLibrary,
    dialect: Dialect,
) -> ParseResult {
    let source = SourceFile::new(name, content);
    let lexed = Lexer::new(&source).lex();
    let mut result = Parser::new(lexed.tokens, &source, funcs).parse(name);
    let mut errors = lexed.errors;
    errors.extend(std::mem::take(&mut result.errors));
    result.errors = errors;

    if dialect == Dialect::Html && !result.errors.has_errors() {
        escape_trees(&mut result, &source);
    }
    result
}

/// Run the escaper over every tree on its own.
///
/// A tree that cannot be escaped is removed from the result and its
/// diagnostics are kept as warnings; the remaining trees stay usable.
fn escape_trees(result: &mut ParseResult, source: &SourceFile) {
    let mut unsafe_trees = Vec::new();
    for (name, tree) in result.trees.iter_mut() {
        let mut diagnostics = CompileErrors::empty();
        annotate_escapers(tree, source, &mut diagnostics);
        if diagnostics.has_errors() {
            unsafe_trees.push((name.clone(), diagnostics));
        }
    }
    for (name, diagnostics) in unsafe_trees {
        log::debug!(
            "{}: dropping template {name:?}, it cannot be escaped: {diagnostics}",
            source.name
        );
        result.trees.remove(&name);
        for error in diagnostics.errors {
            result.errors.push_warning(error);
        }
    }
}
