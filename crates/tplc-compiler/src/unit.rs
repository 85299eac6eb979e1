//! Work units: discovery of template sources and loading of their trees.
//!
//! A [`TemplateConfiguration`] expands into one [`WorkUnit`] per matched
//! file (or one for inline content). Loading a unit parses every template
//! the source declares, analyzes each tree against its data shape and
//! assigns it a provisional Go function name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use heck::ToLowerCamelCase;
use tplc_codegen::sanitize_ident;
use tplc_parser::{parse_source, Dialect};
use tplc_types::ast::Tree;
use tplc_types::{ScopeState, Shape, SourceFile};

use crate::checker::analyze;
use crate::config::{TemplateConfiguration, TemplateSource};
use crate::error::{CompileError, CompileResult};

/// Shown instead of a path for inline units.
const INLINE_PATH: &str = "<inline>";

/// Prefix marking generated function names.
const FUNCTION_PREFIX: &str = "fn";

/// One template source: a matched file or an inline entry.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    /// Main template name: the file's base name or the inline name.
    pub name: String,
    pub path: Option<PathBuf>,
    /// Every executable template the source declares, main included.
    pub trees: BTreeMap<String, Tree>,
    /// Provisional function name per template, replaced by the allocated
    /// one during code generation.
    pub functions: BTreeMap<String, String>,
    pub shapes: BTreeMap<String, Shape>,
    pub scopes: BTreeMap<String, ScopeState>,
    /// Templates declared by the source other than the main one, sorted.
    pub defined: Vec<String>,
}

impl WorkUnit {
    /// Whether the main template survived escaping.
    pub fn has_main(&self) -> bool {
        self.trees.contains_key(&self.name)
    }

    pub fn display_path(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| INLINE_PATH.to_string())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Resolver
// ══════════════════════════════════════════════════════════════════════════════

/// Expand `conf` into its loaded work units, in sorted path order.
pub fn resolve_units(conf: &TemplateConfiguration) -> CompileResult<Vec<WorkUnit>> {
    let source = conf.source().map_err(CompileError::Config)?;
    match source {
        TemplateSource::Inline { name, content } => {
            Ok(vec![load_unit(name, None, content, conf)?])
        }
        TemplateSource::Glob(pattern) => {
            let paths = discover(pattern)?;
            log::debug!("{pattern:?} matched {} file(s)", paths.len());
            paths
                .into_iter()
                .map(|path| {
                    let content = std::fs::read_to_string(&path).map_err(|source| {
                        CompileError::Read {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    let name = unit_name(&path);
                    load_unit(&name, Some(path), &content, conf)
                })
                .collect()
        }
    }
}

/// Paths matching `pattern`, sorted. No match is an empty list.
pub fn discover(pattern: &str) -> CompileResult<Vec<PathBuf>> {
    let matches = glob::glob(pattern).map_err(|source| CompileError::Discovery {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in matches {
        let path = entry.map_err(|e| CompileError::Read {
            path: e.path().to_path_buf(),
            source: e.into(),
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn unit_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ══════════════════════════════════════════════════════════════════════════════
// Loader
// ══════════════════════════════════════════════════════════════════════════════

/// Parse and analyze one unit.
///
/// Every template the parser returns is kept, including ones whose body is
/// only whitespace. In markup mode a template the escaper rejects is already
/// missing from the parse result and is skipped without error.
pub fn load_unit(
    name: &str,
    path: Option<PathBuf>,
    content: &str,
    conf: &TemplateConfiguration,
) -> CompileResult<WorkUnit> {
    let display_path = path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| INLINE_PATH.to_string());
    let parse_error = |errors| CompileError::Parse {
        unit: name.to_string(),
        path: display_path.clone(),
        errors,
    };

    let dialect = Dialect::from_markup_flag(conf.html);
    let parsed = parse_source(name, content, &conf.funcs, dialect);
    if parsed.errors.has_errors() {
        return Err(parse_error(parsed.errors));
    }

    let source = SourceFile::new(name, content);
    let mut unit = WorkUnit {
        name: name.to_string(),
        path,
        trees: BTreeMap::new(),
        functions: BTreeMap::new(),
        shapes: BTreeMap::new(),
        scopes: BTreeMap::new(),
        defined: Vec::new(),
    };
    for warning in &parsed.errors.warnings {
        log::debug!("{name}: {warning}");
    }
    for (tree_name, tree) in parsed.trees {
        let shape = conf.data.shape_for(&tree_name);
        let scope = analyze(&tree, &shape, &conf.funcs, &source).map_err(parse_error)?;
        unit.functions
            .insert(tree_name.clone(), provisional_name(name, &tree_name));
        if tree_name != name {
            unit.defined.push(tree_name.clone());
        }
        unit.shapes.insert(tree_name.clone(), shape);
        unit.scopes.insert(tree_name.clone(), scope);
        unit.trees.insert(tree_name, tree);
    }
    log::debug!(
        "loaded unit {name:?} from {display_path}: {} template(s)",
        unit.trees.len()
    );
    Ok(unit)
}

/// Provisional Go function name of template `tree` declared by unit `main`.
///
/// `file.tpl` gives `fnfileTpl`, its `{{define "embed"}}` gives
/// `fnfileTplEmbed`.
pub fn provisional_name(main: &str, tree: &str) -> String {
    let raw = if main == tree {
        format!("{FUNCTION_PREFIX}{main}")
    } else {
        format!("{FUNCTION_PREFIX}{main}_{tree}")
    };
    sanitize_ident(&raw).to_lower_camel_case()
}
