//! Identifier and import-alias allocation for one generated Go file.
//!
//! Every name that ends up at package level or in a generated function's
//! parameter list goes through a [`Namespace`]: fixed runtime parameters and
//! the registry variable are reserved up front, import aliases when a package
//! is first referenced, function names when they are allocated. A candidate
//! that collides with anything already reserved is resolved with a
//! deterministic probe sequence.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Parameter and local names used by every generated function.
pub const RESERVED_IDENTS: &[&str] = &["t", "w", "data", "indata", "err", "werr"];

/// Prefix used to disambiguate a colliding import alias.
pub const IMPORT_MARKER: &str = "alias";

/// Prefix used to disambiguate a colliding function name.
pub const FUNCTION_MARKER: &str = "fn";

/// Go keywords, never valid as an alias or function name.
const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// Import paths of the runtime packages generated code depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeImports {
    /// Declares `Writer` and `WriteString`.
    pub io: String,
    /// Declares the `Templater` interface of the `t` parameter.
    pub templater: String,
    /// Runtime helpers for values only known at run time.
    pub funcs: String,
}

impl Default for RuntimeImports {
    fn default() -> Self {
        Self {
            io: "io".to_string(),
            templater: "github.com/mh-cbon/template-compiler/std/text/template/parse".to_string(),
            funcs: "github.com/mh-cbon/template-compiler/std/text/template/funcmap".to_string(),
        }
    }
}

/// One entry of the generated import block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub path: String,
    pub alias: String,
    /// The alias differs from the package's default name and must be spelled
    /// out in the import block.
    pub named: bool,
}

/// Reserved identifiers, imports and allocated function names of one
/// compile request.
#[derive(Debug, Clone)]
pub struct Namespace {
    reserved: IndexSet<String>,
    imports: Vec<ImportRecord>,
    functions: Vec<String>,
    runtime: RuntimeImports,
}

impl Namespace {
    /// A fresh namespace reserving the runtime parameter names, `registry_var`
    /// and the writer and templater imports.
    pub fn new(registry_var: &str, runtime: RuntimeImports) -> Self {
        let mut reserved: IndexSet<String> = GO_KEYWORDS.iter().map(|s| s.to_string()).collect();
        reserved.extend(RESERVED_IDENTS.iter().map(|s| s.to_string()));
        reserved.insert(registry_var.to_string());
        let mut ns = Self {
            reserved,
            imports: Vec::new(),
            functions: Vec::new(),
            runtime,
        };
        let io = ns.runtime.io.clone();
        let templater = ns.runtime.templater.clone();
        ns.reserve_import(&io);
        ns.reserve_import(&templater);
        ns
    }

    /// Alias of `path`, importing it on first use.
    ///
    /// The alias derives from the path's last segment; a collision prefixes
    /// [`IMPORT_MARKER`], and should that collide too the probe continues with
    /// a numeric counter.
    pub fn reserve_import(&mut self, path: &str) -> String {
        if let Some(record) = self.imports.iter().find(|r| r.path == path) {
            return record.alias.clone();
        }
        let default_name = path.rsplit('/').next().unwrap_or(path);
        let base = sanitize_ident(default_name);
        let alias = if !self.is_reserved(&base) {
            base.clone()
        } else {
            let prefixed = format!("{IMPORT_MARKER}{base}");
            if !self.is_reserved(&prefixed) {
                prefixed
            } else {
                resolve(&base, IMPORT_MARKER, &self.reserved)
            }
        };
        log::debug!("import {path:?} as {alias}");
        self.reserved.insert(alias.clone());
        self.imports.push(ImportRecord {
            path: path.to_string(),
            named: alias != default_name,
            alias: alias.clone(),
        });
        alias
    }

    /// Reserve a function name derived from `base`, probing `fn0base`,
    /// `fn1base`, … while it collides.
    pub fn allocate_function_name(&mut self, base: &str) -> String {
        let name = resolve(base, FUNCTION_MARKER, &self.reserved);
        if name != base {
            log::debug!("function name {base} collides, using {name}");
        }
        self.reserved.insert(name.clone());
        self.functions.push(name.clone());
        name
    }

    pub fn is_reserved(&self, ident: &str) -> bool {
        self.reserved.contains(ident)
    }

    /// Imports in first-use order.
    pub fn imports(&self) -> &[ImportRecord] {
        &self.imports
    }

    /// Allocated function names in allocation order.
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn runtime(&self) -> &RuntimeImports {
        &self.runtime
    }

    pub fn io_alias(&mut self) -> String {
        let path = self.runtime.io.clone();
        self.reserve_import(&path)
    }

    pub fn templater_alias(&mut self) -> String {
        let path = self.runtime.templater.clone();
        self.reserve_import(&path)
    }

    pub fn funcs_alias(&mut self) -> String {
        let path = self.runtime.funcs.clone();
        self.reserve_import(&path)
    }
}

/// First of `candidate`, `{marker}0{candidate}`, `{marker}1{candidate}`, …
/// absent from `taken`.
///
/// Pure: the same inputs always give the same answer, and nothing is
/// reserved.
pub fn resolve(candidate: &str, marker: &str, taken: &IndexSet<String>) -> String {
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    // `taken` is finite, so one of the first `len + 1` probes is free.
    (0..=taken.len())
        .map(|i| format!("{marker}{i}{candidate}"))
        .find(|probe| !taken.contains(probe))
        .unwrap_or_else(|| format!("{marker}{}{candidate}", taken.len() + 1))
}

/// Replace every character that cannot appear in a Go identifier with `_`,
/// and prefix `_` when the result would start with a digit.
pub fn sanitize_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
