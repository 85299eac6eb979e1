//! Template variable environment with lexically scoped bindings.
//!
//! [`VarEnv`] manages a stack of scopes. A scope opens at an `if`, `range`
//! or `with` and closes at its `{{end}}`, so a `$x` declared inside a branch
//! is invisible after it.

use std::collections::HashMap;

use tplc_types::Binding;

// ══════════════════════════════════════════════════════════════════════════════
// VarEnv
// ══════════════════════════════════════════════════════════════════════════════

/// A stack of scopes mapping `$name` to its Go local.
#[derive(Debug)]
pub struct VarEnv {
    scopes: Vec<HashMap<String, Binding>>,
}

impl VarEnv {
    /// A new environment whose root scope binds `$` to `root`.
    pub fn new(root: Binding) -> Self {
        let mut scope = HashMap::new();
        scope.insert("$".to_string(), root);
        Self {
            scopes: vec![scope],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the root scope");
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope. Redeclaring a name in the same
    /// scope replaces the earlier binding.
    pub fn define(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    /// Look up a binding by name, searching from innermost to outermost scope.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Current nesting depth (1 = root scope).
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
