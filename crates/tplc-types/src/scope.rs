//! Analyzer output consumed by the code generator.

use std::collections::BTreeMap;

use crate::ast::NodeId;
use crate::Shape;

/// A Go local bound to a template value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub ident: String,
    pub shape: Shape,
}

impl Binding {
    pub fn new(ident: impl Into<String>, shape: Shape) -> Self {
        Self {
            ident: ident.into(),
            shape,
        }
    }
}

impl Default for Binding {
    fn default() -> Self {
        Binding::new("indata", Shape::Interface)
    }
}

/// Naming annotations for one tree analyzed against one data shape.
///
/// Every template variable is mapped to its own Go local, so shadowed
/// `$x` declarations never share an identifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeState {
    /// The template's data, i.e. `$` and the initial dot.
    pub root: Binding,
    /// Every variable declaration and reference, keyed by the `VarDecl` or
    /// `Operand` node.
    pub variables: BTreeMap<NodeId, Binding>,
    /// Dot inside the body of a `range` or `with` node.
    pub dots: BTreeMap<NodeId, Binding>,
}

impl ScopeState {
    pub fn variable(&self, id: NodeId) -> Option<&Binding> {
        self.variables.get(&id)
    }

    pub fn dot(&self, id: NodeId) -> Option<&Binding> {
        self.dots.get(&id)
    }

    /// Go locals allocated for this tree, sorted, without the root binding.
    pub fn locals(&self) -> Vec<&str> {
        let mut idents: Vec<&str> = self
            .variables
            .values()
            .chain(self.dots.values())
            .map(|b| b.ident.as_str())
            .filter(|ident| *ident != self.root.ident)
            .collect();
        idents.sort_unstable();
        idents.dedup();
        idents
    }
}
