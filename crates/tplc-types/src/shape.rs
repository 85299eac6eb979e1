//! Data shapes and function libraries.
//!
//! A [`Shape`] describes the Go type of a value a template reads: the data
//! handed to the template, a struct field, a function argument or result.
//! Shapes are configuration, deserialized from JSON, and drive both the
//! analyzer (field resolution) and the code generator (type assertions,
//! truthiness, string conversion).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Builtin template functions, always in scope.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "and", "or", "not", "len", "index", "print", "printf", "println", "eq", "ne", "lt", "le",
    "gt", "ge", "html", "js", "urlquery",
];

/// Wildcard key of a [`DataConfiguration`].
pub const WILDCARD: &str = "*";

// ══════════════════════════════════════════════════════════════════════════════
// Shape
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// No data at all.
    #[default]
    Nil,
    /// A predeclared Go type: `string`, `int`, `bool`, `float64`, …
    Basic { name: String },
    /// A named struct type from an importable package.
    Struct {
        package: String,
        name: String,
        #[serde(default)]
        pointer: bool,
        #[serde(default)]
        fields: BTreeMap<String, Shape>,
    },
    Slice { elem: Box<Shape> },
    Map { key: Box<Shape>, value: Box<Shape> },
    /// `interface{}`: resolved at run time.
    Interface,
}

impl Shape {
    pub fn basic(name: impl Into<String>) -> Self {
        Shape::Basic { name: name.into() }
    }

    pub fn string() -> Self {
        Shape::basic("string")
    }

    pub fn bool() -> Self {
        Shape::basic("bool")
    }

    pub fn int() -> Self {
        Shape::basic("int")
    }

    pub fn slice(elem: Shape) -> Self {
        Shape::Slice {
            elem: Box::new(elem),
        }
    }

    pub fn map(key: Shape, value: Shape) -> Self {
        Shape::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Shape::Nil)
    }

    pub fn is_basic(&self, name: &str) -> bool {
        matches!(self, Shape::Basic { name: n } if n == name)
    }

    pub fn is_string(&self) -> bool {
        self.is_basic("string")
    }

    /// Numeric predeclared types.
    pub fn is_number(&self) -> bool {
        matches!(self, Shape::Basic { name } if matches!(
            name.as_str(),
            "int" | "int8" | "int16" | "int32" | "int64"
                | "uint" | "uint8" | "uint16" | "uint32" | "uint64" | "uintptr"
                | "float32" | "float64" | "byte" | "rune"
        ))
    }

    /// Types only known at run time.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Shape::Interface | Shape::Nil)
    }

    /// Shape of `.name` on a value of this shape.
    ///
    /// `None` means the field definitely does not exist; dynamic shapes
    /// resolve every field to [`Shape::Interface`].
    pub fn field(&self, name: &str) -> Option<Shape> {
        match self {
            Shape::Struct { fields, .. } => fields.get(name).cloned(),
            Shape::Map { key, value } if key.is_string() => Some((**value).clone()),
            Shape::Interface | Shape::Nil => Some(Shape::Interface),
            _ => None,
        }
    }

    /// `(key, element)` shapes when ranging over a value of this shape.
    pub fn range_shapes(&self) -> Option<(Shape, Shape)> {
        match self {
            Shape::Slice { elem } => Some((Shape::int(), (**elem).clone())),
            Shape::Map { key, value } => Some(((**key).clone(), (**value).clone())),
            // Dynamic values are iterated as a list of elements.
            Shape::Interface | Shape::Nil => Some((Shape::int(), Shape::Interface)),
            _ => None,
        }
    }

    /// Both operands can be compared with a Go operator instead of the
    /// runtime comparison helpers.
    pub fn directly_comparable(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Basic { name: a }, Shape::Basic { name: b }) => {
                a == b && (self.is_number() || self.is_string() || self.is_basic("bool"))
            }
            _ => false,
        }
    }
}

/// `index m k` on a map whose key shape matches, which needs no runtime help.
pub fn direct_index(args: &[Shape]) -> Option<Shape> {
    match args {
        [Shape::Map { key, value }, k] if **key == *k => Some((**value).clone()),
        _ => None,
    }
}

/// Result shape of the builtin `name` applied to arguments of `args` shapes.
pub fn builtin_result(name: &str, args: &[Shape]) -> Shape {
    match name {
        "and" | "or" if !args.is_empty() && args.iter().all(|a| a.is_basic("bool")) => Shape::bool(),
        "and" | "or" => Shape::Interface,
        "not" | "eq" | "ne" | "lt" | "le" | "gt" | "ge" => Shape::bool(),
        "len" => Shape::int(),
        "index" => direct_index(args).unwrap_or(Shape::Interface),
        _ => Shape::string(),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Data configuration
// ══════════════════════════════════════════════════════════════════════════════

/// Data shape per template name, with `"*"` as the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataConfiguration {
    shapes: BTreeMap<String, Shape>,
}

impl DataConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every template receives `shape` unless overridden.
    pub fn wildcard(shape: Shape) -> Self {
        let mut conf = Self::new();
        conf.insert(WILDCARD, shape);
        conf
    }

    pub fn insert(&mut self, name: impl Into<String>, shape: Shape) {
        self.shapes.insert(name.into(), shape);
    }

    pub fn with(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.insert(name, shape);
        self
    }

    /// Shape for the template `name`, falling back to the wildcard, then to
    /// "no data".
    pub fn shape_for(&self, name: &str) -> Shape {
        self.shapes
            .get(name)
            .or_else(|| self.shapes.get(WILDCARD))
            .cloned()
            .unwrap_or_default()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Function library
// ══════════════════════════════════════════════════════════════════════════════

/// A Go function exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDescriptor {
    /// Import path of the declaring package.
    pub package: String,
    /// Exported identifier inside `package`.
    pub symbol: String,
    #[serde(default)]
    pub params: Vec<Shape>,
    /// The last parameter accepts any number of arguments.
    #[serde(default)]
    pub variadic: bool,
    #[serde(default = "interface_shape")]
    pub result: Shape,
    /// The function returns `(result, error)`.
    #[serde(default)]
    pub returns_error: bool,
}

fn interface_shape() -> Shape {
    Shape::Interface
}

impl FuncDescriptor {
    pub fn new(package: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            symbol: symbol.into(),
            params: Vec::new(),
            variadic: false,
            result: Shape::Interface,
            returns_error: false,
        }
    }

    pub fn params(mut self, params: Vec<Shape>) -> Self {
        self.params = params;
        self
    }

    pub fn result(mut self, result: Shape) -> Self {
        self.result = result;
        self
    }

    pub fn returns_error(mut self) -> Self {
        self.returns_error = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether `count` arguments satisfy the declared parameters.
    pub fn accepts(&self, count: usize) -> bool {
        if self.variadic {
            count + 1 >= self.params.len()
        } else {
            count == self.params.len()
        }
    }
}

/// Template function name → Go function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionLibrary {
    funcs: BTreeMap<String, FuncDescriptor>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, func: FuncDescriptor) {
        self.funcs.insert(name.into(), func);
    }

    pub fn with(mut self, name: impl Into<String>, func: FuncDescriptor) -> Self {
        self.insert(name, func);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FuncDescriptor> {
        self.funcs.get(name)
    }

    /// Library functions shadow builtins of the same name.
    pub fn is_defined(&self, name: &str) -> bool {
        self.funcs.contains_key(name) || BUILTIN_FUNCTIONS.contains(&name)
    }

    /// The export table, sorted by template-facing name.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &FuncDescriptor)> {
        self.funcs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `(import path, exported identifier)` of a library function.
    pub fn public_ident(&self, name: &str) -> Option<(&str, &str)> {
        self.funcs
            .get(name)
            .map(|f| (f.package.as_str(), f.symbol.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Shape {
        Shape::Struct {
            package: "example.com/app/model".into(),
            name: "User".into(),
            pointer: true,
            fields: BTreeMap::from([
                ("Email".to_string(), Shape::string()),
                ("Tags".to_string(), Shape::slice(Shape::string())),
            ]),
        }
    }

    #[test]
    fn data_configuration_falls_back_to_wildcard() {
        let conf = DataConfiguration::wildcard(Shape::Nil).with("embed", user());
        assert_eq!(conf.shape_for("embed"), user());
        assert_eq!(conf.shape_for("other"), Shape::Nil);
        assert_eq!(DataConfiguration::new().shape_for("x"), Shape::Nil);
    }

    #[test]
    fn struct_field_lookup() {
        assert_eq!(user().field("Email"), Some(Shape::string()));
        assert_eq!(user().field("Missing"), None);
        assert_eq!(Shape::Interface.field("Any"), Some(Shape::Interface));
        assert_eq!(Shape::string().field("Len"), None);
    }

    #[test]
    fn range_shapes_of_slice_and_map() {
        let tags = user().field("Tags").unwrap();
        assert_eq!(tags.range_shapes(), Some((Shape::int(), Shape::string())));
        let m = Shape::map(Shape::string(), Shape::bool());
        assert_eq!(m.range_shapes(), Some((Shape::string(), Shape::bool())));
        assert_eq!(Shape::string().range_shapes(), None);
        assert_eq!(Shape::Interface.range_shapes(), Some((Shape::int(), Shape::Interface)));
    }

    #[test]
    fn builtin_results() {
        let m = Shape::map(Shape::string(), Shape::int());
        assert_eq!(builtin_result("index", &[m.clone(), Shape::string()]), Shape::int());
        assert_eq!(builtin_result("index", &[m, Shape::int()]), Shape::Interface);
        assert_eq!(builtin_result("and", &[Shape::bool(), Shape::bool()]), Shape::bool());
        assert_eq!(builtin_result("or", &[Shape::bool(), Shape::string()]), Shape::Interface);
        assert_eq!(builtin_result("printf", &[Shape::string()]), Shape::string());
        assert_eq!(builtin_result("len", &[Shape::Interface]), Shape::int());
    }

    #[test]
    fn direct_comparison_needs_identical_basic_shapes() {
        assert!(Shape::int().directly_comparable(&Shape::int()));
        assert!(Shape::string().directly_comparable(&Shape::string()));
        assert!(!Shape::int().directly_comparable(&Shape::basic("float64")));
        assert!(!Shape::Interface.directly_comparable(&Shape::Interface));
    }

    #[test]
    fn shape_json_is_tagged_by_kind() {
        let json = r#"{"kind":"struct","package":"a/b","name":"T","fields":{"N":{"kind":"basic","name":"int"}}}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.field("N"), Some(Shape::int()));
        let nil: Shape = serde_json::from_str(r#"{"kind":"nil"}"#).unwrap();
        assert!(nil.is_nil());
    }

    #[test]
    fn library_public_ident_and_arity() {
        let lib = FunctionLibrary::new().with(
            "upper",
            FuncDescriptor::new("strings", "ToUpper")
                .params(vec![Shape::string()])
                .result(Shape::string()),
        );
        assert_eq!(lib.public_ident("upper"), Some(("strings", "ToUpper")));
        assert!(lib.is_defined("upper"));
        assert!(lib.is_defined("printf"));
        assert!(!lib.is_defined("lower"));
        assert!(lib.get("upper").unwrap().accepts(1));
        assert!(!lib.get("upper").unwrap().accepts(2));
    }
}
