//! Go type expressions for data shapes.

use tplc_types::Shape;

use crate::namespace::Namespace;

/// The Go type of `shape`, importing the declaring package of any named
/// struct it mentions.
pub fn go_type(shape: &Shape, ns: &mut Namespace) -> String {
    match shape {
        Shape::Nil | Shape::Interface => "interface{}".to_string(),
        Shape::Basic { name } => name.clone(),
        Shape::Struct {
            package,
            name,
            pointer,
            ..
        } => {
            let alias = ns.reserve_import(package);
            let star = if *pointer { "*" } else { "" };
            format!("{star}{alias}.{name}")
        }
        Shape::Slice { elem } => format!("[]{}", go_type(elem, ns)),
        Shape::Map { key, value } => format!("map[{}]{}", go_type(key, ns), go_type(value, ns)),
    }
}
