//! The generated Go file as a value.

use tplc_codegen::{quote_bytes, FunctionDecl, ImportRecord};

use crate::registry::InitStatement;

/// Comment placed after the package clause of every generated file.
pub const IGNORE_MARKER: &str = "//golint:ignore";

/// A `var builtinN = []byte("…")` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralConst {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything one compile request generates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    pub package: String,
    pub registry_var: String,
    /// In first-use order.
    pub imports: Vec<ImportRecord>,
    /// In insertion order.
    pub literals: Vec<LiteralConst>,
    pub init: Vec<InitStatement>,
    /// In generation order.
    pub functions: Vec<FunctionDecl>,
}

impl OutputUnit {
    /// The Go source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("package {}\n\n{IGNORE_MARKER}\n", self.package));

        // Only generated functions use imports.
        if !self.functions.is_empty() && !self.imports.is_empty() {
            out.push_str("\nimport (\n");
            for import in &self.imports {
                if import.named {
                    out.push_str(&format!("\t{} \"{}\"\n", import.alias, import.path));
                } else {
                    out.push_str(&format!("\t\"{}\"\n", import.path));
                }
            }
            out.push_str(")\n");
        }

        if !self.literals.is_empty() {
            out.push('\n');
            for literal in &self.literals {
                out.push_str(&format!(
                    "var {} = []byte({})\n",
                    literal.name,
                    quote_bytes(&literal.bytes)
                ));
            }
        }

        out.push_str("\nfunc init() {\n");
        for stmt in &self.init {
            for line in stmt.lines(&self.registry_var) {
                out.push('\t');
                out.push_str(&line);
                out.push('\n');
            }
        }
        out.push_str("}\n");

        for function in &self.functions {
            out.push('\n');
            out.push_str(&function.source);
        }
        out
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_order() {
        let unit = OutputUnit {
            package: "views".into(),
            registry_var: "reg".into(),
            imports: vec![
                ImportRecord {
                    path: "io".into(),
                    alias: "io".into(),
                    named: false,
                },
                ImportRecord {
                    path: "example.com/a/io".into(),
                    alias: "aliasio".into(),
                    named: true,
                },
            ],
            literals: vec![LiteralConst {
                name: "builtin0".into(),
                bytes: b"hi\n".to_vec(),
            }],
            init: vec![InitStatement::Register {
                name: "a".into(),
                function: "fna".into(),
            }],
            functions: vec![FunctionDecl {
                name: "fna".into(),
                source: "func fna() {\n}\n".into(),
            }],
        };
        assert_eq!(
            unit.render(),
            "package views\n\
             \n\
             //golint:ignore\n\
             \n\
             import (\n\
             \t\"io\"\n\
             \taliasio \"example.com/a/io\"\n\
             )\n\
             \n\
             var builtin0 = []byte(\"hi\\n\")\n\
             \n\
             func init() {\n\
             \treg.Add(\"a\", fna)\n\
             }\n\
             \n\
             func fna() {\n\
             }\n"
        );
    }

    #[test]
    fn no_functions_means_no_imports() {
        let unit = OutputUnit {
            package: "views".into(),
            registry_var: "reg".into(),
            imports: vec![ImportRecord {
                path: "io".into(),
                alias: "io".into(),
                named: false,
            }],
            literals: Vec::new(),
            init: Vec::new(),
            functions: Vec::new(),
        };
        assert_eq!(unit.render(), "package views\n\n//golint:ignore\n\nfunc init() {\n}\n");
    }
}
