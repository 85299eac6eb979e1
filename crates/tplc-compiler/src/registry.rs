//! Init routine statements wiring compiled functions into the registry.
//!
//! All registrations come first: an attachment may fetch a nested template
//! registered by another unit.

use tplc_codegen::quote_str;

/// One statement of the generated `init` routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatement {
    /// `registry.Add("name", function)`
    Register { name: String, function: String },
    /// Make `nested` the compiled implementation of the `main` entry. The
    /// entry is only replaced when `Compiled` succeeds.
    ///
    /// `seq` numbers the temporaries and is unique within one compile
    /// request.
    Attach {
        main: String,
        nested: String,
        seq: usize,
    },
}

impl InitStatement {
    /// Go statements for the registry variable `registry`, one per line,
    /// without indentation.
    pub fn lines(&self, registry: &str) -> Vec<String> {
        match self {
            InitStatement::Register { name, function } => {
                vec![format!("{registry}.Add({}, {function})", quote_str(name))]
            }
            InitStatement::Attach { main, nested, seq } => {
                let x = format!("tpl{seq}X");
                let y = format!("tpl{seq}Y");
                let attached = format!("tpl{seq}A");
                // A failed attachment leaves the registered entry in place.
                vec![
                    format!("{x} := {registry}.MustGet({})", quote_str(main)),
                    format!("{y} := {registry}.MustGet({})", quote_str(nested)),
                    format!("if {attached}, err := {x}.Compiled({y}); err == nil {{"),
                    format!("\t{registry}.Set({}, {attached})", quote_str(main)),
                    "}".to_string(),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_line() {
        let stmt = InitStatement::Register {
            name: "file.tpl".into(),
            function: "fnfileTpl".into(),
        };
        assert_eq!(stmt.lines("reg"), vec![r#"reg.Add("file.tpl", fnfileTpl)"#]);
    }

    #[test]
    fn attach_lines() {
        let stmt = InitStatement::Attach {
            main: "file.tpl".into(),
            nested: "embed".into(),
            seq: 2,
        };
        assert_eq!(
            stmt.lines("reg"),
            vec![
                r#"tpl2X := reg.MustGet("file.tpl")"#,
                r#"tpl2Y := reg.MustGet("embed")"#,
                "if tpl2A, err := tpl2X.Compiled(tpl2Y); err == nil {",
                "\treg.Set(\"file.tpl\", tpl2A)",
                "}",
            ]
        );
    }
}
