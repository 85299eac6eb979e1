//! Compile request configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "out_path": "gen/templates.go",
//!   "templates": [
//!     { "templates_path": "views/*.tpl", "html": true,
//!       "data": { "*": { "kind": "nil" } } },
//!     { "name": "notafile", "content": "hello!", "data": {} }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tplc_codegen::{sanitize_ident, RuntimeImports};
use tplc_types::{DataConfiguration, FunctionLibrary};

use crate::error::{CompileError, CompileResult};

/// Default name of the consumer's registry variable.
pub const DEFAULT_REGISTRY_VAR: &str = "compiledTemplates";

fn default_registry_var() -> String {
    DEFAULT_REGISTRY_VAR.to_string()
}

/// One compile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Where the generated Go file is written.
    pub out_path: PathBuf,
    /// Package clause of the generated file; discovered from the output
    /// directory when absent.
    #[serde(default)]
    pub out_pkg: Option<String>,
    /// Package-level variable the init routine registers templates into.
    #[serde(default = "default_registry_var")]
    pub registry_var: String,
    #[serde(default)]
    pub runtime: RuntimeImports,
    #[serde(default)]
    pub templates: Vec<TemplateConfiguration>,
}

/// One group of templates sharing a dialect, data shapes and functions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateConfiguration {
    /// File glob; every match becomes one unit named after its base name.
    #[serde(default)]
    pub templates_path: Option<String>,
    /// Inline unit name, used with `content`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Markup mode: contextual escaping of every action.
    #[serde(default)]
    pub html: bool,
    #[serde(default)]
    pub data: DataConfiguration,
    #[serde(default)]
    pub funcs: FunctionLibrary,
}

/// Where a [`TemplateConfiguration`]'s units come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource<'a> {
    Glob(&'a str),
    Inline { name: &'a str, content: &'a str },
}

impl Configuration {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            out_pkg: None,
            registry_var: default_registry_var(),
            runtime: RuntimeImports::default(),
            templates: Vec::new(),
        }
    }

    pub fn with_package(mut self, name: impl Into<String>) -> Self {
        self.out_pkg = Some(name.into());
        self
    }

    pub fn with_template(mut self, template: TemplateConfiguration) -> Self {
        self.templates.push(template);
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        let conf: Configuration =
            serde_json::from_str(json).map_err(|e| CompileError::Config(e.to_string()))?;
        conf.validate()?;
        Ok(conf)
    }

    /// Read, parse and validate the JSON configuration at `path`.
    pub fn load(path: &Path) -> CompileResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.registry_var.is_empty() || sanitize_ident(&self.registry_var) != self.registry_var {
            return Err(CompileError::Config(format!(
                "registry_var {:?} is not a Go identifier",
                self.registry_var
            )));
        }
        if let Some(pkg) = &self.out_pkg {
            if pkg.is_empty() || sanitize_ident(pkg) != *pkg {
                return Err(CompileError::Config(format!(
                    "out_pkg {pkg:?} is not a Go identifier"
                )));
            }
        }
        for (i, template) in self.templates.iter().enumerate() {
            template
                .source()
                .map_err(|e| CompileError::Config(format!("templates[{i}]: {e}")))?;
        }
        Ok(())
    }
}

impl TemplateConfiguration {
    /// Units matching the file glob `pattern`.
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            templates_path: Some(pattern.into()),
            ..Default::default()
        }
    }

    /// A single inline unit.
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    pub fn data(mut self, data: DataConfiguration) -> Self {
        self.data = data;
        self
    }

    pub fn funcs(mut self, funcs: FunctionLibrary) -> Self {
        self.funcs = funcs;
        self
    }

    /// Exactly one of a glob or an inline name and content.
    pub fn source(&self) -> Result<TemplateSource<'_>, String> {
        match (&self.templates_path, &self.name, &self.content) {
            (Some(pattern), None, None) => Ok(TemplateSource::Glob(pattern)),
            (None, Some(name), Some(content)) => Ok(TemplateSource::Inline { name, content }),
            (Some(_), _, _) => Err("templates_path excludes name and content".to_string()),
            (None, _, _) => Err("either templates_path or both name and content are required".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tplc_types::Shape;

    #[test]
    fn minimal_json_uses_defaults() {
        let conf = Configuration::from_json_str(r#"{ "out_path": "gen/t.go" }"#).unwrap();
        assert_eq!(conf.registry_var, "compiledTemplates");
        assert_eq!(conf.runtime, RuntimeImports::default());
        assert!(conf.out_pkg.is_none());
        assert!(conf.templates.is_empty());
    }

    #[test]
    fn inline_template_with_shapes() {
        let conf = Configuration::from_json_str(
            r#"{
                "out_path": "t.go",
                "out_pkg": "views",
                "templates": [{
                    "name": "notafile",
                    "content": "hi",
                    "html": true,
                    "data": { "*": { "kind": "nil" }, "embed": { "kind": "basic", "name": "string" } }
                }]
            }"#,
        )
        .unwrap();
        let template = &conf.templates[0];
        assert!(template.html);
        assert_eq!(
            template.source().unwrap(),
            TemplateSource::Inline {
                name: "notafile",
                content: "hi"
            }
        );
        assert_eq!(template.data.shape_for("embed"), Shape::string());
        assert_eq!(template.data.shape_for("other"), Shape::Nil);
    }

    #[test]
    fn ambiguous_template_source_is_rejected() {
        let err = Configuration::from_json_str(
            r#"{ "out_path": "t.go", "templates": [{ "templates_path": "*.tpl", "name": "x", "content": "" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Config(msg) if msg.contains("templates[0]")));
    }

    #[test]
    fn missing_content_is_rejected() {
        let conf = Configuration::new("t.go").with_template(TemplateConfiguration {
            name: Some("x".into()),
            ..Default::default()
        });
        assert!(conf.validate().is_err());
    }

    #[test]
    fn registry_var_must_be_an_identifier() {
        let mut conf = Configuration::new("t.go");
        conf.registry_var = "my-registry".into();
        assert!(matches!(conf.validate(), Err(CompileError::Config(_))));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            Configuration::from_json_str("{"),
            Err(CompileError::Config(_))
        ));
    }
}
