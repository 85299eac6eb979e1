//! Compilation-unit assembler.
//!
//! ```text
//! Configuration → Resolver → Loader → Code Generation → Init Emitter → OutputUnit
//! ```
//!
//! One [`Namespace`] and one [`LiteralTable`] live for the whole request and
//! are threaded through every template's conversion: that is what keeps
//! identifiers and imports unique and literal constants shared across files.
//! Configurations are processed in order, units in sorted path order and
//! templates in sorted name order, so identical input always yields
//! identical output.

use tplc_codegen::{convert, FunctionDecl, LiteralTable, Namespace};

use crate::config::{Configuration, TemplateConfiguration};
use crate::error::{CompileError, CompileResult};
use crate::output::{LiteralConst, OutputUnit};
use crate::package::lookup_package_name;
use crate::registry::InitStatement;
use crate::unit::{resolve_units, WorkUnit};

/// Compile every template of `conf` into one Go file.
pub fn compile(conf: &Configuration) -> CompileResult<OutputUnit> {
    conf.validate()?;
    let package = match &conf.out_pkg {
        Some(name) => name.clone(),
        None => lookup_package_name(&conf.out_path)?,
    };

    let mut groups: Vec<(&TemplateConfiguration, Vec<WorkUnit>)> = Vec::new();
    for template in &conf.templates {
        groups.push((template, resolve_units(template)?));
    }

    let mut assembler = Assembler::new(conf);
    for (template, units) in &mut groups {
        for unit in units.iter_mut() {
            assembler.generate(*template, unit)?;
        }
    }
    for (_, units) in &groups {
        for unit in units {
            assembler.attach(unit);
        }
    }

    let output = assembler.finish(package);
    log::info!(
        "compiled {} template(s) into package {} ({} import(s), {} literal(s))",
        output.functions.len(),
        output.package,
        output.imports.len(),
        output.literals.len()
    );
    Ok(output)
}

/// [`compile`], then write the rendered file to `conf.out_path`.
pub fn compile_and_write(conf: &Configuration) -> CompileResult<OutputUnit> {
    let output = compile(conf)?;
    std::fs::write(&conf.out_path, output.render()).map_err(|source| CompileError::Write {
        path: conf.out_path.clone(),
        source,
    })?;
    log::info!("wrote {}", conf.out_path.display());
    Ok(output)
}

// ══════════════════════════════════════════════════════════════════════════════
// Assembler
// ══════════════════════════════════════════════════════════════════════════════

/// Shared state of one compile request.
struct Assembler<'a> {
    conf: &'a Configuration,
    ns: Namespace,
    literals: LiteralTable,
    registrations: Vec<InitStatement>,
    attachments: Vec<InitStatement>,
    functions: Vec<FunctionDecl>,
}

impl<'a> Assembler<'a> {
    fn new(conf: &'a Configuration) -> Self {
        Self {
            conf,
            ns: Namespace::new(&conf.registry_var, conf.runtime.clone()),
            literals: LiteralTable::new(),
            registrations: Vec::new(),
            attachments: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Allocate a function for every template of `unit` and convert it.
    /// The allocated names replace the unit's provisional ones.
    fn generate(
        &mut self,
        template: &TemplateConfiguration,
        unit: &mut WorkUnit,
    ) -> CompileResult<()> {
        for (name, tree) in &unit.trees {
            let provisional = unit.functions.get(name).cloned().unwrap_or_default();
            let function = self.ns.allocate_function_name(&provisional);
            log::debug!("{}: template {name:?} → {function}", unit.name);

            let shape = unit.shapes.get(name).cloned().unwrap_or_default();
            let scope = unit.scopes.get(name).cloned().unwrap_or_default();
            let decl = convert(
                &function,
                tree,
                &template.funcs,
                &shape,
                &scope,
                &mut self.ns,
                &mut self.literals,
            )
            .map_err(|source| CompileError::Conversion {
                unit: unit.name.clone(),
                template: name.clone(),
                source,
            })?;

            self.registrations.push(InitStatement::Register {
                name: name.clone(),
                function: function.clone(),
            });
            self.functions.push(decl);
            unit.functions.insert(name.clone(), function);
        }
        Ok(())
    }

    /// Attach every defined template of `unit` to its main entry.
    fn attach(&mut self, unit: &WorkUnit) {
        if !unit.has_main() {
            return;
        }
        for nested in &unit.defined {
            let seq = self.attachments.len();
            log::debug!("attaching {nested:?} to {:?}", unit.name);
            self.attachments.push(InitStatement::Attach {
                main: unit.name.clone(),
                nested: nested.clone(),
                seq,
            });
        }
    }

    fn finish(self, package: String) -> OutputUnit {
        let literals = self
            .literals
            .constants()
            .map(|(name, bytes)| LiteralConst {
                name: name.to_string(),
                bytes: bytes.to_vec(),
            })
            .collect();
        let mut init = self.registrations;
        init.extend(self.attachments);
        OutputUnit {
            package,
            registry_var: self.conf.registry_var.clone(),
            imports: self.ns.imports().to_vec(),
            literals,
            init,
            functions: self.functions,
        }
    }
}
