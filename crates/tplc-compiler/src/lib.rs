//! tplc compiler: compiles template sources into one Go file.
//!
//! ```text
//! JSON config → Resolver → Lexer → Parser → Analyzer → Go codegen → Init wiring → .go
//! ```
//!
//! [`compile`] builds the [`OutputUnit`] for a [`Configuration`];
//! [`compile_and_write`] also writes it to the configured path.

pub mod assembler;
pub mod checker;
pub mod config;
pub mod env;
pub mod error;
pub mod output;
pub mod package;
pub mod registry;
pub mod unit;

pub use assembler::{compile, compile_and_write};
pub use checker::{analyze, root_binding};
pub use config::{Configuration, TemplateConfiguration, TemplateSource, DEFAULT_REGISTRY_VAR};
pub use error::{CompileError, CompileResult};
pub use output::{LiteralConst, OutputUnit};
pub use package::{lookup_package_name, package_name_from_source};
pub use registry::InitStatement;
pub use unit::{discover, load_unit, provisional_name, resolve_units, WorkUnit};
