//! tplc code generator: turns analyzed template trees into Go source.
//!
//! # Architecture
//!
//! One compile request shares a single [`Namespace`] and [`LiteralTable`]
//! across every template it converts, so that
//!
//! - import aliases are allocated once per package and never collide,
//! - function names are unique across the generated file,
//! - identical text blocks become a single `builtinN` byte constant.
//!
//! [`convert`] emits one Go function per template tree. The caller (the
//! compiler crate) assembles the functions, the constants, the import block
//! and the registry initialization into the final file.
//!
//! ## Generated function shape
//!
//! ```text
//! func fnAbc(t parse.Templater, w io.Writer, indata interface{}) error {
//!     data, _ := indata.(*model.User)
//!     ...
//!     return nil
//! }
//! ```

pub mod builtins;
pub mod convert;
pub mod error;
pub mod go_type;
pub mod literals;
pub mod namespace;
pub mod quote;
mod writer;

pub use convert::{convert, FunctionDecl, Value, DATA_IDENT, INPUT_IDENT};
pub use error::{CodegenError, CodegenResult};
pub use go_type::go_type;
pub use literals::{LiteralTable, LITERAL_PREFIX};
pub use namespace::{resolve, sanitize_ident, ImportRecord, Namespace, RuntimeImports};
pub use quote::{quote_bytes, quote_str};
