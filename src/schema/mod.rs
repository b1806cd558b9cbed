//! Form schema subsystem
//!
//! Turns a hierarchical form tree into a flat, keyed record set whose
//! records know their parent, their position among siblings, and the table
//! and column that will hold their data.
//!
//! # Design Principles
//!
//! - One depth-first walk, deterministic for a given tree
//! - Records live in an arena keyed by element key; parents are keys, not
//!   pointers
//! - Physical names are chosen later, in one pass, by the naming resolver
//! - Input errors are reported before any table is touched

mod compiler;
mod errors;
mod loader;
mod records;
mod resolved;
mod source;
mod types;
mod validator;

pub use compiler::{compile, CompileOptions, CompiledForm};
pub use errors::{CompileError, CompileErrorCode, CompileResult, Severity};
pub use loader::FormLoader;
pub use records::RecordSet;
pub use resolved::ResolvedSchema;
pub use source::{FormSource, SourceElement, SourceKind};
pub use types::{AuxKind, ElementKey, ElementKind, KeyGenerator, SchemaElement};
pub use validator::RecordValidator;
