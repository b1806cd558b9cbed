//! Naming subsystem
//!
//! Two phases:
//! 1. `NamingSet` hands out opaque placeholders while the compiler walks the
//!    form tree.
//! 2. `NamingSet::resolve` turns all placeholders into bounded, unique
//!    physical names in a single pass, checked against the tables already
//!    present in the store.
//!
//! The splitter keeps using the resulting `ResolvedNames` to allocate names
//! for the tables it creates.

mod placeholder;
mod resolver;

pub use placeholder::NamingSet;
pub use resolver::{fit, sanitize, NameLimits, ResolvedNames};
