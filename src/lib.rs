//! formtables - compile hierarchical form definitions into width-bounded
//! relational tables
//!
//! A form tree is flattened into keyed records, given collision-free table
//! and column names, and materialized in a store whose maximum table width
//! is only discovered by trying. Tables the store rejects are split until
//! every table fits; a failed attempt leaves nothing behind.

pub mod cli;
pub mod config;
pub mod naming;
pub mod observability;
pub mod partition;
pub mod schema;
pub mod store;
