//! Persistence collaborator
//!
//! The compiler only needs a narrow slice of a storage engine: list the
//! tables of a schema, create and drop tables, and keep a bookkeeping record
//! plus the final element list per form. Query languages and row storage are
//! somebody else's problem.
//!
//! Backends must report a too-wide table as `StoreError::WidthOverflow` and
//! anything else as one of the other variants; the compiler splits tables
//! only on the former.

mod catalog;
mod errors;
mod file;
mod memory;
mod table;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::ResolvedSchema;

pub use catalog::{Catalog, StoredTable};
pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use table::{
    reserved_column_names, ColumnDef, ColumnType, TableDescriptor, TableKind, AUDIT_COLUMNS,
    LINKAGE_COLUMNS, SUBMISSION_COLUMNS,
};

/// Top-level bookkeeping record for one form upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    pub uri: String,
    pub namespace: String,
    pub fingerprint: u32,
    pub created_at: DateTime<Utc>,
    pub is_complete: bool,
}

impl FormRecord {
    /// A new, incomplete record written before compilation starts
    pub fn provisional(namespace: impl Into<String>, fingerprint: u32) -> Self {
        Self {
            uri: format!("uuid:{}", Uuid::new_v4()),
            namespace: namespace.into(),
            fingerprint,
            created_at: Utc::now(),
            is_complete: false,
        }
    }

    /// The same record marked complete
    pub fn completed(&self) -> Self {
        Self {
            is_complete: true,
            ..self.clone()
        }
    }
}

/// Operations the compiler needs from a storage backend
pub trait Persistence {
    /// Names of the tables that currently exist in `schema`
    fn table_names(&self, schema: &str) -> StoreResult<BTreeSet<String>>;

    /// Create a physical table
    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()>;

    /// Drop a physical table
    fn drop_table(&mut self, schema: &str, name: &str) -> StoreResult<()>;

    /// Insert or replace the bookkeeping record of a form
    fn put_form(&mut self, record: &FormRecord) -> StoreResult<()>;

    fn load_form(&self, namespace: &str) -> StoreResult<Option<FormRecord>>;

    fn delete_form(&mut self, namespace: &str) -> StoreResult<()>;

    /// Record the final element list of a form
    fn put_definition(&mut self, definition: &ResolvedSchema) -> StoreResult<()>;

    fn load_definition(&self, namespace: &str) -> StoreResult<Option<ResolvedSchema>>;

    fn delete_definition(&mut self, namespace: &str) -> StoreResult<()>;
}
