//! In-memory catalog shared by the memory and file backends

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use super::table::TableDescriptor;
use super::FormRecord;
use crate::schema::ResolvedSchema;

/// A created table and when it was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTable {
    pub descriptor: TableDescriptor,
    pub created_at: DateTime<Utc>,
}

/// Tables, form records and definitions of one backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Keyed by `SCHEMA.NAME`, upper-cased
    tables: BTreeMap<String, StoredTable>,
    forms: BTreeMap<String, FormRecord>,
    definitions: BTreeMap<String, ResolvedSchema>,
}

fn table_key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name).to_ascii_uppercase()
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self, schema: &str) -> BTreeSet<String> {
        self.tables
            .values()
            .filter(|t| t.descriptor.schema.eq_ignore_ascii_case(schema))
            .map(|t| t.descriptor.name.clone())
            .collect()
    }

    /// Create a table, rejecting it when its data columns exceed `column_budget`
    pub fn create_table(
        &mut self,
        table: &TableDescriptor,
        column_budget: Option<usize>,
    ) -> StoreResult<()> {
        let key = table_key(&table.schema, &table.name);
        if self.tables.contains_key(&key) {
            return Err(StoreError::AlreadyExists(table.to_string()));
        }
        if let Some(limit) = column_budget {
            if table.data_column_count() > limit {
                return Err(StoreError::WidthOverflow {
                    table: table.to_string(),
                    columns: table.data_column_count(),
                    limit,
                });
            }
        }
        self.tables.insert(
            key,
            StoredTable {
                descriptor: table.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn drop_table(&mut self, schema: &str, name: &str) -> StoreResult<()> {
        self.tables
            .remove(&table_key(schema, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{}.{}", schema, name)))
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&StoredTable> {
        self.tables.get(&table_key(schema, name))
    }

    pub fn tables(&self) -> impl Iterator<Item = &StoredTable> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn put_form(&mut self, record: &FormRecord) {
        self.forms.insert(record.namespace.clone(), record.clone());
    }

    pub fn form(&self, namespace: &str) -> Option<&FormRecord> {
        self.forms.get(namespace)
    }

    pub fn delete_form(&mut self, namespace: &str) -> StoreResult<()> {
        self.forms
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("form {}", namespace)))
    }

    pub fn put_definition(&mut self, definition: &ResolvedSchema) {
        self.definitions
            .insert(definition.namespace.clone(), definition.clone());
    }

    pub fn definition(&self, namespace: &str) -> Option<&ResolvedSchema> {
        self.definitions.get(namespace)
    }

    pub fn delete_definition(&mut self, namespace: &str) -> StoreResult<()> {
        self.definitions
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("definition {}", namespace)))
    }
}
