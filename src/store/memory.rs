//! In-memory persistence backend with failure injection

use std::collections::{BTreeMap, BTreeSet};

use super::catalog::{Catalog, StoredTable};
use super::errors::{StoreError, StoreResult};
use super::table::TableDescriptor;
use super::{FormRecord, Persistence};
use crate::schema::ResolvedSchema;

/// Failures to inject into an otherwise healthy store
#[derive(Debug, Default)]
struct Faults {
    /// Every dynamic table overflows regardless of width
    always_overflow: bool,
    create: BTreeMap<String, StoreError>,
    drop: BTreeSet<String>,
    definition: Option<StoreError>,
}

/// In-memory store, optionally enforcing a data column budget per table
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Catalog,
    column_budget: Option<usize>,
    faults: Faults,
    create_attempts: usize,
}

impl MemoryStore {
    /// An unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store rejecting tables with more than `limit` data columns
    pub fn with_column_budget(limit: usize) -> Self {
        Self {
            column_budget: Some(limit),
            ..Self::default()
        }
    }

    /// Make every dynamic table creation fail with a width overflow
    pub fn always_overflow(mut self) -> Self {
        self.faults.always_overflow = true;
        self
    }

    /// Fail the creation of `table` with `error`
    pub fn fail_create(mut self, table: impl Into<String>, error: StoreError) -> Self {
        self.faults
            .create
            .insert(table.into().to_ascii_uppercase(), error);
        self
    }

    /// Fail any drop of `table`
    pub fn fail_drop(mut self, table: impl Into<String>) -> Self {
        self.faults.drop.insert(table.into().to_ascii_uppercase());
        self
    }

    /// Fail the final definition write with `error`
    pub fn fail_definition_write(mut self, error: StoreError) -> Self {
        self.faults.definition = Some(error);
        self
    }

    /// Seed a table as if another form had created it
    pub fn seed_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        self.catalog.create_table(table, None)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&StoredTable> {
        self.catalog.table(schema, name)
    }

    pub fn table_count(&self) -> usize {
        self.catalog.table_count()
    }

    /// Number of `create_table` calls seen, successful or not
    pub fn create_attempts(&self) -> usize {
        self.create_attempts
    }
}

impl Persistence for MemoryStore {
    fn table_names(&self, schema: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self.catalog.table_names(schema))
    }

    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        self.create_attempts += 1;
        if let Some(error) = self.faults.create.get(&table.name.to_ascii_uppercase()) {
            return Err(error.clone());
        }
        if self.faults.always_overflow && table.kind.is_dynamic() {
            return Err(StoreError::WidthOverflow {
                table: table.to_string(),
                columns: table.data_column_count(),
                limit: 0,
            });
        }
        self.catalog.create_table(table, self.column_budget)
    }

    fn drop_table(&mut self, schema: &str, name: &str) -> StoreResult<()> {
        if self.faults.drop.contains(&name.to_ascii_uppercase()) {
            return Err(StoreError::Unavailable(format!("drop of {}.{} refused", schema, name)));
        }
        self.catalog.drop_table(schema, name)
    }

    fn put_form(&mut self, record: &FormRecord) -> StoreResult<()> {
        self.catalog.put_form(record);
        Ok(())
    }

    fn load_form(&self, namespace: &str) -> StoreResult<Option<FormRecord>> {
        Ok(self.catalog.form(namespace).cloned())
    }

    fn delete_form(&mut self, namespace: &str) -> StoreResult<()> {
        self.catalog.delete_form(namespace)
    }

    fn put_definition(&mut self, definition: &ResolvedSchema) -> StoreResult<()> {
        if let Some(error) = &self.faults.definition {
            return Err(error.clone());
        }
        self.catalog.put_definition(definition);
        Ok(())
    }

    fn load_definition(&self, namespace: &str) -> StoreResult<Option<ResolvedSchema>> {
        Ok(self.catalog.definition(namespace).cloned())
    }

    fn delete_definition(&mut self, namespace: &str) -> StoreResult<()> {
        self.catalog.delete_definition(namespace)
    }
}
