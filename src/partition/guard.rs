//! Transaction Guard
//!
//! Table creation cannot be undone by the store, so a form compilation keeps
//! its own ledger: every table it created, and whether it wrote the form
//! record or the definition. On failure the ledger is replayed backwards.
//!
//! A guard that is dropped without `commit` or `rollback` rolls back.

use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::schema::{CompileResult, ResolvedSchema};
use crate::store::{FormRecord, Persistence, StoreError, TableDescriptor};

/// What a rollback managed to undo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Tables dropped, in drop order
    pub dropped: Vec<String>,
    /// Tables that could not be dropped and remain in the store
    pub failed: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct TransactionGuard<'s, S: Persistence + ?Sized> {
    store: &'s mut S,
    metrics: &'s MetricsRegistry,
    namespace: String,
    /// Tables created by this compilation, in creation order
    created: Vec<TableDescriptor>,
    form_written: bool,
    definition_written: bool,
    finished: bool,
}

impl<'s, S: Persistence + ?Sized> TransactionGuard<'s, S> {
    pub fn new(store: &'s mut S, metrics: &'s MetricsRegistry, namespace: impl Into<String>) -> Self {
        Self {
            store,
            metrics,
            namespace: namespace.into(),
            created: Vec::new(),
            form_written: false,
            definition_written: false,
            finished: false,
        }
    }

    pub fn store(&self) -> &S {
        self.store
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        self.metrics
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Write the incomplete form record that marks a compilation in flight
    pub fn put_provisional(&mut self, record: &FormRecord) -> CompileResult<()> {
        self.store.put_form(record)?;
        self.form_written = true;
        Ok(())
    }

    /// Create a table and remember it for rollback
    pub fn create_table(&mut self, table: &TableDescriptor) -> Result<(), StoreError> {
        self.store.create_table(table)?;
        self.created.push(table.clone());
        self.metrics.increment_tables_created();

        let columns = table.data_column_count().to_string();
        log_event_with_fields(
            Event::TableCreated,
            &[("table", &table.to_string()), ("columns", &columns)],
        );
        Ok(())
    }

    /// Drop a table this compilation created earlier
    pub fn drop_table(&mut self, name: &str) -> CompileResult<()> {
        let Some(index) = self.created.iter().position(|t| t.name == name) else {
            return Ok(());
        };
        let table = &self.created[index];
        self.store.drop_table(&table.schema, &table.name)?;
        let table = self.created.remove(index);
        self.metrics.increment_tables_dropped();
        log_event_with_fields(Event::TableDropped, &[("table", &table.to_string())]);
        Ok(())
    }

    /// Remove any remains of a table whose creation was rejected.
    /// A table that never existed is the normal case.
    pub fn discard(&mut self, table: &TableDescriptor) {
        match self.store.drop_table(&table.schema, &table.name) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => Logger::warn(
                "TABLE_DISCARD_FAILED",
                &[("table", &table.to_string()), ("error", &e.to_string())],
            ),
        }
    }

    /// Descriptor of a table created by this compilation
    pub fn created(&self, name: &str) -> Option<&TableDescriptor> {
        self.created.iter().find(|t| t.name == name)
    }

    /// Names of the tables created so far, in creation order
    pub fn created_names(&self) -> Vec<String> {
        self.created.iter().map(|t| t.name.clone()).collect()
    }

    /// Persist the definition, then mark the form record complete. A
    /// failure of either write rolls everything back.
    pub fn commit(mut self, definition: &ResolvedSchema, record: &FormRecord) -> CompileResult<()> {
        if let Err(e) = self.store.put_definition(definition) {
            self.undo();
            return Err(e.into());
        }
        self.definition_written = true;

        if let Err(e) = self.store.put_form(&record.completed()) {
            self.undo();
            return Err(e.into());
        }
        self.form_written = true;
        self.finished = true;

        self.metrics.increment_forms_committed();
        let tables = self.created.len().to_string();
        log_event_with_fields(
            Event::FormCommitted,
            &[("namespace", &self.namespace), ("tables", &tables)],
        );
        Ok(())
    }

    /// Undo everything this compilation wrote
    pub fn rollback(mut self) -> RollbackReport {
        self.undo()
    }

    fn undo(&mut self) -> RollbackReport {
        self.finished = true;
        self.metrics.increment_rollbacks();

        let pending = self.created.len().to_string();
        log_event_with_fields(
            Event::RollbackBegin,
            &[("namespace", &self.namespace), ("tables", &pending)],
        );

        let mut report = RollbackReport::default();
        while let Some(table) = self.created.pop() {
            match self.store.drop_table(&table.schema, &table.name) {
                Ok(()) => report.dropped.push(table.name),
                Err(e) => {
                    self.metrics.increment_rollback_drop_failures();
                    log_event_with_fields(
                        Event::RollbackDropFailed,
                        &[("table", &table.to_string()), ("error", &e.to_string())],
                    );
                    report.failed.push(table.name);
                }
            }
        }

        if self.definition_written {
            if let Err(e) = self.store.delete_definition(&self.namespace) {
                Logger::error(
                    "ROLLBACK_DEFINITION_DELETE_FAILED",
                    &[("namespace", &self.namespace), ("error", &e.to_string())],
                );
            }
            self.definition_written = false;
        }

        if self.form_written {
            if let Err(e) = self.store.delete_form(&self.namespace) {
                Logger::error(
                    "ROLLBACK_FORM_DELETE_FAILED",
                    &[("namespace", &self.namespace), ("error", &e.to_string())],
                );
            }
            self.form_written = false;
        }

        let dropped = report.dropped.len().to_string();
        let failed = report.failed.len().to_string();
        log_event_with_fields(
            Event::RollbackComplete,
            &[
                ("namespace", &self.namespace),
                ("dropped", &dropped),
                ("failed", &failed),
            ],
        );
        report
    }
}

impl<S: Persistence + ?Sized> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            self.undo();
        }
    }
}
