//! Form definition pipeline
//!
//! validate -> compile -> resolve names -> (materialize -> split)* ->
//! validate records -> commit
//!
//! Everything after the provisional form record is written runs under a
//! transaction guard: any failure drops the tables this attempt created and
//! removes the records it wrote.

use super::guard::TransactionGuard;
use super::layout::build_tables;
use super::probe::materialize;
use super::splitter::{SplitOutcome, TableSplitter};
use crate::config::CompilerConfig;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope, Timer};
use crate::schema::{
    compile, CompileError, CompileResult, CompiledForm, FormSource, RecordValidator,
    ResolvedSchema,
};
use crate::store::{FormRecord, Persistence, StoreError};

/// Result of defining a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedForm {
    pub schema: ResolvedSchema,
    /// Materialize attempts; zero when an identical form was already defined
    pub iterations: usize,
    /// Whether the stored definition was returned unchanged
    pub reused: bool,
}

/// Compiles forms into physical tables of a persistence backend
pub struct FormCompiler {
    config: CompilerConfig,
    metrics: MetricsRegistry,
}

impl FormCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Define `source` in `store`.
    ///
    /// Re-uploading an identical form returns the stored definition. A form
    /// with the same namespace but a different structure is rejected. An
    /// incomplete record left by an interrupted attempt is cleared first.
    pub fn define_form<S: Persistence + ?Sized>(
        &self,
        store: &mut S,
        source: &FormSource,
    ) -> CompileResult<DefinedForm> {
        source.validate()?;
        let fingerprint = source.fingerprint()?;

        let scope =
            ObservationScope::with_fields("FORM_COMPILE", &[("namespace", &source.namespace)]);
        let timer = Timer::new();

        let result = match self.existing_definition(store, &source.namespace, fingerprint) {
            Ok(Some(schema)) => Ok(DefinedForm {
                schema,
                iterations: 0,
                reused: true,
            }),
            Ok(None) => self.define_new(store, source, fingerprint),
            Err(e) => Err(e),
        };

        match &result {
            Ok(defined) => {
                let tables = defined.schema.tables.len().to_string();
                let iterations = defined.iterations.to_string();
                let duration = timer.elapsed_ms();
                scope.complete_with_fields(&[
                    ("tables", &tables),
                    ("iterations", &iterations),
                    ("reused", if defined.reused { "true" } else { "false" }),
                    ("duration_ms", &duration),
                ]);
            }
            Err(e) => scope.fail(&format!("{}: {}", e.code(), e)),
        }
        result
    }

    /// Stored definition of an identical, completed form
    fn existing_definition<S: Persistence + ?Sized>(
        &self,
        store: &mut S,
        namespace: &str,
        fingerprint: u32,
    ) -> CompileResult<Option<ResolvedSchema>> {
        let Some(record) = store.load_form(namespace)? else {
            return Ok(None);
        };

        if record.is_complete {
            if record.fingerprint != fingerprint {
                return Err(CompileError::AlreadyDefined {
                    namespace: namespace.to_string(),
                });
            }
            let schema = store.load_definition(namespace)?.ok_or_else(|| {
                CompileError::invariant(format!(
                    "form {} is complete but has no stored definition",
                    namespace
                ))
            })?;
            self.metrics.increment_forms_reused();
            log_event_with_fields(Event::FormReused, &[("namespace", namespace)]);
            return Ok(Some(schema));
        }

        log_event_with_fields(
            Event::StaleFormCleared,
            &[("namespace", namespace), ("uri", &record.uri)],
        );
        store.delete_form(namespace)?;
        match store.delete_definition(namespace) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(None)
    }

    fn define_new<S: Persistence + ?Sized>(
        &self,
        store: &mut S,
        source: &FormSource,
        fingerprint: u32,
    ) -> CompileResult<DefinedForm> {
        let mut guard = TransactionGuard::new(store, &self.metrics, source.namespace.as_str());
        let record = FormRecord::provisional(source.namespace.as_str(), fingerprint);

        match self.build(&mut guard, source, &record) {
            Ok((schema, iterations)) => {
                guard.commit(&schema, &record)?;
                Ok(DefinedForm {
                    schema,
                    iterations,
                    reused: false,
                })
            }
            Err(e) => {
                guard.rollback();
                Err(e)
            }
        }
    }

    /// Compile and materialize until every table fits
    fn build<S: Persistence + ?Sized>(
        &self,
        guard: &mut TransactionGuard<'_, S>,
        source: &FormSource,
        record: &FormRecord,
    ) -> CompileResult<(ResolvedSchema, usize)> {
        guard.put_provisional(record)?;

        let CompiledForm {
            namespace,
            root,
            mut records,
            naming,
            mut keys,
        } = compile(&source.root, &source.namespace, &self.config.compile_options())?;

        let schema_name = self.config.schema_name.as_str();
        let existing = guard.store().table_names(schema_name)?;
        let mut names = naming.resolve(&existing, self.config.name_limits());
        names.apply(&mut records)?;

        let table_count = naming.table_count().to_string();
        let record_count = records.len().to_string();
        log_event_with_fields(
            Event::NamesResolved,
            &[
                ("namespace", &namespace),
                ("tables", &table_count),
                ("records", &record_count),
            ],
        );

        let splitter = TableSplitter::new(&self.config.split_policy);
        let max_iterations = self.config.max_split_iterations;
        let mut iterations = 0;

        let tables = loop {
            iterations += 1;
            self.metrics.increment_probe_iterations();
            let iteration = iterations.to_string();
            log_event_with_fields(Event::ProbeIteration, &[("iteration", &iteration)]);

            let tables = build_tables(&records, schema_name, self.config.default_string_length)?;
            let report = materialize(&tables, guard)?;
            if report.is_converged() {
                break tables;
            }
            if iterations >= max_iterations {
                return Err(CompileError::IterationCapExceeded {
                    iterations,
                    pending: report.overflowed_names(),
                });
            }

            for table in &report.overflowed {
                match splitter.split(table, &mut records, &mut names, &mut keys)? {
                    SplitOutcome::Relocated { tables, .. } => {
                        for _ in &tables {
                            self.metrics.increment_group_relocations();
                        }
                    }
                    SplitOutcome::Phantom { .. } => self.metrics.increment_phantom_tables(),
                }
            }
        };

        RecordValidator::new(&records).validate(&tables)?;

        let schema = ResolvedSchema {
            namespace,
            schema: schema_name.to_string(),
            root,
            elements: records.into_elements(),
            tables,
        };
        Ok((schema, iterations))
    }
}
