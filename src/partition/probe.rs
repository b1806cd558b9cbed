//! Materialization Probe
//!
//! The store is the only authority on how wide a table may be, so the probe
//! simply tries: each wanted table is created, and tables the store rejects
//! as too wide are reported back for splitting. Tables created by an earlier
//! attempt are kept when their layout is unchanged and dropped otherwise.

use super::guard::TransactionGuard;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::CompileResult;
use crate::store::{Persistence, TableDescriptor};

/// Outcome of one materialize attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Tables created by this attempt
    pub created: Vec<String>,
    /// Tables left in place from an earlier attempt
    pub reused: Vec<String>,
    /// Earlier tables dropped because they are gone or changed
    pub dropped: Vec<String>,
    /// Tables the store rejected as too wide
    pub overflowed: Vec<TableDescriptor>,
}

impl ProbeReport {
    /// Whether every wanted table now exists
    pub fn is_converged(&self) -> bool {
        self.overflowed.is_empty()
    }

    pub fn overflowed_names(&self) -> Vec<String> {
        self.overflowed.iter().map(|t| t.name.clone()).collect()
    }
}

/// Bring the store in line with `tables`.
///
/// A width overflow on a dynamic table is recorded in the report; every
/// other store failure, including an overflow on a fixed-layout table, is
/// returned as an error.
pub fn materialize<S: Persistence + ?Sized>(
    tables: &[TableDescriptor],
    guard: &mut TransactionGuard<'_, S>,
) -> CompileResult<ProbeReport> {
    let mut report = ProbeReport::default();

    for name in guard.created_names() {
        let stale = match tables.iter().find(|t| t.name == name) {
            Some(table) => guard.created(&name) != Some(table),
            None => true,
        };
        if stale {
            guard.drop_table(&name)?;
            report.dropped.push(name);
        }
    }

    for table in tables {
        if guard.created(&table.name) == Some(table) {
            report.reused.push(table.name.clone());
            continue;
        }
        match guard.create_table(table) {
            Ok(()) => report.created.push(table.name.clone()),
            Err(e) if e.is_width_overflow() && table.is_splittable() => {
                guard.metrics().increment_overflows();
                let columns = table.data_column_count().to_string();
                log_event_with_fields(
                    Event::TableOverflow,
                    &[
                        ("table", &table.to_string()),
                        ("columns", &columns),
                        ("error", &e.to_string()),
                    ],
                );
                guard.discard(table);
                report.overflowed.push(table.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}
