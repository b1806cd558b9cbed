//! Observable events of a form compilation
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Setup
    /// Configuration loaded
    ConfigLoaded,
    /// Empty catalog written
    CatalogInitialized,
    /// Form file parsed and validated
    FormLoaded,

    // Compilation
    /// Identical form already defined; stored schema returned
    FormReused,
    /// Stale incomplete record of an earlier attempt removed
    StaleFormCleared,
    /// Placeholders resolved to final names
    NamesResolved,

    // Materialization
    /// One materialize attempt begins
    ProbeIteration,
    /// Table created in the store
    TableCreated,
    /// Store rejected a table as too wide
    TableOverflow,
    /// Table dropped because its layout changed
    TableDropped,

    // Splitting
    /// Group subtree moved to a new table
    GroupRelocated,
    /// Phantom record and table introduced
    PhantomCreated,

    // Outcome
    /// Rollback of created tables begins
    RollbackBegin,
    /// A table could not be dropped during rollback
    RollbackDropFailed,
    /// Rollback finished
    RollbackComplete,
    /// Definition and form record committed
    FormCommitted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogInitialized => "CATALOG_INITIALIZED",
            Event::FormLoaded => "FORM_LOADED",

            Event::FormReused => "FORM_REUSED",
            Event::StaleFormCleared => "STALE_FORM_CLEARED",
            Event::NamesResolved => "NAMES_RESOLVED",

            Event::ProbeIteration => "PROBE_ITERATION",
            Event::TableCreated => "TABLE_CREATED",
            Event::TableOverflow => "TABLE_OVERFLOW",
            Event::TableDropped => "TABLE_DROPPED",

            Event::GroupRelocated => "GROUP_RELOCATED",
            Event::PhantomCreated => "PHANTOM_CREATED",

            Event::RollbackBegin => "ROLLBACK_BEGIN",
            Event::RollbackDropFailed => "ROLLBACK_DROP_FAILED",
            Event::RollbackComplete => "ROLLBACK_COMPLETE",
            Event::FormCommitted => "FORM_COMMITTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ProbeIteration => Severity::Trace,
            Event::TableOverflow | Event::StaleFormCleared | Event::RollbackBegin => {
                Severity::Warn
            }
            Event::RollbackDropFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
