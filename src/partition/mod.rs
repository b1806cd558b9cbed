//! Table partitioning
//!
//! Turns a compiled record set into physical tables the store accepts:
//! lay tables out, try to create them, split the ones that are too wide,
//! repeat. A transaction guard undoes everything when an attempt fails.

mod guard;
mod layout;
mod pipeline;
mod probe;
mod splitter;

pub use guard::{RollbackReport, TransactionGuard};
pub use layout::{build_tables, column_def, table_kind};
pub use pipeline::{DefinedForm, FormCompiler};
pub use probe::{materialize, ProbeReport};
pub use splitter::{SplitOutcome, SplitPolicy, TableSplitter};
