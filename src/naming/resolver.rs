//! Final name resolution
//!
//! Names are upper-cased, restricted to `[A-Z0-9_]`, bounded in length and
//! unique: table names within the schema (including tables already in the
//! store, compared case-insensitively), column names within their table
//! (including the reserved audit and linkage columns).

use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{CompileError, CompileResult, RecordSet};

/// Length of the `_XXXXXXXX` checksum suffix added to over-long names
const HASH_SUFFIX_LEN: usize = 9;

/// Maximum identifier lengths accepted by the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameLimits {
    pub max_table: usize,
    pub max_column: usize,
}

impl Default for NameLimits {
    fn default() -> Self {
        Self {
            max_table: 64,
            max_column: 64,
        }
    }
}

/// Join the non-empty components with `_`
pub fn join_components(components: &[&str]) -> String {
    components
        .iter()
        .filter(|c| !c.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Upper-case and replace anything outside `[A-Z0-9_]` with `_`
pub fn sanitize(desired: &str) -> String {
    let mut name: String = desired
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Sanitize `desired` and bound it to `max_len`. Over-long names keep a
/// prefix and gain a CRC32 of the full name so distinct long names stay
/// distinct.
pub fn fit(desired: &str, max_len: usize) -> String {
    let name = sanitize(desired);
    if name.len() <= max_len {
        return name;
    }
    let keep = max_len.saturating_sub(HASH_SUFFIX_LEN);
    format!("{}_{:08X}", &name[..keep], crc32fast::hash(name.as_bytes()))
}

/// `name` with a `_n` suffix, trimmed so the result fits `max_len`
fn with_suffix(name: &str, n: usize, max_len: usize) -> String {
    let suffix = format!("_{}", n);
    let keep = max_len.saturating_sub(suffix.len()).min(name.len());
    format!("{}{}", &name[..keep], suffix)
}

/// First of `base`, `base_2`, `base_3`, ... for which `taken` is false
pub fn unique_name(base: &str, max_len: usize, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = with_suffix(base, n, max_len);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Final names for every placeholder of one compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    schema: String,
    limits: NameLimits,
    tables: BTreeMap<String, String>,
    columns: BTreeMap<(String, String), String>,
    /// Upper-cased table names already in use, resolved or pre-existing
    taken: BTreeSet<String>,
}

impl ResolvedNames {
    pub(super) fn new(schema: String, limits: NameLimits, existing: &BTreeSet<String>) -> Self {
        Self {
            schema,
            limits,
            tables: BTreeMap::new(),
            columns: BTreeMap::new(),
            taken: existing.iter().map(|n| n.to_ascii_uppercase()).collect(),
        }
    }

    pub(super) fn claim_table(&mut self, placeholder: &str, desired: &str) -> String {
        let name = self.claim(&fit(desired, self.limits.max_table));
        self.tables.insert(placeholder.to_string(), name.clone());
        name
    }

    pub(super) fn insert_column(&mut self, table: &str, column: &str, name: String) {
        self.columns
            .insert((table.to_string(), column.to_string()), name);
    }

    fn claim(&mut self, base: &str) -> String {
        let taken = &self.taken;
        let name = unique_name(base, self.limits.max_table, |candidate| {
            taken.contains(&candidate.to_ascii_uppercase())
        });
        self.taken.insert(name.to_ascii_uppercase());
        name
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn limits(&self) -> NameLimits {
        self.limits
    }

    /// Final name of a table placeholder
    pub fn table(&self, placeholder: &str) -> Option<&str> {
        self.tables.get(placeholder).map(String::as_str)
    }

    /// Final name of a column placeholder within its table placeholder
    pub fn column(&self, table: &str, column: &str) -> Option<&str> {
        self.columns
            .get(&(table.to_string(), column.to_string()))
            .map(String::as_str)
    }

    /// Allocate a fresh table name derived from `base` for a table split.
    ///
    /// The name is unique against every name resolved or allocated so far
    /// and against the tables that existed before compilation.
    pub fn fresh_table_name(&mut self, base: &str) -> String {
        let stem = fit(base, self.limits.max_table);
        let taken = &self.taken;
        let mut n = 2;
        let name = loop {
            let candidate = with_suffix(&stem, n, self.limits.max_table);
            if !taken.contains(&candidate.to_ascii_uppercase()) {
                break candidate;
            }
            n += 1;
        };
        self.taken.insert(name.to_ascii_uppercase());
        name
    }

    /// Rewrite every record's placeholders to final names
    pub fn apply(&self, records: &mut RecordSet) -> CompileResult<()> {
        for element in records.iter_mut() {
            let table = self.table(&element.table_placeholder).ok_or_else(|| {
                CompileError::invariant(format!(
                    "unresolved table placeholder {} on {}",
                    element.table_placeholder, element.key
                ))
            })?;
            let column = match &element.column_placeholder {
                Some(placeholder) => Some(
                    self.column(&element.table_placeholder, placeholder)
                        .ok_or_else(|| {
                            CompileError::invariant(format!(
                                "unresolved column placeholder {} on {}",
                                placeholder, element.key
                            ))
                        })?
                        .to_string(),
                ),
                None => None,
            };
            element.table_name = table.to_string();
            element.column_name = column;
        }
        Ok(())
    }
}
