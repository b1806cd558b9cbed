//! Record-set validation before commit
//!
//! Checked rules:
//! - Every parent reference resolves and no parent chain loops
//! - Sibling ordinals are unique and contiguous from 1
//! - Records carrying a column have no children
//! - Column names are unique within a table
//! - Every table has exactly one owning record and every record's table is
//!   described
//! - A GEOPOINT has exactly its four decimal parts
//!
//! The validator never mutates the records. Any violation is an internal
//! fault of the compiler or splitter, never a caller error.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::errors::{CompileError, CompileResult};
use super::records::RecordSet;
use super::types::{ElementKey, ElementKind};
use crate::store::TableDescriptor;

/// Validates the final record set against the tables built from it
pub struct RecordValidator<'a> {
    records: &'a RecordSet,
}

impl<'a> RecordValidator<'a> {
    pub fn new(records: &'a RecordSet) -> Self {
        Self { records }
    }

    /// Run every check, stopping at the first violation
    pub fn validate(&self, tables: &[TableDescriptor]) -> CompileResult<()> {
        self.validate_parents()?;
        self.validate_ordinals()?;
        self.validate_leaves()?;
        self.validate_columns()?;
        self.validate_tables(tables)?;
        self.validate_geopoints()
    }

    fn validate_parents(&self) -> CompileResult<()> {
        for element in self.records.iter() {
            let mut seen: HashSet<&ElementKey> = HashSet::new();
            let mut current = element;
            while let Some(parent_key) = &current.parent {
                if !seen.insert(&current.key) {
                    return Err(CompileError::invariant(format!(
                        "parent chain of {} loops",
                        element.key
                    )));
                }
                current = self.records.get(parent_key).ok_or_else(|| {
                    CompileError::invariant(format!(
                        "{} references missing parent {}",
                        current.key, parent_key
                    ))
                })?;
            }
        }
        Ok(())
    }

    fn validate_ordinals(&self) -> CompileResult<()> {
        let mut siblings: BTreeMap<Option<&ElementKey>, Vec<u32>> = BTreeMap::new();
        for element in self.records.iter() {
            siblings
                .entry(element.parent.as_ref())
                .or_default()
                .push(element.ordinal);
        }
        for (parent, mut ordinals) in siblings {
            ordinals.sort_unstable();
            let expected: Vec<u32> = (1..=ordinals.len() as u32).collect();
            if ordinals != expected {
                let owner = parent.map_or_else(|| "<root>".to_string(), |p| p.to_string());
                return Err(CompileError::invariant(format!(
                    "children of {} have ordinals {:?}, expected 1..={}",
                    owner,
                    ordinals,
                    expected.len()
                )));
            }
        }
        Ok(())
    }

    fn validate_leaves(&self) -> CompileResult<()> {
        let parents: BTreeSet<&ElementKey> =
            self.records.iter().filter_map(|e| e.parent.as_ref()).collect();
        for element in self.records.iter() {
            if element.has_column() && parents.contains(&element.key) {
                return Err(CompileError::invariant(format!(
                    "{} carries column {:?} but has children",
                    element.key, element.column_name
                )));
            }
        }
        Ok(())
    }

    fn validate_columns(&self) -> CompileResult<()> {
        let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
        for element in self.records.iter() {
            if let Some(column) = element.column_name.as_deref() {
                if !seen.insert((element.table_name.as_str(), column)) {
                    return Err(CompileError::invariant(format!(
                        "column {}.{} is used twice",
                        element.table_name, column
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_tables(&self, tables: &[TableDescriptor]) -> CompileResult<()> {
        let mut described: BTreeSet<&str> = BTreeSet::new();
        for table in tables {
            if !described.insert(table.name.as_str()) {
                return Err(CompileError::invariant(format!(
                    "table {} is described twice",
                    table.name
                )));
            }
        }

        let mut owners: BTreeMap<&str, &ElementKey> = BTreeMap::new();
        for element in self.records.iter() {
            let table = element.table_name.as_str();
            if !described.contains(table) {
                return Err(CompileError::invariant(format!(
                    "{} lives in undescribed table {}",
                    element.key, table
                )));
            }
            let owns = match self.records.parent_of(&element.key) {
                Some(parent) => !parent.is_co_resident(table),
                None => true,
            };
            if owns {
                if let Some(other) = owners.insert(table, &element.key) {
                    return Err(CompileError::invariant(format!(
                        "table {} is owned by both {} and {}",
                        table, other, element.key
                    )));
                }
            }
        }

        if let Some(orphan) = described.iter().find(|t| !owners.contains_key(*t)) {
            return Err(CompileError::invariant(format!(
                "table {} has no owning record",
                orphan
            )));
        }
        Ok(())
    }

    fn validate_geopoints(&self) -> CompileResult<()> {
        for point in self.records.iter().filter(|e| e.kind == ElementKind::GeoPoint) {
            let parts = self.records.children(&point.key);
            if parts.len() != 4 || parts.iter().any(|p| p.kind != ElementKind::Decimal) {
                return Err(CompileError::invariant(format!(
                    "geopoint {} must have exactly four decimal parts",
                    point.key
                )));
            }
        }
        Ok(())
    }
}
