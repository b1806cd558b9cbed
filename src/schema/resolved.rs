//! Final element list of a compiled form
//!
//! This is what the persistence layer records once compilation succeeds and
//! what later readers use to map a field to its table and column.

use serde::{Deserialize, Serialize};

use super::types::{ElementKey, ElementKind, SchemaElement};
use crate::store::TableDescriptor;

/// Resolved records plus the tables they were materialized into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    pub namespace: String,
    /// Persistence schema holding the tables
    pub schema: String,
    pub root: ElementKey,
    pub elements: Vec<SchemaElement>,
    pub tables: Vec<TableDescriptor>,
}

impl ResolvedSchema {
    pub fn element(&self, key: &ElementKey) -> Option<&SchemaElement> {
        self.elements.iter().find(|e| &e.key == key)
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Children of `key` in ordinal order
    pub fn children(&self, key: &ElementKey) -> Vec<&SchemaElement> {
        let mut children: Vec<_> = self
            .elements
            .iter()
            .filter(|e| e.parent.as_ref() == Some(key))
            .collect();
        children.sort_by_key(|e| e.ordinal);
        children
    }

    /// Table and column holding the value of a leaf field
    pub fn column_of(&self, key: &ElementKey) -> Option<(&str, &str)> {
        let element = self.element(key)?;
        let column = element.column_name.as_deref()?;
        Some((element.table_name.as_str(), column))
    }

    /// Column-bearing leaves of the subtree rooted at `key`, depth-first in
    /// ordinal order, regardless of which table they ended up in
    pub fn leaf_order(&self, key: &ElementKey) -> Vec<&SchemaElement> {
        let mut leaves = Vec::new();
        self.collect_leaves(key, false, &mut leaves);
        leaves
    }

    /// Column names of `table` followed by those of the phantom tables split
    /// off it, in the order a reader reassembles them
    pub fn reassembled_columns(&self, table: &str) -> Vec<&str> {
        let Some(descriptor) = self.table(table) else {
            return Vec::new();
        };
        let mut leaves = Vec::new();
        self.collect_leaves(&descriptor.owner, true, &mut leaves);
        leaves
            .into_iter()
            .filter_map(|e| e.column_name.as_deref())
            .collect()
    }

    /// With `phantoms_only`, descend only into co-resident children and
    /// phantom records.
    fn collect_leaves<'a>(
        &'a self,
        key: &ElementKey,
        phantoms_only: bool,
        out: &mut Vec<&'a SchemaElement>,
    ) {
        let Some(element) = self.element(key) else {
            return;
        };
        if element.has_column() {
            out.push(element);
        }
        for child in self.children(key) {
            if !phantoms_only
                || child.is_co_resident(&element.table_name)
                || child.kind == ElementKind::Phantom
            {
                self.collect_leaves(&child.key, phantoms_only, out);
            }
        }
    }

    /// Number of phantom records introduced by splitting
    pub fn phantom_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::Phantom)
            .count()
    }

    /// Total data columns across all tables whose columns come from fields
    pub fn dynamic_column_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| t.kind.is_dynamic())
            .map(|t| t.data_column_count())
            .sum()
    }
}
