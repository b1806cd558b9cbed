//! Placeholder allocation during the tree walk
//!
//! Placeholders are opaque tokens (`$T00001`, `$C00001`) that can never be
//! mistaken for a physical name. Each one remembers the name its caller
//! would like; the resolver turns desires into final names in one pass.

use std::collections::{BTreeMap, BTreeSet};

use super::resolver::{self, NameLimits, ResolvedNames};
use crate::schema::{CompileError, CompileResult};

/// Table and column placeholders requested by one compilation
#[derive(Debug, Clone)]
pub struct NamingSet {
    schema: String,
    tables: BTreeMap<String, String>,
    columns: BTreeMap<String, BTreeMap<String, String>>,
    next_table: u32,
    next_column: u32,
}

impl NamingSet {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tables: BTreeMap::new(),
            columns: BTreeMap::new(),
            next_table: 0,
            next_column: 0,
        }
    }

    /// Persistence schema the tables belong to
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Allocate a table placeholder whose desired name joins the non-empty
    /// `components` with `_`.
    pub fn table(&mut self, components: &[&str]) -> String {
        self.next_table += 1;
        let placeholder = format!("$T{:05}", self.next_table);
        self.tables
            .insert(placeholder.clone(), resolver::join_components(components));
        self.columns.insert(placeholder.clone(), BTreeMap::new());
        placeholder
    }

    /// Allocate a column placeholder in `table`, prefixed with the enclosing
    /// non-repeating group path.
    pub fn column(&mut self, table: &str, group_prefix: &str, name: &str) -> CompileResult<String> {
        let columns = self.columns.get_mut(table).ok_or_else(|| {
            CompileError::invariant(format!("column requested in unknown table {}", table))
        })?;
        self.next_column += 1;
        let placeholder = format!("$C{:05}", self.next_column);
        columns.insert(
            placeholder.clone(),
            resolver::join_components(&[group_prefix, name]),
        );
        Ok(placeholder)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Desired (unresolved) name of a table placeholder
    pub fn desired_table(&self, placeholder: &str) -> Option<&str> {
        self.tables.get(placeholder).map(String::as_str)
    }

    /// Resolve every placeholder to a final name.
    ///
    /// The result depends only on the placeholders allocated so far and on
    /// `existing`, the table names already present in the schema.
    pub fn resolve(&self, existing: &BTreeSet<String>, limits: NameLimits) -> ResolvedNames {
        let mut resolved = ResolvedNames::new(self.schema.clone(), limits, existing);
        for (placeholder, desired) in &self.tables {
            resolved.claim_table(placeholder, desired);
            let mut taken: BTreeSet<String> = crate::store::reserved_column_names()
                .map(str::to_string)
                .collect();
            if let Some(columns) = self.columns.get(placeholder) {
                for (column_placeholder, desired_column) in columns {
                    let name = resolver::unique_name(
                        &resolver::fit(desired_column, limits.max_column),
                        limits.max_column,
                        |candidate| taken.contains(candidate),
                    );
                    taken.insert(name.clone());
                    resolved.insert_column(placeholder, column_placeholder, name);
                }
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> NameLimits {
        NameLimits {
            max_table: 24,
            max_column: 20,
        }
    }

    #[test]
    fn test_placeholders_are_opaque() {
        let mut naming = NamingSet::new("formtables");
        let t = naming.table(&["SURVEY", "", "CORE"]);
        let c = naming.column(&t, "", "age").unwrap();
        assert!(t.starts_with("$T"));
        assert!(c.starts_with("$C"));
        assert_eq!(naming.desired_table(&t), Some("SURVEY_CORE"));
    }

    #[test]
    fn test_column_in_unknown_table_rejected() {
        let mut naming = NamingSet::new("formtables");
        assert!(naming.column("$T99999", "", "age").is_err());
    }

    #[test]
    fn test_resolve_basic_names() {
        let mut naming = NamingSet::new("formtables");
        let t = naming.table(&["survey", "CORE"]);
        let age = naming.column(&t, "", "age").unwrap();
        let town = naming.column(&t, "address", "town").unwrap();

        let resolved = naming.resolve(&BTreeSet::new(), limits());
        assert_eq!(resolved.table(&t), Some("SURVEY_CORE"));
        assert_eq!(resolved.column(&t, &age), Some("AGE"));
        assert_eq!(resolved.column(&t, &town), Some("ADDRESS_TOWN"));
    }

    #[test]
    fn test_resolve_avoids_existing_tables() {
        let mut naming = NamingSet::new("formtables");
        let t = naming.table(&["survey", "CORE"]);
        let existing: BTreeSet<String> = ["survey_core".to_string()].into_iter().collect();

        let resolved = naming.resolve(&existing, limits());
        assert_eq!(resolved.table(&t), Some("SURVEY_CORE_2"));
    }

    #[test]
    fn test_colliding_columns_uniquified() {
        let mut naming = NamingSet::new("formtables");
        let t = naming.table(&["survey", "CORE"]);
        // "a_b" directly and "b" inside group "a" both want A_B
        let first = naming.column(&t, "", "a_b").unwrap();
        let second = naming.column(&t, "a", "b").unwrap();
        let uri = naming.column(&t, "", "_uri").unwrap();

        let resolved = naming.resolve(&BTreeSet::new(), limits());
        assert_eq!(resolved.column(&t, &first), Some("A_B"));
        assert_eq!(resolved.column(&t, &second), Some("A_B_2"));
        assert_eq!(resolved.column(&t, &uri), Some("_URI_2"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let build = || {
            let mut naming = NamingSet::new("formtables");
            let t = naming.table(&["survey", "CORE"]);
            for i in 0..30 {
                naming
                    .column(&t, "a_very_long_group_prefix", &format!("question_{}", i))
                    .unwrap();
            }
            naming.resolve(&BTreeSet::new(), limits())
        };
        assert_eq!(build(), build());
    }
}
