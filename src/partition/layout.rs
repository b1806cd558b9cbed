//! Table layout from records
//!
//! A table is owned by the highest record living in it: the record whose
//! parent lives elsewhere (or which has no parent). The owner's kind decides
//! the table's role; for dynamic tables the data columns are the
//! co-resident leaves under the owner, depth-first in ordinal order.

use std::collections::BTreeSet;

use crate::schema::{CompileError, CompileResult, ElementKind, RecordSet, SchemaElement};
use crate::store::{ColumnDef, ColumnType, TableDescriptor, TableKind};

/// Describe every table the records occupy, in depth-first order of their
/// owners
pub fn build_tables(
    records: &RecordSet,
    schema: &str,
    default_string_length: u32,
) -> CompileResult<Vec<TableDescriptor>> {
    let mut builder = LayoutBuilder {
        records,
        schema,
        default_string_length,
        tables: Vec::new(),
        seen: BTreeSet::new(),
    };
    for root in records.roots() {
        builder.visit(root, None)?;
    }
    Ok(builder.tables)
}

/// Role of the table owned by `owner`
pub fn table_kind(owner: &SchemaElement) -> CompileResult<TableKind> {
    let kind = match (owner.parent.is_none(), owner.kind) {
        (true, ElementKind::Group) => TableKind::TopLevel,
        (_, ElementKind::Group)
        | (_, ElementKind::Repeat)
        | (_, ElementKind::Phantom)
        | (_, ElementKind::GeoPoint) => TableKind::Nested,
        (_, ElementKind::SelectMulti) => TableKind::Choices,
        (_, ElementKind::Binary) => TableKind::BinaryContent,
        (_, ElementKind::BinaryContentRef) => TableKind::BinaryRef,
        (_, ElementKind::BinaryBlob) => TableKind::Blob,
        (_, ElementKind::LongStringRef) => TableKind::LongStringRef,
        (_, ElementKind::LongStringText) => TableKind::LongStringText,
        (_, kind) => {
            return Err(CompileError::invariant(format!(
                "{} field {} cannot own table {}",
                kind, owner.key, owner.table_name
            )))
        }
    };
    Ok(kind)
}

/// Column definition of a leaf field
pub fn column_def(element: &SchemaElement, default_string_length: u32) -> Option<ColumnDef> {
    let name = element.column_name.as_deref()?;
    let column = match element.kind {
        ElementKind::String | ElementKind::SelectSingle => ColumnDef::new(name, ColumnType::String)
            .with_length(element.preferred_length.unwrap_or(default_string_length)),
        ElementKind::Integer => ColumnDef::new(name, ColumnType::Integer),
        ElementKind::Decimal => ColumnDef::new(name, ColumnType::Decimal),
        ElementKind::Boolean => ColumnDef::new(name, ColumnType::Boolean),
        ElementKind::Date => ColumnDef::new(name, ColumnType::Date),
        ElementKind::Time => ColumnDef::new(name, ColumnType::Time),
        ElementKind::DateTime => ColumnDef::new(name, ColumnType::DateTime),
        _ => return None,
    };
    Some(column)
}

struct LayoutBuilder<'a> {
    records: &'a RecordSet,
    schema: &'a str,
    default_string_length: u32,
    tables: Vec<TableDescriptor>,
    seen: BTreeSet<String>,
}

impl LayoutBuilder<'_> {
    fn visit(&mut self, element: &SchemaElement, parent_table: Option<&str>) -> CompileResult<()> {
        if parent_table != Some(element.table_name.as_str()) {
            self.open_table(element)?;
        }
        let records = self.records;
        for child in records.children(&element.key) {
            self.visit(child, Some(&element.table_name))?;
        }
        Ok(())
    }

    fn open_table(&mut self, owner: &SchemaElement) -> CompileResult<()> {
        if !self.seen.insert(owner.table_name.clone()) {
            return Err(CompileError::invariant(format!(
                "table {} has more than one owning record",
                owner.table_name
            )));
        }
        let kind = table_kind(owner)?;
        let columns = if kind.is_dynamic() {
            let mut columns = Vec::new();
            self.collect_columns(owner, &owner.table_name, &mut columns);
            columns
        } else {
            kind.fixed_columns()
        };
        self.tables.push(TableDescriptor {
            schema: self.schema.to_string(),
            name: owner.table_name.clone(),
            kind,
            owner: owner.key.clone(),
            columns,
        });
        Ok(())
    }

    fn collect_columns(&self, element: &SchemaElement, table: &str, out: &mut Vec<ColumnDef>) {
        if let Some(column) = column_def(element, self.default_string_length) {
            out.push(column);
        }
        for child in self.records.children(&element.key) {
            if child.is_co_resident(table) {
                self.collect_columns(child, table, out);
            }
        }
    }
}
