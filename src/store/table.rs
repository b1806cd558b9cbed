//! Physical table descriptors handed to the persistence backend

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ElementKey;

/// Audit columns present on every table
pub const AUDIT_COLUMNS: [&str; 5] = [
    "_URI",
    "_CREATOR_URI_USER",
    "_CREATION_DATE",
    "_LAST_UPDATE_URI_USER",
    "_LAST_UPDATE_DATE",
];

/// Columns linking a nested row to its parent and top-level submission
pub const LINKAGE_COLUMNS: [&str; 3] = ["_PARENT_AURI", "_ORDINAL_NUMBER", "_TOP_LEVEL_AURI"];

/// Columns of the top-level submission table
pub const SUBMISSION_COLUMNS: [&str; 5] = [
    "_MODEL_VERSION",
    "_UI_VERSION",
    "_IS_COMPLETE",
    "_SUBMISSION_DATE",
    "_MARKED_AS_COMPLETE_DATE",
];

/// Width of URI-valued columns
pub const URI_LENGTH: u32 = 80;

/// Every column name the layout reserves for itself
pub fn reserved_column_names() -> impl Iterator<Item = &'static str> {
    AUDIT_COLUMNS
        .iter()
        .chain(LINKAGE_COLUMNS.iter())
        .chain(SUBMISSION_COLUMNS.iter())
        .copied()
}

/// Column storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    Uri,
    Blob,
}

/// One column of a physical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_length: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }
}

/// Role of a physical table in the compiled form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// One row per submission
    TopLevel,
    /// Rows of a repeat, a phantom, or a relocated group
    Nested,
    /// Values of a multiple-choice field
    Choices,
    /// Binary attachment descriptors
    BinaryContent,
    /// Binary attachment part references
    BinaryRef,
    /// Binary attachment bytes
    Blob,
    /// Long string part references
    LongStringRef,
    /// Long string text
    LongStringText,
}

impl TableKind {
    /// Tables whose data columns come from form fields and may be split
    pub fn is_dynamic(&self) -> bool {
        matches!(self, TableKind::TopLevel | TableKind::Nested)
    }

    fn structural_columns(&self) -> Vec<ColumnDef> {
        match self {
            TableKind::TopLevel => vec![
                ColumnDef::new(SUBMISSION_COLUMNS[0], ColumnType::Integer),
                ColumnDef::new(SUBMISSION_COLUMNS[1], ColumnType::Integer),
                ColumnDef::new(SUBMISSION_COLUMNS[2], ColumnType::Boolean),
                ColumnDef::new(SUBMISSION_COLUMNS[3], ColumnType::DateTime),
                ColumnDef::new(SUBMISSION_COLUMNS[4], ColumnType::DateTime),
            ],
            _ => vec![
                ColumnDef::new(LINKAGE_COLUMNS[0], ColumnType::Uri).with_length(URI_LENGTH),
                ColumnDef::new(LINKAGE_COLUMNS[1], ColumnType::Integer),
                ColumnDef::new(LINKAGE_COLUMNS[2], ColumnType::Uri).with_length(URI_LENGTH),
            ],
        }
    }

    /// Predetermined data columns of a fixed-layout table
    pub fn fixed_columns(&self) -> Vec<ColumnDef> {
        match self {
            TableKind::TopLevel | TableKind::Nested => Vec::new(),
            TableKind::Choices => vec![ColumnDef::new("VALUE", ColumnType::String).with_length(255)],
            TableKind::BinaryContent => vec![
                ColumnDef::new("UNROOTED_FILE_PATH", ColumnType::String).with_length(4096),
                ColumnDef::new("CONTENT_TYPE", ColumnType::String).with_length(80),
                ColumnDef::new("CONTENT_LENGTH", ColumnType::Integer),
                ColumnDef::new("CONTENT_HASH", ColumnType::String).with_length(255),
            ],
            TableKind::BinaryRef | TableKind::LongStringRef => vec![
                ColumnDef::new("_DOM_AURI", ColumnType::Uri).with_length(URI_LENGTH),
                ColumnDef::new("_SUB_AURI", ColumnType::Uri).with_length(URI_LENGTH),
                ColumnDef::new("PART", ColumnType::Integer),
            ],
            TableKind::Blob => vec![ColumnDef::new("VALUE", ColumnType::Blob)],
            TableKind::LongStringText => {
                vec![ColumnDef::new("VALUE", ColumnType::String).with_length(8192)]
            }
        }
    }
}

/// A request to create one physical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    /// Record whose subtree owns the table
    pub owner: ElementKey,
    /// Data columns, in depth-first ordinal order for dynamic tables
    pub columns: Vec<ColumnDef>,
}

impl TableDescriptor {
    /// Number of data columns, excluding audit and structural columns
    pub fn data_column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table may be divided when it is too wide
    pub fn is_splittable(&self) -> bool {
        self.kind.is_dynamic()
    }

    /// Full column list: audit, structural, then data columns
    pub fn all_columns(&self) -> Vec<ColumnDef> {
        let mut columns = vec![
            ColumnDef::new(AUDIT_COLUMNS[0], ColumnType::Uri).with_length(URI_LENGTH),
            ColumnDef::new(AUDIT_COLUMNS[1], ColumnType::Uri).with_length(URI_LENGTH),
            ColumnDef::new(AUDIT_COLUMNS[2], ColumnType::DateTime),
            ColumnDef::new(AUDIT_COLUMNS[3], ColumnType::Uri).with_length(URI_LENGTH),
            ColumnDef::new(AUDIT_COLUMNS[4], ColumnType::DateTime),
        ];
        columns.extend(self.kind.structural_columns());
        columns.extend(self.columns.iter().cloned());
        columns
    }

    /// Names of the data columns in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: TableKind, columns: Vec<ColumnDef>) -> TableDescriptor {
        TableDescriptor {
            schema: "formtables".into(),
            name: "SURVEY_CORE".into(),
            kind,
            owner: ElementKey::new("elem+survey(00000001)"),
            columns,
        }
    }

    #[test]
    fn test_all_columns_start_with_audit() {
        let table = descriptor(TableKind::Nested, vec![ColumnDef::new("AGE", ColumnType::Integer)]);
        let all = table.all_columns();
        assert_eq!(all.len(), 5 + 3 + 1);
        assert_eq!(all[0].name, "_URI");
        assert_eq!(all.last().unwrap().name, "AGE");
        assert_eq!(table.data_column_count(), 1);
    }

    #[test]
    fn test_only_dynamic_tables_split() {
        assert!(descriptor(TableKind::TopLevel, vec![]).is_splittable());
        assert!(descriptor(TableKind::Nested, vec![]).is_splittable());
        assert!(!descriptor(TableKind::Blob, vec![]).is_splittable());
        assert!(!descriptor(TableKind::Choices, vec![]).is_splittable());
    }

    #[test]
    fn test_reserved_names_include_linkage() {
        let reserved: Vec<_> = reserved_column_names().collect();
        assert!(reserved.contains(&"_URI"));
        assert!(reserved.contains(&"_PARENT_AURI"));
        assert!(reserved.contains(&"_IS_COMPLETE"));
    }
}
