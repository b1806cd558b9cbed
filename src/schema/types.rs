//! Compiled schema element definitions
//!
//! A `SchemaElement` is one node of the compiled form tree. Records refer to
//! each other by `ElementKey`; the owning `RecordSet` holds every node.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element kinds produced by the compiler and the table splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    Group,
    Repeat,
    Phantom,
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Time,
    #[serde(rename = "DATETIME")]
    DateTime,
    #[serde(rename = "GEOPOINT")]
    GeoPoint,
    Binary,
    BinaryContentRef,
    BinaryBlob,
    SelectSingle,
    SelectMulti,
    LongStringRef,
    LongStringText,
}

impl ElementKind {
    /// Returns the kind name for logs and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Group => "GROUP",
            ElementKind::Repeat => "REPEAT",
            ElementKind::Phantom => "PHANTOM",
            ElementKind::String => "STRING",
            ElementKind::Integer => "INTEGER",
            ElementKind::Decimal => "DECIMAL",
            ElementKind::Boolean => "BOOLEAN",
            ElementKind::Date => "DATE",
            ElementKind::Time => "TIME",
            ElementKind::DateTime => "DATETIME",
            ElementKind::GeoPoint => "GEOPOINT",
            ElementKind::Binary => "BINARY",
            ElementKind::BinaryContentRef => "BINARY_CONTENT_REF",
            ElementKind::BinaryBlob => "BINARY_BLOB",
            ElementKind::SelectSingle => "SELECT_SINGLE",
            ElementKind::SelectMulti => "SELECT_MULTI",
            ElementKind::LongStringRef => "LONG_STRING_REF",
            ElementKind::LongStringText => "LONG_STRING_TEXT",
        }
    }

    /// Kinds that map to exactly one column in their table
    pub fn is_column(&self) -> bool {
        matches!(
            self,
            ElementKind::String
                | ElementKind::Integer
                | ElementKind::Decimal
                | ElementKind::Boolean
                | ElementKind::Date
                | ElementKind::Time
                | ElementKind::DateTime
                | ElementKind::SelectSingle
        )
    }

    /// Kinds whose rows live in a table with a predetermined column layout.
    ///
    /// These tables are never split.
    pub fn owns_fixed_table(&self) -> bool {
        matches!(
            self,
            ElementKind::Binary
                | ElementKind::BinaryContentRef
                | ElementKind::BinaryBlob
                | ElementKind::SelectMulti
                | ElementKind::LongStringRef
                | ElementKind::LongStringText
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Discriminator for records synthesized from one logical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    None,
    BinaryContentRef,
    RefBlob,
    GeoLatitude,
    GeoLongitude,
    GeoAltitude,
    GeoAccuracy,
    LongStringRef,
    RefText,
}

impl AuxKind {
    /// Key suffix for this auxiliary record, `None` for the logical field itself
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            AuxKind::None => None,
            AuxKind::BinaryContentRef => Some("bc_ref"),
            AuxKind::RefBlob => Some("ref_blob"),
            AuxKind::GeoLatitude => Some("geo_lat"),
            AuxKind::GeoLongitude => Some("geo_lng"),
            AuxKind::GeoAltitude => Some("geo_alt"),
            AuxKind::GeoAccuracy => Some("geo_acc"),
            AuxKind::LongStringRef => Some("long_string_ref"),
            AuxKind::RefText => Some("ref_text"),
        }
    }
}

/// Deterministic, globally unique record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementKey(String);

impl ElementKey {
    pub fn new(key: impl Into<String>) -> Self {
        ElementKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues element keys for one form.
///
/// The element counter advances once per logical field; auxiliary records
/// reuse the current counter value and differ only by their suffix. Phantom
/// keys carry their own counter so they never clash with compiled keys.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    namespace: String,
    element_count: u32,
    phantom_count: u32,
}

impl KeyGenerator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            element_count: 0,
            phantom_count: 0,
        }
    }

    /// Issue a key for a record
    pub fn issue(&mut self, aux: AuxKind) -> ElementKey {
        match aux.suffix() {
            None => {
                self.element_count += 1;
                ElementKey(format!("elem+{}({:08})", self.namespace, self.element_count))
            }
            Some(suffix) => ElementKey(format!(
                "elem+{}({:08}-{})",
                self.namespace, self.element_count, suffix
            )),
        }
    }

    /// Advance the element counter without issuing a key
    pub fn skip(&mut self) {
        self.element_count += 1;
    }

    /// Issue a key for a splitter-synthesized phantom record
    pub fn phantom(&mut self) -> ElementKey {
        self.phantom_count += 1;
        ElementKey(format!(
            "elem+{}({:08}-phantom:{:08})",
            self.namespace, self.element_count, self.phantom_count
        ))
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn phantom_count(&self) -> u32 {
        self.phantom_count
    }
}

/// One compiled schema record
///
/// `table_name` / `column_name` hold placeholders until names are resolved,
/// then the final physical names. The splitter may rewrite `table_name`,
/// `parent` and `ordinal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaElement {
    pub key: ElementKey,
    /// 1-based position among the parent's children
    pub ordinal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: ElementKind,
    pub table_placeholder: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_length: Option<u32>,
}

impl SchemaElement {
    /// Create a structural record (no column) in `table`
    pub fn structural(
        key: ElementKey,
        parent: Option<ElementKey>,
        ordinal: u32,
        name: Option<String>,
        kind: ElementKind,
        table: impl Into<String>,
    ) -> Self {
        let table = table.into();
        Self {
            key,
            ordinal,
            parent,
            name,
            kind,
            table_placeholder: table.clone(),
            table_name: table,
            column_placeholder: None,
            column_name: None,
            preferred_length: None,
        }
    }

    /// Create a leaf record occupying `column` in `table`
    pub fn leaf(
        key: ElementKey,
        parent: Option<ElementKey>,
        ordinal: u32,
        name: impl Into<String>,
        kind: ElementKind,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let column = column.into();
        let mut element = Self::structural(key, parent, ordinal, Some(name.into()), kind, table);
        element.column_placeholder = Some(column.clone());
        element.column_name = Some(column);
        element
    }

    /// Whether this record is a leaf holding a column value
    pub fn has_column(&self) -> bool {
        self.column_name.is_some()
    }

    /// Whether this record's row data lives in `table`
    pub fn is_co_resident(&self, table: &str) -> bool {
        self.table_name == table
    }
}
