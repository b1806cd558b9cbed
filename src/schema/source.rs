//! Input form tree
//!
//! The tree is produced by an external form parser; this module only
//! defines its shape, checks identifiers and computes a fingerprint used to
//! recognise re-uploads of an identical form.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{CompileError, CompileResult};

/// Data type declared by the form source for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Group,
    Repeat,
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Time,
    #[serde(alias = "date_time")]
    Datetime,
    Geopoint,
    Binary,
    SelectSingle,
    SelectMulti,
    Barcode,
    Unsupported,
}

/// One node of the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceElement {
    pub name: String,
    /// Absent for nodes the source left untyped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SourceElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_length: Option<u32>,
}

impl SourceElement {
    /// Untyped node with children (a non-repeating group)
    pub fn group(name: impl Into<String>, children: Vec<SourceElement>) -> Self {
        Self {
            name: name.into(),
            kind: Some(SourceKind::Group),
            repeatable: false,
            children,
            preferred_length: None,
        }
    }

    /// Repeating group
    pub fn repeat(name: impl Into<String>, children: Vec<SourceElement>) -> Self {
        Self {
            name: name.into(),
            kind: Some(SourceKind::Repeat),
            repeatable: true,
            children,
            preferred_length: None,
        }
    }

    /// Typed leaf field
    pub fn field(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            repeatable: false,
            children: Vec::new(),
            preferred_length: None,
        }
    }

    /// Set the preferred string length hint
    pub fn with_length(mut self, length: u32) -> Self {
        self.preferred_length = Some(length);
        self
    }

    /// Number of leaf columns this subtree expands to
    pub fn leaf_column_count(&self) -> usize {
        match self.kind {
            Some(SourceKind::Geopoint) => 4,
            Some(SourceKind::Binary) | Some(SourceKind::SelectMulti) => 0,
            Some(SourceKind::Group) | Some(SourceKind::Repeat) | None => {
                self.children.iter().map(|c| c.leaf_column_count()).sum()
            }
            Some(_) => 1,
        }
    }
}

/// A complete upload: namespace plus root element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSource {
    pub namespace: String,
    pub root: SourceElement,
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("identifier pattern is valid")
    })
}

impl FormSource {
    pub fn new(namespace: impl Into<String>, root: SourceElement) -> Self {
        Self {
            namespace: namespace.into(),
            root,
        }
    }

    /// Check namespace and every element name before anything is compiled
    pub fn validate(&self) -> CompileResult<()> {
        if !identifier_pattern().is_match(&self.namespace) {
            return Err(CompileError::invalid_input(
                "$namespace",
                format!("'{}' is not a valid form namespace", self.namespace),
            ));
        }
        validate_names(&self.root, "")
    }

    /// CRC32 over the canonical JSON form of namespace and tree
    pub fn fingerprint(&self) -> CompileResult<u32> {
        let canonical = serde_json::to_vec(self).map_err(|e| {
            CompileError::invalid_input("$root", format!("form cannot be serialized: {}", e))
        })?;
        Ok(crc32fast::hash(&canonical))
    }
}

/// Slash-separated path of a node below `parent_path`
pub fn element_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent_path, name)
    }
}

fn validate_names(element: &SourceElement, parent_path: &str) -> CompileResult<()> {
    let path = element_path(parent_path, &element.name);
    if !identifier_pattern().is_match(&element.name) {
        return Err(CompileError::invalid_input(
            path,
            format!("'{}' is not a valid element name", element.name),
        ));
    }
    for child in &element.children {
        validate_names(child, &path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_untyped_nodes() {
        let json = r#"{
            "namespace": "survey",
            "root": {"name": "data", "children": [
                {"name": "age", "kind": "integer"},
                {"name": "visits", "repeatable": true, "children": [
                    {"name": "when", "kind": "datetime"}
                ]}
            ]}
        }"#;
        let form: FormSource = serde_json::from_str(json).unwrap();
        assert_eq!(form.root.kind, None);
        assert!(form.root.children[1].repeatable);
        assert_eq!(form.root.children[1].children[0].kind, Some(SourceKind::Datetime));
    }

    #[test]
    fn test_invalid_element_name_rejected() {
        let form = FormSource::new(
            "survey",
            SourceElement::group("data", vec![SourceElement::field("bad name", SourceKind::String)]),
        );
        let err = form.validate().unwrap_err();
        assert!(err.to_string().contains("data/bad name"));
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let form = FormSource::new("9lives", SourceElement::group("data", vec![]));
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_fingerprint_tracks_structure() {
        let a = FormSource::new(
            "survey",
            SourceElement::group("data", vec![SourceElement::field("a", SourceKind::String)]),
        );
        let mut b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.root.children[0].kind = Some(SourceKind::Integer);
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_leaf_column_count() {
        let root = SourceElement::group(
            "data",
            vec![
                SourceElement::field("a", SourceKind::String),
                SourceElement::field("loc", SourceKind::Geopoint),
                SourceElement::field("photo", SourceKind::Binary),
            ],
        );
        assert_eq!(root.leaf_column_count(), 5);
    }
}
