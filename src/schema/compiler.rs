//! Schema Compiler
//!
//! Walks the source tree once, depth-first in child order, and emits the
//! flat record set. Every record gets a stable key, a parent link, an
//! ordinal among its siblings and a table placeholder; leaf fields also get
//! a column placeholder. No physical name is chosen here.
//!
//! Non-repeating groups are inlined: their fields live in the enclosing
//! table, with the group name folded into the column names. Repeats, multiple
//! choice fields and binary attachments each open their own table.

use super::errors::{CompileError, CompileResult};
use super::records::RecordSet;
use super::source::{element_path, SourceElement, SourceKind};
use super::types::{AuxKind, ElementKey, ElementKind, KeyGenerator, SchemaElement};
use crate::naming::{sanitize, NamingSet};

/// Settings that change what the compiler emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Persistence schema the tables will live in
    pub schema: String,
    /// Emit the long-string reference and text tables
    pub emit_long_string_tables: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            schema: "formtables".to_string(),
            emit_long_string_tables: false,
        }
    }
}

/// Output of one compilation: records with placeholders, the placeholder
/// registry and the key generator (splitting keeps issuing phantom keys from
/// it).
#[derive(Debug, Clone)]
pub struct CompiledForm {
    pub namespace: String,
    pub root: ElementKey,
    pub records: RecordSet,
    pub naming: NamingSet,
    pub keys: KeyGenerator,
}

const GEOPOINT_PARTS: [(AuxKind, &str); 4] = [
    (AuxKind::GeoLatitude, "LAT"),
    (AuxKind::GeoLongitude, "LNG"),
    (AuxKind::GeoAltitude, "ALT"),
    (AuxKind::GeoAccuracy, "ACC"),
];

struct CompilerContext {
    table_prefix: String,
    keys: KeyGenerator,
    naming: NamingSet,
    records: RecordSet,
}

/// Where a node sits while the tree is walked
struct Position<'a> {
    parent: Option<&'a ElementKey>,
    ordinal: u32,
    /// Enclosing non-repeating group names, joined with `_`
    group_prefix: &'a str,
    /// Table placeholder of the enclosing table
    table: &'a str,
    /// Source path of the parent, for error messages
    path: &'a str,
}

/// Compile a source tree into a flat record set.
///
/// `root` must be a non-repeating group. The result is fully deterministic:
/// the same tree and namespace always produce the same keys, ordinals and
/// placeholders.
pub fn compile(
    root: &SourceElement,
    namespace: &str,
    options: &CompileOptions,
) -> CompileResult<CompiledForm> {
    let mut ctx = CompilerContext {
        table_prefix: sanitize(namespace),
        keys: KeyGenerator::new(namespace),
        naming: NamingSet::new(options.schema.clone()),
        records: RecordSet::new(),
    };

    let core = ctx.naming.table(&[&ctx.table_prefix, "CORE"]);
    let root_key = ctx.visit(
        root,
        Position {
            parent: None,
            ordinal: 1,
            group_prefix: "",
            table: &core,
            path: "",
        },
    )?;

    if options.emit_long_string_tables {
        ctx.emit_long_string_tables()?;
    }

    Ok(CompiledForm {
        namespace: namespace.to_string(),
        root: root_key,
        records: ctx.records,
        naming: ctx.naming,
        keys: ctx.keys,
    })
}

/// Decide what a source node becomes, rejecting shapes that cannot be stored
fn classify(node: &SourceElement, is_root: bool, path: &str) -> CompileResult<ElementKind> {
    let structural = matches!(
        node.kind,
        None | Some(SourceKind::Group) | Some(SourceKind::Repeat)
    );

    if structural {
        let repeats = node.repeatable || node.kind == Some(SourceKind::Repeat);
        if repeats && is_root {
            return Err(CompileError::invalid_input(path, "the form root cannot repeat"));
        }
        if node.children.is_empty() {
            let reason = if node.kind.is_none() {
                "field has no type and no fields nested within it"
            } else {
                "group has no fields"
            };
            return Err(CompileError::invalid_input(path, reason));
        }
        return Ok(if repeats {
            ElementKind::Repeat
        } else {
            ElementKind::Group
        });
    }

    if is_root {
        return Err(CompileError::invalid_input(path, "the form root must be a group"));
    }
    if !node.children.is_empty() {
        return Err(CompileError::invalid_input(
            path,
            "a typed field cannot contain nested fields",
        ));
    }
    if node.repeatable {
        return Err(CompileError::invalid_input(path, "only groups can repeat"));
    }

    Ok(match node.kind {
        Some(SourceKind::Integer) => ElementKind::Integer,
        Some(SourceKind::Decimal) => ElementKind::Decimal,
        Some(SourceKind::Boolean) => ElementKind::Boolean,
        Some(SourceKind::Date) => ElementKind::Date,
        Some(SourceKind::Time) => ElementKind::Time,
        Some(SourceKind::Datetime) => ElementKind::DateTime,
        Some(SourceKind::Geopoint) => ElementKind::GeoPoint,
        Some(SourceKind::Binary) => ElementKind::Binary,
        Some(SourceKind::SelectSingle) => ElementKind::SelectSingle,
        Some(SourceKind::SelectMulti) => ElementKind::SelectMulti,
        // barcodes and unknown types are kept as text
        _ => ElementKind::String,
    })
}

impl CompilerContext {
    fn push(&mut self, element: SchemaElement) -> CompileResult<()> {
        self.records.push(element)
    }

    fn visit(&mut self, node: &SourceElement, at: Position<'_>) -> CompileResult<ElementKey> {
        let path = element_path(at.path, &node.name);
        let kind = classify(node, at.parent.is_none(), &path)?;
        let key = self.keys.issue(AuxKind::None);
        let parent = at.parent.cloned();
        let name = node.name.as_str();

        match kind {
            ElementKind::Group => {
                self.push(SchemaElement::structural(
                    key.clone(),
                    parent,
                    at.ordinal,
                    Some(name.to_string()),
                    kind,
                    at.table,
                ))?;
                // the root's own name never prefixes its columns
                let prefix = if at.parent.is_none() {
                    String::new()
                } else {
                    join(at.group_prefix, name)
                };
                self.visit_children(node, &key, &prefix, at.table, &path)?;
            }
            ElementKind::Repeat => {
                let table = self
                    .naming
                    .table(&[&self.table_prefix, at.group_prefix, name]);
                self.push(SchemaElement::structural(
                    key.clone(),
                    parent,
                    at.ordinal,
                    Some(name.to_string()),
                    kind,
                    &table,
                ))?;
                self.visit_children(node, &key, "", &table, &path)?;
            }
            ElementKind::GeoPoint => {
                self.push(SchemaElement::structural(
                    key.clone(),
                    parent,
                    at.ordinal,
                    Some(name.to_string()),
                    kind,
                    at.table,
                ))?;
                for (i, (aux, suffix)) in GEOPOINT_PARTS.iter().enumerate() {
                    let part = format!("{}_{}", name, suffix);
                    let column = self.naming.column(at.table, at.group_prefix, &part)?;
                    let part_key = self.keys.issue(*aux);
                    self.push(SchemaElement::leaf(
                        part_key,
                        Some(key.clone()),
                        i as u32 + 1,
                        part,
                        ElementKind::Decimal,
                        at.table,
                        column,
                    ))?;
                }
            }
            ElementKind::SelectMulti => {
                let table = self
                    .naming
                    .table(&[&self.table_prefix, at.group_prefix, name]);
                self.push(SchemaElement::structural(
                    key.clone(),
                    parent,
                    at.ordinal,
                    Some(name.to_string()),
                    kind,
                    table,
                ))?;
            }
            ElementKind::Binary => self.emit_binary(key.clone(), parent, &at, name)?,
            _ => {
                let column = self.naming.column(at.table, at.group_prefix, name)?;
                let mut leaf =
                    SchemaElement::leaf(key.clone(), parent, at.ordinal, name, kind, at.table, column);
                if kind == ElementKind::String || kind == ElementKind::SelectSingle {
                    leaf.preferred_length = node.preferred_length;
                }
                self.push(leaf)?;
            }
        }

        Ok(key)
    }

    fn visit_children(
        &mut self,
        node: &SourceElement,
        key: &ElementKey,
        group_prefix: &str,
        table: &str,
        path: &str,
    ) -> CompileResult<()> {
        for (i, child) in node.children.iter().enumerate() {
            self.visit(
                child,
                Position {
                    parent: Some(key),
                    ordinal: i as u32 + 1,
                    group_prefix,
                    table,
                    path,
                },
            )?;
        }
        Ok(())
    }

    /// Content table, reference table and blob table of one attachment field
    fn emit_binary(
        &mut self,
        key: ElementKey,
        parent: Option<ElementKey>,
        at: &Position<'_>,
        name: &str,
    ) -> CompileResult<()> {
        let prefix = self.table_prefix.clone();
        let content = self
            .naming
            .table(&[&prefix, at.group_prefix, &format!("{}_BN", name)]);
        self.push(SchemaElement::structural(
            key.clone(),
            parent,
            at.ordinal,
            Some(name.to_string()),
            ElementKind::Binary,
            content,
        ))?;

        let reference = self
            .naming
            .table(&[&prefix, at.group_prefix, &format!("{}_REF", name)]);
        let ref_key = self.keys.issue(AuxKind::BinaryContentRef);
        self.push(SchemaElement::structural(
            ref_key.clone(),
            Some(key),
            1,
            Some(name.to_string()),
            ElementKind::BinaryContentRef,
            reference,
        ))?;

        let blob = self
            .naming
            .table(&[&prefix, at.group_prefix, &format!("{}_BLB", name)]);
        let blob_key = self.keys.issue(AuxKind::RefBlob);
        self.push(SchemaElement::structural(
            blob_key,
            Some(ref_key),
            1,
            Some(name.to_string()),
            ElementKind::BinaryBlob,
            blob,
        ))
    }

    fn emit_long_string_tables(&mut self) -> CompileResult<()> {
        let prefix = self.table_prefix.clone();
        self.keys.skip();

        let reference = self.naming.table(&[&prefix, "STRING_REF"]);
        let ref_key = self.keys.issue(AuxKind::LongStringRef);
        self.push(SchemaElement::structural(
            ref_key.clone(),
            None,
            2,
            None,
            ElementKind::LongStringRef,
            reference,
        ))?;

        let text = self.naming.table(&[&prefix, "STRING_TXT"]);
        let text_key = self.keys.issue(AuxKind::RefText);
        self.push(SchemaElement::structural(
            text_key,
            Some(ref_key),
            1,
            None,
            ElementKind::LongStringText,
            text,
        ))
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", prefix, name)
    }
}
