//! Form Compilation Tests
//!
//! End-to-end behavior of `FormCompiler::define_form` against the in-memory
//! store:
//! - Reference scenarios (flat form, two large groups, repeat, single leaf)
//! - Name uniqueness across tables and within each table
//! - Every leaf field lands in exactly one column
//! - Split tables reassemble in the original field order
//! - Keys are deterministic
//! - The split loop converges for any budget of at least two columns

use std::collections::BTreeSet;

use formtables::config::CompilerConfig;
use formtables::partition::{DefinedForm, FormCompiler};
use formtables::schema::{
    compile, CompileError, CompileOptions, ElementKind, FormLoader, FormSource,
};
use formtables::store::{
    MemoryStore, Persistence, TableDescriptor, TableKind, LINKAGE_COLUMNS,
};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn form(namespace: &str, children: Vec<Value>) -> FormSource {
    let document = json!({
        "namespace": namespace,
        "root": {"name": "data", "children": children}
    });
    FormLoader::parse(&document.to_string()).unwrap()
}

fn leaves(prefix: &str, count: usize, kind: &str) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"name": format!("{}{}", prefix, i), "kind": kind}))
        .collect()
}

fn define(source: &FormSource, store: &mut MemoryStore) -> Result<DefinedForm, CompileError> {
    FormCompiler::new(CompilerConfig::default()).define_form(store, source)
}

fn dynamic_tables(defined: &DefinedForm) -> Vec<&TableDescriptor> {
    defined
        .schema
        .tables
        .iter()
        .filter(|t| t.kind.is_dynamic())
        .collect()
}

/// A form exercising every element kind
fn mixed_form() -> FormSource {
    form(
        "household",
        vec![
            json!({"name": "name", "kind": "string", "preferred_length": 80}),
            json!({"name": "visited", "kind": "date"}),
            json!({"name": "location", "kind": "geopoint"}),
            json!({"name": "photo", "kind": "binary"}),
            json!({"name": "crops", "kind": "select_multi"}),
            json!({"name": "head", "children": [
                {"name": "name", "kind": "string"},
                {"name": "age", "kind": "integer"},
                {"name": "literate", "kind": "boolean"}
            ]}),
            json!({"name": "members", "repeatable": true, "children": [
                {"name": "name", "kind": "string"},
                {"name": "age", "kind": "integer"},
                {"name": "income", "kind": "decimal"},
                {"name": "school", "kind": "select_single"}
            ]}),
            json!({"name": "a_field_name_that_is_far_too_long_to_fit_in_a_column_identifier_limit", "kind": "string"}),
            json!({"name": "tag", "kind": "barcode"}),
        ],
    )
}

// =============================================================================
// Reference Scenarios
// =============================================================================

/// Three string fields under the root fit one table.
#[test]
fn test_flat_form_single_table() {
    let source = form("survey", leaves("q", 3, "string"));
    let mut store = MemoryStore::with_column_budget(100);

    let defined = define(&source, &mut store).unwrap();

    assert_eq!(defined.schema.tables.len(), 1);
    let table = &defined.schema.tables[0];
    assert_eq!(table.kind, TableKind::TopLevel);
    assert_eq!(table.name, "SURVEY_CORE");
    assert_eq!(table.column_names(), vec!["Q0", "Q1", "Q2"]);
    assert_eq!(defined.schema.phantom_count(), 0);
    assert_eq!(defined.iterations, 1);
}

/// Two 40-field groups under a 60-column budget: one group moves out.
#[test]
fn test_two_large_groups_split_once() {
    let source = form(
        "survey",
        vec![
            json!({"name": "g1", "children": leaves("q", 40, "integer")}),
            json!({"name": "g2", "children": leaves("q", 40, "integer")}),
        ],
    );
    let compiler = FormCompiler::new(CompilerConfig::default());
    let mut store = MemoryStore::with_column_budget(60);

    let defined = compiler.define_form(&mut store, &source).unwrap();

    assert_eq!(defined.schema.tables.len(), 2);
    let sizes: Vec<usize> = defined
        .schema
        .tables
        .iter()
        .map(|t| t.data_column_count())
        .collect();
    assert_eq!(sizes, vec![40, 40]);
    assert_eq!(defined.schema.phantom_count(), 0);
    assert_eq!(defined.iterations, 2);

    let metrics = compiler.metrics().snapshot();
    assert_eq!(metrics.group_relocations, 1);
    assert_eq!(metrics.phantom_tables, 0);
    assert_eq!(metrics.overflows, 1);

    let moved = &defined.schema.tables[1];
    assert_eq!(moved.kind, TableKind::Nested);
    assert!(moved.column_names().iter().all(|c| c.starts_with("G1_")));
}

/// A repeat gets its own table linked to the root table.
#[test]
fn test_repeat_gets_own_table() {
    let source = form(
        "survey",
        vec![json!({"name": "kids", "repeatable": true, "children": leaves("q", 5, "integer")})],
    );
    let mut store = MemoryStore::new();

    let defined = define(&source, &mut store).unwrap();

    assert_eq!(defined.schema.tables.len(), 2);
    let root = &defined.schema.tables[0];
    assert_eq!(root.kind, TableKind::TopLevel);
    assert_eq!(root.data_column_count(), 0);

    let kids = &defined.schema.tables[1];
    assert_eq!(kids.kind, TableKind::Nested);
    assert_eq!(kids.data_column_count(), 5);
    let all: Vec<String> = kids.all_columns().into_iter().map(|c| c.name).collect();
    for linkage in LINKAGE_COLUMNS {
        assert!(all.iter().any(|c| c == linkage));
    }

    let owner = defined.schema.element(&kids.owner).unwrap();
    assert_eq!(owner.kind, ElementKind::Repeat);
    assert_eq!(store.table_count(), 2);
}

/// A single field that never fits cannot be split: non-convergence, not a
/// loop.
#[test]
fn test_single_leaf_zero_budget_fails() {
    let source = form("survey", leaves("q", 1, "integer"));
    let mut store = MemoryStore::with_column_budget(0);

    let err = define(&source, &mut store).unwrap_err();

    assert!(err.is_non_convergence());
    assert!(err.is_fatal());
    assert!(matches!(err, CompileError::Unsplittable { .. }));
    assert_eq!(store.table_count(), 0);
    assert!(store.load_form("survey").unwrap().is_none());
}

// =============================================================================
// Structural Properties
// =============================================================================

/// No two tables share a name and no table repeats a column name.
#[test]
fn test_names_unique() {
    let config = CompilerConfig {
        emit_long_string_tables: true,
        max_column_name_length: 32,
        ..CompilerConfig::default()
    };
    let compiler = FormCompiler::new(config);
    let mut store = MemoryStore::with_column_budget(5);

    let defined = compiler.define_form(&mut store, &mixed_form()).unwrap();

    let mut table_names = BTreeSet::new();
    for table in &defined.schema.tables {
        assert!(
            table_names.insert(table.name.to_ascii_uppercase()),
            "duplicate table {}",
            table.name
        );
        let mut columns = BTreeSet::new();
        for column in table.all_columns() {
            assert!(column.name.len() <= 32 || column.name.starts_with('_'));
            assert!(
                columns.insert(column.name.clone()),
                "duplicate column {} in {}",
                column.name,
                table.name
            );
        }
    }

    let kinds: BTreeSet<String> = defined
        .schema
        .tables
        .iter()
        .map(|t| format!("{:?}", t.kind))
        .collect();
    for kind in [
        "Choices",
        "BinaryContent",
        "BinaryRef",
        "Blob",
        "LongStringRef",
        "LongStringText",
    ] {
        assert!(kinds.contains(kind), "missing {} table", kind);
    }
}

/// Names already taken in the store are avoided.
#[test]
fn test_existing_tables_avoided() {
    let mut store = MemoryStore::new();
    store
        .seed_table(&TableDescriptor {
            schema: "formtables".into(),
            name: "survey_core".into(),
            kind: TableKind::TopLevel,
            owner: formtables::schema::ElementKey::new("other"),
            columns: Vec::new(),
        })
        .unwrap();

    let defined = define(&form("survey", leaves("q", 2, "integer")), &mut store).unwrap();
    assert_eq!(defined.schema.tables[0].name, "SURVEY_CORE_2");
}

/// Splitting neither drops nor duplicates fields.
#[test]
fn test_weight_conservation() {
    let source = mixed_form();
    let expected = source.root.leaf_column_count();

    for budget in [5, 6, 8, 100] {
        let mut store = MemoryStore::with_column_budget(budget);
        let defined = define(&source, &mut store).unwrap();

        assert_eq!(defined.schema.dynamic_column_count(), expected);
        let leaves = defined
            .schema
            .elements
            .iter()
            .filter(|e| e.column_name.is_some())
            .count();
        assert_eq!(leaves, expected);
    }
}

/// A split root table plus its phantom tables lists the fields in their
/// original order.
#[test]
fn test_phantom_split_preserves_order() {
    let source = form("survey", leaves("q", 20, "integer"));
    let mut store = MemoryStore::with_column_budget(3);

    let defined = define(&source, &mut store).unwrap();
    assert!(defined.schema.phantom_count() > 0);

    let expected: Vec<String> = (0..20).map(|i| format!("Q{}", i)).collect();
    let reassembled = defined.schema.reassembled_columns("SURVEY_CORE");
    assert_eq!(reassembled, expected);

    let in_order: Vec<&str> = defined
        .schema
        .leaf_order(&defined.schema.root)
        .iter()
        .filter_map(|e| e.column_name.as_deref())
        .collect();
    assert_eq!(in_order, expected);
}

/// Grouped fields keep their order across relocations too.
#[test]
fn test_leaf_order_survives_relocation() {
    let source = form(
        "survey",
        vec![
            json!({"name": "a", "children": leaves("x", 12, "integer")}),
            json!({"name": "mid", "kind": "string"}),
            json!({"name": "b", "children": leaves("y", 12, "integer")}),
        ],
    );
    let mut store = MemoryStore::with_column_budget(10);
    let defined = define(&source, &mut store).unwrap();

    let mut expected: Vec<String> = (0..12).map(|i| format!("A_X{}", i)).collect();
    expected.push("MID".into());
    expected.extend((0..12).map(|i| format!("B_Y{}", i)));

    let order: Vec<&str> = defined
        .schema
        .leaf_order(&defined.schema.root)
        .iter()
        .filter_map(|e| e.column_name.as_deref())
        .collect();
    assert_eq!(order, expected);
    for table in dynamic_tables(&defined) {
        assert!(table.data_column_count() <= 10);
    }
}

/// Compiling the same tree twice yields the same keys.
#[test]
fn test_keys_deterministic() {
    let source = mixed_form();
    let options = CompileOptions::default();

    let first = compile(&source.root, &source.namespace, &options).unwrap();
    let second = compile(&source.root, &source.namespace, &options).unwrap();

    let keys = |records: &formtables::schema::RecordSet| {
        records.iter().map(|e| e.key.clone()).collect::<Vec<_>>()
    };
    assert_eq!(keys(&first.records), keys(&second.records));
    assert!(first
        .records
        .iter()
        .all(|e| e.key.as_str().starts_with("elem+household(")));

    let a = define(&source, &mut MemoryStore::with_column_budget(5)).unwrap();
    let b = define(&source, &mut MemoryStore::with_column_budget(5)).unwrap();
    assert_eq!(a.schema.elements, b.schema.elements);
}

// =============================================================================
// Convergence
// =============================================================================

/// Any flat form converges under any budget of two or more columns.
#[test]
fn test_flat_forms_converge() {
    for fields in [1, 2, 7, 20, 64] {
        for budget in [2, 3, 5, 8] {
            let source = form("survey", leaves("q", fields, "integer"));
            let mut store = MemoryStore::with_column_budget(budget);

            let defined = define(&source, &mut store)
                .unwrap_or_else(|e| panic!("{} fields, budget {}: {}", fields, budget, e));

            for table in dynamic_tables(&defined) {
                assert!(table.data_column_count() <= budget);
            }
            assert_eq!(defined.schema.dynamic_column_count(), fields);
            assert!(defined.iterations <= 2 * fields / budget + 2);
            assert_eq!(store.table_count(), defined.schema.tables.len());
        }
    }
}

/// Nested groups deeper than one level converge as well.
#[test]
fn test_nested_groups_converge() {
    let source = form(
        "survey",
        vec![json!({"name": "outer", "children": [
            {"name": "inner", "children": leaves("q", 30, "integer")},
            {"name": "tail", "kind": "string"}
        ]})],
    );
    let mut store = MemoryStore::with_column_budget(4);

    let defined = define(&source, &mut store).unwrap();
    for table in dynamic_tables(&defined) {
        assert!(table.data_column_count() <= 4);
    }
    assert_eq!(defined.schema.dynamic_column_count(), 31);
}
