//! Table Splitter
//!
//! Divides a table the store rejected as too wide. The preferred move
//! relocates whole group subtrees into fresh tables; when no group
//! qualifies, a PHANTOM record is inserted under the table's owner and the
//! trailing half of the owner's children move under it into a fresh table.
//!
//! Every split removes a meaningful share of the table's columns, so the
//! materialize/split loop makes progress without knowing the store's real
//! width limit.

use serde::{Deserialize, Serialize};

use crate::naming::ResolvedNames;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{
    CompileError, CompileResult, ElementKey, ElementKind, KeyGenerator, RecordSet, SchemaElement,
};
use crate::store::TableDescriptor;

/// Tuning constants of the splitting heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitPolicy {
    /// Stop relocating once more than this share of the columns moved
    pub target_fraction: f64,
    /// Never let relocated groups add up to more than this share
    pub relocate_ceiling: f64,
    /// A group qualifies when it holds more than 1/divisor of the columns
    pub group_weight_divisor: usize,
    /// A group qualifies when it holds more than this many columns
    pub group_weight_floor: usize,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            target_fraction: 0.5,
            relocate_ceiling: 0.75,
            group_weight_divisor: 4,
            group_weight_floor: 10,
        }
    }
}

impl SplitPolicy {
    pub fn validate(&self) -> CompileResult<()> {
        if !(self.target_fraction > 0.0 && self.target_fraction < 1.0) {
            return Err(CompileError::InvalidConfig(
                "split_policy.target_fraction must be between 0 and 1".into(),
            ));
        }
        if !(self.relocate_ceiling >= self.target_fraction && self.relocate_ceiling <= 1.0) {
            return Err(CompileError::InvalidConfig(
                "split_policy.relocate_ceiling must be between target_fraction and 1".into(),
            ));
        }
        if self.group_weight_divisor == 0 {
            return Err(CompileError::InvalidConfig(
                "split_policy.group_weight_divisor must be >= 1".into(),
            ));
        }
        Ok(())
    }

    fn is_group_candidate(&self, weight: usize, total: usize) -> bool {
        total < self.group_weight_divisor * weight || weight > self.group_weight_floor
    }
}

/// What a split did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    /// Group subtrees moved, one fresh table each
    Relocated { tables: Vec<String>, moved: usize },
    /// A phantom record now owns the trailing children
    Phantom {
        key: ElementKey,
        table: String,
        moved: usize,
    },
}

impl SplitOutcome {
    /// Columns that left the overflowing table
    pub fn moved(&self) -> usize {
        match self {
            SplitOutcome::Relocated { moved, .. } | SplitOutcome::Phantom { moved, .. } => *moved,
        }
    }
}

/// Co-resident child of the node being divided
struct Candidate {
    key: ElementKey,
    weight: usize,
    structural: bool,
}

pub struct TableSplitter<'p> {
    policy: &'p SplitPolicy,
}

impl<'p> TableSplitter<'p> {
    pub fn new(policy: &'p SplitPolicy) -> Self {
        Self { policy }
    }

    /// Divide `table`, rewriting table membership (and, for the phantom
    /// fallback, parentage and ordinals) in `records`.
    ///
    /// Fresh table names come from `names` so they never collide with names
    /// resolved earlier or with tables already in the store.
    pub fn split(
        &self,
        table: &TableDescriptor,
        records: &mut RecordSet,
        names: &mut ResolvedNames,
        keys: &mut KeyGenerator,
    ) -> CompileResult<SplitOutcome> {
        let owner = records
            .table_owner(&table.name)
            .ok_or_else(|| {
                CompileError::invariant(format!("no record lives in table {}", table.name))
            })?
            .key
            .clone();

        let total = records.co_resident_weight(&owner);
        if total < 2 {
            return Err(CompileError::unsplittable(
                table.to_string(),
                format!("it holds {} column(s); at least 2 are needed", total),
            ));
        }

        let (node, candidates) = self.divisible_node(&table.name, owner, records)?;

        if let Some(outcome) = self.relocate_groups(&table.name, total, &candidates, records, names)
        {
            return Ok(outcome);
        }
        self.insert_phantom(&table.name, total, &node, records, names, keys)
    }

    /// Walk down single-child wrapper groups until a node with at least two
    /// weighted co-resident children is found
    fn divisible_node(
        &self,
        table: &str,
        mut node: ElementKey,
        records: &RecordSet,
    ) -> CompileResult<(ElementKey, Vec<Candidate>)> {
        loop {
            if records.get(&node).map(|e| e.kind) == Some(ElementKind::GeoPoint) {
                return Err(CompileError::unsplittable(
                    table,
                    format!("the parts of geopoint {} cannot be separated", node),
                ));
            }
            let candidates: Vec<Candidate> = records
                .children(&node)
                .into_iter()
                .filter(|child| child.is_co_resident(table))
                .map(|child| Candidate {
                    key: child.key.clone(),
                    weight: records.co_resident_weight(&child.key),
                    structural: !child.has_column(),
                })
                .collect();

            let weighted: Vec<&Candidate> = candidates.iter().filter(|c| c.weight > 0).collect();
            let wrapped = match weighted.as_slice() {
                [only] if only.structural => Some(only.key.clone()),
                [] | [_] => {
                    return Err(CompileError::unsplittable(
                        table,
                        format!("{} has no children to divide", node),
                    ))
                }
                _ => None,
            };
            match wrapped {
                Some(next) => node = next,
                None => return Ok((node, candidates)),
            }
        }
    }

    /// Move the heaviest qualifying groups to fresh tables. `None` when no
    /// group could be moved.
    fn relocate_groups(
        &self,
        table: &str,
        total: usize,
        candidates: &[Candidate],
        records: &mut RecordSet,
        names: &mut ResolvedNames,
    ) -> Option<SplitOutcome> {
        let mut groups: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.structural && c.weight > 0)
            .filter(|c| self.policy.is_group_candidate(c.weight, total))
            .collect();
        // stable: equal weights keep ordinal order
        groups.sort_by(|a, b| b.weight.cmp(&a.weight));

        let target = self.policy.target_fraction * total as f64;
        let ceiling = self.policy.relocate_ceiling * total as f64;
        let mut moved = 0;
        let mut tables = Vec::new();

        for group in groups {
            if (moved + group.weight) as f64 > ceiling {
                continue;
            }
            let fresh = names.fresh_table_name(table);
            records.reassign_table(&group.key, table, &fresh);
            moved += group.weight;

            let weight = group.weight.to_string();
            log_event_with_fields(
                Event::GroupRelocated,
                &[
                    ("group", group.key.as_str()),
                    ("from", table),
                    ("to", &fresh),
                    ("columns", &weight),
                ],
            );
            tables.push(fresh);

            if moved as f64 > target {
                break;
            }
        }

        if moved > 0 {
            Some(SplitOutcome::Relocated { tables, moved })
        } else {
            None
        }
    }

    /// Move the trailing children of `node` under a new phantom record
    fn insert_phantom(
        &self,
        table: &str,
        total: usize,
        node: &ElementKey,
        records: &mut RecordSet,
        names: &mut ResolvedNames,
        keys: &mut KeyGenerator,
    ) -> CompileResult<SplitOutcome> {
        // all children, including those living in other tables, so sibling
        // ordinals stay contiguous
        let children: Vec<(ElementKey, u32, usize)> = records
            .children(node)
            .into_iter()
            .map(|child| {
                let weight = if child.is_co_resident(table) {
                    records.co_resident_weight(&child.key)
                } else {
                    0
                };
                (child.key.clone(), child.ordinal, weight)
            })
            .collect();

        let cut = phantom_cut(
            &children.iter().map(|(_, _, w)| *w).collect::<Vec<_>>(),
            self.policy.target_fraction * total as f64,
        )
        .ok_or_else(|| {
            CompileError::unsplittable(table, format!("children of {} cannot be divided", node))
        })?;

        let moved_children = &children[cut..];
        let moved: usize = moved_children.iter().map(|(_, _, w)| w).sum();
        let fresh = names.fresh_table_name(table);
        let phantom_key = keys.phantom();

        records.push(SchemaElement::structural(
            phantom_key.clone(),
            Some(node.clone()),
            moved_children[0].1,
            None,
            ElementKind::Phantom,
            fresh.clone(),
        ))?;

        for (i, (key, _, _)) in moved_children.iter().enumerate() {
            if let Some(child) = records.get_mut(key) {
                child.parent = Some(phantom_key.clone());
                child.ordinal = i as u32 + 1;
            }
            records.reassign_table(key, table, &fresh);
        }

        let moved_text = moved.to_string();
        log_event_with_fields(
            Event::PhantomCreated,
            &[
                ("phantom", phantom_key.as_str()),
                ("from", table),
                ("to", &fresh),
                ("columns", &moved_text),
            ],
        );

        Ok(SplitOutcome::Phantom {
            key: phantom_key,
            table: fresh,
            moved,
        })
    }
}

/// Index of the first child to move: the smallest prefix holding at least
/// `half` of the weight, as long as both sides keep some weight. Falls back
/// to the largest prefix that still leaves weight behind.
fn phantom_cut(weights: &[usize], half: f64) -> Option<usize> {
    let total: usize = weights.iter().sum();
    let mut prefix = 0;
    let mut fallback = None;
    for (i, weight) in weights.iter().enumerate().take(weights.len().saturating_sub(1)) {
        prefix += weight;
        if prefix == 0 || prefix >= total {
            continue;
        }
        if prefix as f64 >= half {
            return Some(i + 1);
        }
        fallback = Some(i + 1);
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingSet;
    use crate::store::TableKind;
    use std::collections::BTreeSet;

    fn names() -> ResolvedNames {
        NamingSet::new("formtables").resolve(&BTreeSet::new(), Default::default())
    }

    fn descriptor(name: &str) -> TableDescriptor {
        TableDescriptor {
            schema: "formtables".into(),
            name: name.into(),
            kind: TableKind::TopLevel,
            owner: ElementKey::new("root"),
            columns: Vec::new(),
        }
    }

    struct Builder {
        records: RecordSet,
        next: u32,
    }

    impl Builder {
        fn new() -> Self {
            let mut records = RecordSet::new();
            records
                .push(SchemaElement::structural(
                    ElementKey::new("root"),
                    None,
                    1,
                    Some("root".into()),
                    ElementKind::Group,
                    "CORE",
                ))
                .unwrap();
            Self { records, next: 0 }
        }

        fn key(&mut self) -> ElementKey {
            self.next += 1;
            ElementKey::new(format!("e{:03}", self.next))
        }

        fn leaves(&mut self, parent: &ElementKey, count: u32) {
            let base = self.records.children(parent).len() as u32;
            for i in 0..count {
                let key = self.key();
                let column = format!("C_{}", key);
                self.records
                    .push(SchemaElement::leaf(key, Some(parent.clone()), base + i + 1, "f", ElementKind::Integer, "CORE", column))
                    .unwrap();
            }
        }

        fn group(&mut self, parent: &ElementKey, leaves: u32) -> ElementKey {
            let ordinal = self.records.children(parent).len() as u32 + 1;
            let key = self.key();
            self.records
                .push(SchemaElement::structural(key.clone(), Some(parent.clone()), ordinal, Some("g".into()), ElementKind::Group, "CORE"))
                .unwrap();
            self.leaves(&key, leaves);
            key
        }
    }

    fn root() -> ElementKey {
        ElementKey::new("root")
    }

    #[test]
    fn test_two_equal_groups_move_one() {
        let mut b = Builder::new();
        let first = b.group(&root(), 40);
        let second = b.group(&root(), 40);
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let outcome = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap();

        assert_eq!(
            outcome,
            SplitOutcome::Relocated {
                tables: vec!["CORE_2".into()],
                moved: 40
            }
        );
        assert_eq!(records.get(&first).unwrap().table_name, "CORE_2");
        assert_eq!(records.get(&second).unwrap().table_name, "CORE");
        assert_eq!(records.co_resident_weight(&root()), 40);
    }

    #[test]
    fn test_flat_leaves_get_phantom() {
        let mut b = Builder::new();
        b.leaves(&root(), 10);
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let outcome = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap();

        let SplitOutcome::Phantom { key, table, moved } = outcome else {
            panic!("expected phantom split");
        };
        assert_eq!(moved, 5);
        assert_eq!(table, "CORE_2");

        let phantom = records.get(&key).unwrap();
        assert_eq!(phantom.kind, ElementKind::Phantom);
        assert_eq!(phantom.ordinal, 6);
        assert_eq!(phantom.parent, Some(root()));

        let root_children = records.children(&root());
        assert_eq!(root_children.len(), 6);
        let moved_children = records.children(&key);
        assert_eq!(
            moved_children.iter().map(|c| c.ordinal).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(moved_children.iter().all(|c| c.table_name == "CORE_2"));
        assert_eq!(records.co_resident_weight(&root()), 5);
    }

    #[test]
    fn test_single_wrapper_group_is_unwrapped() {
        let mut b = Builder::new();
        let wrapper = b.group(&root(), 0);
        b.leaves(&wrapper, 4);
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let outcome = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap();

        let SplitOutcome::Phantom { key, .. } = outcome else {
            panic!("expected phantom split");
        };
        assert_eq!(records.get(&key).unwrap().parent, Some(wrapper));
    }

    #[test]
    fn test_single_column_is_unsplittable() {
        let mut b = Builder::new();
        b.leaves(&root(), 1);
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let err = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap_err();
        assert!(err.is_non_convergence());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_oversized_group_falls_back_to_phantom() {
        let mut b = Builder::new();
        b.leaves(&root(), 1);
        b.group(&root(), 9);
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let outcome = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap();
        assert!(matches!(outcome, SplitOutcome::Phantom { moved: 9, .. }));
    }

    #[test]
    fn test_geopoint_parts_stay_together() {
        let mut b = Builder::new();
        let point = b.key();
        b.records
            .push(SchemaElement::structural(point.clone(), Some(root()), 1, Some("gps".into()), ElementKind::GeoPoint, "CORE"))
            .unwrap();
        for (i, part) in ["LAT", "LNG", "ALT", "ACC"].iter().enumerate() {
            let key = b.key();
            b.records
                .push(SchemaElement::leaf(key, Some(point.clone()), i as u32 + 1, *part, ElementKind::Decimal, "CORE", *part))
                .unwrap();
        }
        let mut records = b.records;
        let mut keys = KeyGenerator::new("s");
        let policy = SplitPolicy::default();

        let err = TableSplitter::new(&policy)
            .split(&descriptor("CORE"), &mut records, &mut names(), &mut keys)
            .unwrap_err();
        assert!(err.is_non_convergence());
    }

    #[test]
    fn test_phantom_cut() {
        assert_eq!(phantom_cut(&[1, 1, 1, 1], 2.0), Some(2));
        assert_eq!(phantom_cut(&[1, 1, 1], 1.5), Some(2));
        assert_eq!(phantom_cut(&[1, 1], 1.0), Some(1));
        assert_eq!(phantom_cut(&[1, 9], 5.0), Some(1));
        assert_eq!(phantom_cut(&[0, 4, 0], 2.0), None);
        assert_eq!(phantom_cut(&[2, 0, 2], 2.0), Some(1));
    }

    #[test]
    fn test_policy_validation() {
        assert!(SplitPolicy::default().validate().is_ok());
        let bad = SplitPolicy {
            target_fraction: 0.8,
            relocate_ceiling: 0.6,
            ..SplitPolicy::default()
        };
        assert!(bad.validate().is_err());
    }
}
