//! Arena of compiled records addressed by `ElementKey`
//!
//! Parent/child edges are explicit `parent` keys, so the splitter can
//! reparent records and move them between tables without holding
//! references into the tree.

use std::collections::HashMap;

use super::errors::{CompileError, CompileResult};
use super::types::{ElementKey, SchemaElement};

/// Owning collection of every record of one compiled form
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    elements: Vec<SchemaElement>,
    index: HashMap<ElementKey, usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record set from an existing list, rejecting duplicate keys
    pub fn from_elements(elements: Vec<SchemaElement>) -> CompileResult<Self> {
        let mut set = Self::new();
        for element in elements {
            set.push(element)?;
        }
        Ok(set)
    }

    /// Add a record; keys must be unique
    pub fn push(&mut self, element: SchemaElement) -> CompileResult<()> {
        if self.index.contains_key(&element.key) {
            return Err(CompileError::invariant(format!(
                "duplicate element key {}",
                element.key
            )));
        }
        self.index.insert(element.key.clone(), self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, key: &ElementKey) -> Option<&SchemaElement> {
        self.index.get(key).map(|&i| &self.elements[i])
    }

    pub fn get_mut(&mut self, key: &ElementKey) -> Option<&mut SchemaElement> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.elements[i]),
            None => None,
        }
    }

    /// Look up a record that must exist
    pub fn require(&self, key: &ElementKey) -> CompileResult<&SchemaElement> {
        self.get(key)
            .ok_or_else(|| CompileError::invariant(format!("unknown element key {}", key)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaElement> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SchemaElement> {
        self.elements.iter_mut()
    }

    /// Records without a parent, ordered by ordinal
    pub fn roots(&self) -> Vec<&SchemaElement> {
        let mut roots: Vec<_> = self.elements.iter().filter(|e| e.parent.is_none()).collect();
        roots.sort_by_key(|e| e.ordinal);
        roots
    }

    /// Direct children of `key`, ordered by ordinal
    pub fn children(&self, key: &ElementKey) -> Vec<&SchemaElement> {
        let mut children: Vec<_> = self
            .elements
            .iter()
            .filter(|e| e.parent.as_ref() == Some(key))
            .collect();
        children.sort_by_key(|e| e.ordinal);
        children
    }

    /// Keys of the direct children of `key`, ordered by ordinal
    pub fn child_keys(&self, key: &ElementKey) -> Vec<ElementKey> {
        self.children(key).into_iter().map(|e| e.key.clone()).collect()
    }

    /// Parent record of `key`, if any
    pub fn parent_of(&self, key: &ElementKey) -> Option<&SchemaElement> {
        self.get(key)
            .and_then(|e| e.parent.as_ref())
            .and_then(|p| self.get(p))
    }

    /// Number of leaf columns in the subtree of `key` that live in the same
    /// table as `key` itself.
    pub fn co_resident_weight(&self, key: &ElementKey) -> usize {
        let Some(element) = self.get(key) else {
            return 0;
        };
        let table = element.table_name.as_str();
        let mut count = usize::from(element.has_column());
        for child in self.children(key) {
            if child.is_co_resident(table) {
                count += self.co_resident_weight(&child.key);
            }
        }
        count
    }

    /// Move `key` and every descendant still co-resident with `from` into
    /// table `to`. Descendants living in other tables are left alone.
    pub fn reassign_table(&mut self, key: &ElementKey, from: &str, to: &str) {
        let Some(element) = self.get_mut(key) else {
            return;
        };
        if !element.is_co_resident(from) {
            return;
        }
        element.table_name = to.to_string();
        for child in self.child_keys(key) {
            self.reassign_table(&child, from, to);
        }
    }

    /// Highest record of the chain that owns `table`: it lives in `table`
    /// and its parent does not.
    pub fn table_owner(&self, table: &str) -> Option<&SchemaElement> {
        let mut owner = self.elements.iter().find(|e| e.is_co_resident(table))?;
        while let Some(parent) = owner.parent.as_ref().and_then(|p| self.get(p)) {
            if !parent.is_co_resident(table) {
                break;
            }
            owner = parent;
        }
        Some(owner)
    }

    pub fn into_elements(self) -> Vec<SchemaElement> {
        self.elements
    }

    pub fn as_slice(&self) -> &[SchemaElement] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ElementKind;

    fn key(n: u32) -> ElementKey {
        ElementKey::new(format!("k{}", n))
    }

    /// root(T) -> [a(T), g(T) -> [b(T), c(U)], d(T)]
    fn sample() -> RecordSet {
        let mut set = RecordSet::new();
        set.push(SchemaElement::structural(key(1), None, 1, Some("root".into()), ElementKind::Group, "T"))
            .unwrap();
        set.push(SchemaElement::leaf(key(2), Some(key(1)), 1, "a", ElementKind::String, "T", "A"))
            .unwrap();
        set.push(SchemaElement::structural(key(3), Some(key(1)), 2, Some("g".into()), ElementKind::Group, "T"))
            .unwrap();
        set.push(SchemaElement::leaf(key(4), Some(key(3)), 1, "b", ElementKind::Integer, "T", "B"))
            .unwrap();
        set.push(SchemaElement::leaf(key(5), Some(key(3)), 2, "c", ElementKind::Integer, "U", "C"))
            .unwrap();
        set.push(SchemaElement::leaf(key(6), Some(key(1)), 3, "d", ElementKind::Date, "T", "D"))
            .unwrap();
        set
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut set = sample();
        let dup = SchemaElement::leaf(key(2), Some(key(1)), 9, "x", ElementKind::String, "T", "X");
        assert!(set.push(dup).is_err());
    }

    #[test]
    fn test_children_sorted_by_ordinal() {
        let set = sample();
        let names: Vec<_> = set
            .children(&key(1))
            .iter()
            .map(|e| e.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "g", "d"]);
    }

    #[test]
    fn test_weight_counts_only_co_resident_leaves() {
        let set = sample();
        assert_eq!(set.co_resident_weight(&key(1)), 3);
        assert_eq!(set.co_resident_weight(&key(3)), 1);
        assert_eq!(set.co_resident_weight(&key(2)), 1);
    }

    #[test]
    fn test_reassign_stops_at_foreign_tables() {
        let mut set = sample();
        set.reassign_table(&key(3), "T", "V");
        assert_eq!(set.get(&key(3)).unwrap().table_name, "V");
        assert_eq!(set.get(&key(4)).unwrap().table_name, "V");
        assert_eq!(set.get(&key(5)).unwrap().table_name, "U");
        assert_eq!(set.get(&key(6)).unwrap().table_name, "T");
    }

    #[test]
    fn test_table_owner_climbs_to_highest_co_resident() {
        let set = sample();
        assert_eq!(set.table_owner("T").unwrap().key, key(1));
        assert_eq!(set.table_owner("U").unwrap().key, key(5));
        assert!(set.table_owner("missing").is_none());
    }
}
