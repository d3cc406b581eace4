//! Leaf-index registry: canonical leaf name → dense id mapping.
//!
//! # Why names and not node ids
//! Node ids differ between trees (and between files), taxon names do not.
//! Names are sorted alphabetically before ids are handed out, so the same
//! taxon set always yields the same ids, independent of tree shape or
//! input order.
//!
//! A registry lives for exactly one comparison. For trees on different leaf
//! sets, [`LeafRegistry::merged`] covers the union of both label sets.

use crate::error::{CompareError, Result};
use crate::topology::Topology;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRegistry {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LeafRegistry {
    /// Registry over the leaves of a single tree.
    ///
    /// # Errors
    /// `CompareError::DuplicateLeaf` if a name occurs twice in the tree.
    pub fn from_topology(tree: &Topology) -> Result<Self> {
        let labels = unique_labels(tree)?;
        Ok(Self::from_names(labels))
    }

    /// Registry over the union of both trees' leaf names.
    pub fn merged(first: &Topology, second: &Topology) -> Result<Self> {
        let mut labels = unique_labels(first)?;
        labels.extend(unique_labels(second)?);
        Ok(Self::from_names(labels))
    }

    /// Registry shared by two trees that must carry the same leaf set.
    ///
    /// # Errors
    /// `CompareError::LeafSetMismatch` when the leaf sets differ.
    pub fn shared(first: &Topology, second: &Topology) -> Result<Self> {
        let a = unique_labels(first)?;
        let b = unique_labels(second)?;
        if a != b {
            return Err(CompareError::LeafSetMismatch {
                only_first: a.difference(&b).count(),
                only_second: b.difference(&a).count(),
            });
        }
        Ok(Self::from_names(a))
    }

    fn from_names<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names: Vec<String> = labels.into_iter().map(str::to_string).collect();
        names.sort_unstable();
        names.dedup();
        let index = names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();
        LeafRegistry { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Registry id of every leaf of `tree`, indexed by leaf rank.
    ///
    /// # Errors
    /// `CompareError::UnknownLeaf` if a leaf name is not registered.
    pub fn aliases(&self, tree: &Topology) -> Result<Vec<usize>> {
        tree.leaf_labels()
            .map(|name| {
                self.id(name)
                    .ok_or_else(|| CompareError::UnknownLeaf(name.to_string()))
            })
            .collect()
    }
}

/// Set of leaf labels of a tree, rejecting duplicates.
fn unique_labels(tree: &Topology) -> Result<HashSet<&str>> {
    let mut seen = HashSet::with_capacity(tree.leaf_count());
    for name in tree.leaf_labels() {
        if !seen.insert(name) {
            return Err(CompareError::DuplicateLeaf(name.to_string()));
        }
    }
    Ok(seen)
}

/// Returns true when both trees carry exactly the same leaf names.
pub fn same_leaf_set(first: &Topology, second: &Topology) -> bool {
    first.leaf_count() == second.leaf_count() && {
        let a: HashSet<&str> = first.leaf_labels().collect();
        second.leaf_labels().all(|name| a.contains(name))
    }
}

/// Leaf names present in both trees.
pub fn common_leaves<'a>(first: &'a Topology, second: &Topology) -> HashSet<&'a str> {
    let b: HashSet<&str> = second.leaf_labels().collect();
    first.leaf_labels().filter(|name| b.contains(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_name_order() {
        // Tree order: Human, Chimp, Gorilla -> ids sorted by name.
        let tree = Topology::from_newick("(Human,Chimp,Gorilla);").unwrap();
        let registry = LeafRegistry::from_topology(&tree).unwrap();
        assert_eq!(registry.id("Chimp"), Some(0));
        assert_eq!(registry.id("Gorilla"), Some(1));
        assert_eq!(registry.id("Human"), Some(2));
        assert_eq!(registry.name(2), Some("Human"));

        let aliases = registry.aliases(&tree).unwrap();
        assert_eq!(aliases, vec![2, 0, 1]);
    }

    #[test]
    fn test_same_ids_regardless_of_shape() {
        let t1 = Topology::from_newick("((A,B),(C,D));").unwrap();
        let t2 = Topology::from_newick("((D,B),(C,A));").unwrap();
        let r1 = LeafRegistry::from_topology(&t1).unwrap();
        let r2 = LeafRegistry::from_topology(&t2).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(LeafRegistry::shared(&t1, &t2).unwrap(), r1);
    }

    #[test]
    fn test_merged_and_mismatch() {
        let t1 = Topology::from_newick("(A,B,(C,D));").unwrap();
        let t2 = Topology::from_newick("(A,B,(C,E));").unwrap();

        let merged = LeafRegistry::merged(&t1, &t2).unwrap();
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.names(), &["A", "B", "C", "D", "E"]);
        assert!(!same_leaf_set(&t1, &t2));
        assert_eq!(common_leaves(&t1, &t2).len(), 3);

        match LeafRegistry::shared(&t1, &t2) {
            Err(CompareError::LeafSetMismatch {
                only_first,
                only_second,
            }) => {
                assert_eq!(only_first, 1);
                assert_eq!(only_second, 1);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }

        let single = LeafRegistry::from_topology(&t1).unwrap();
        assert!(matches!(
            single.aliases(&t2),
            Err(CompareError::UnknownLeaf(name)) if name == "E"
        ));
    }

    #[test]
    fn test_duplicate_leaf_rejected() {
        let tree = Topology::from_newick("(A,B,(A,D));").unwrap();
        assert!(matches!(
            LeafRegistry::from_topology(&tree),
            Err(CompareError::DuplicateLeaf(name)) if name == "A"
        ));
    }
}
