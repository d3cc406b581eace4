//! Extract partition snapshots from phylogenetic trees.
//!
//! # Overview
//! A TreeSnapshot captures the clusters of a tree, or the splits they induce,
//! as bitsets over registry ids. Snapshots are only needed where exact
//! identity of a partition matters: the Robinson-Foulds metrics and the
//! RF-pruned matching path, which drops partitions shared by both trees
//! before the assignment solve.
//!
//! # What is a bipartition?
//! Each internal branch in a tree divides the leaves into two groups.
//! For example:
//! ```text
//!      root
//!     /    \
//!   {A,B}  {C,D}  ← This branch creates partition {A,B}
//! ```
//!
//! For splits only one side is stored (see [`canonical_split`]). For rooted
//! clusters the side below the node is the cluster itself.
//!
//! # CRITICAL: Why we use taxon NAMES not node IDs
//! Node IDs are assigned during tree parsing and differ across files.
//! Taxon names are consistent. Bit positions come from the
//! [`LeafRegistry`], which sorts leaves alphabetically by name, so
//! identical taxa always map to the same bit positions.

use crate::bitset::Bitset;
use crate::error::Result;
use crate::registry::LeafRegistry;
use crate::topology::{NodeIdx, NodeKind, Topology};
use std::collections::HashMap;

/// Which partitions a snapshot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Unrooted bipartitions, canonicalised.
    Split,
    /// Rooted clusters (leaf sets below internal nodes).
    Cluster,
}

/// An immutable snapshot of the partitions of one tree.
///
/// # Fields
/// - `parts`: one bitset per non-root internal node, in postorder. A rooted
///   snapshot of splits holds the root edge twice, once per root child, and
///   keeps both copies.
/// - `counts`: multiplicity of every distinct partition.
/// - `nodes`: the node each entry of `parts` was taken from.
/// - `num_leaves`: width of the registry (needed for complements).
/// - `kind`: splits or clusters.
///
/// # Canonicalization
/// Each bipartition can be represented two ways: {A,B}|{C,D} or {C,D}|{A,B}.
/// Splits always store the side that does NOT contain leaf 0, so identical
/// splits have identical bitsets regardless of where the tree was rooted.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub parts: Vec<Bitset>,
    pub nodes: Vec<NodeIdx>,
    pub num_leaves: usize,
    pub kind: PartitionKind,
    counts: HashMap<Bitset, usize>,
}

impl TreeSnapshot {
    /// Extract a snapshot from a topology.
    ///
    /// # Algorithm
    /// 1. Map each leaf to its registry id.
    /// 2. Walk the postorder arena, building bitsets bottom-up: a leaf sets its
    ///    own bit, an internal node ORs its children.
    /// 3. Collect every non-root internal node.
    /// 4. For splits, canonicalise (store the side without leaf 0).
    ///
    /// # Errors
    /// `UnknownLeaf` if a leaf of `tree` is missing from `registry`.
    pub fn from_topology(
        tree: &Topology,
        registry: &LeafRegistry,
        kind: PartitionKind,
    ) -> Result<Self> {
        let num_leaves = registry.len();
        let aliases = registry.aliases(tree)?;
        let clades = clade_bitsets(tree, &aliases, num_leaves);

        let mut parts = Vec::with_capacity(tree.internal_count());
        let mut nodes = Vec::with_capacity(tree.internal_count());
        let mut counts: HashMap<Bitset, usize> = HashMap::with_capacity(tree.internal_count());
        for &node in tree.internals() {
            // Skip root (doesn't create a partition)
            if tree.is_root(node) {
                continue;
            }
            let part = match kind {
                PartitionKind::Split => canonical_split(&clades[node], num_leaves),
                PartitionKind::Cluster => clades[node].clone(),
            };
            *counts.entry(part.clone()).or_default() += 1;
            parts.push(part);
            nodes.push(node);
        }

        Ok(TreeSnapshot {
            parts,
            nodes,
            num_leaves,
            kind,
            counts,
        })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains(&self, part: &Bitset) -> bool {
        self.counts.contains_key(part)
    }

    /// How often `part` occurs in this snapshot.
    pub fn count(&self, part: &Bitset) -> usize {
        self.counts.get(part).copied().unwrap_or(0)
    }

    /// Number of partitions present in both snapshots, with multiplicity.
    pub fn common_count(&self, other: &TreeSnapshot) -> usize {
        self.counts
            .iter()
            .map(|(part, &n)| n.min(other.count(part)))
            .sum()
    }

    /// Partitions of `self` left after cancelling each one against an equal
    /// partition of `other`, in snapshot order.
    pub fn difference<'a>(&'a self, other: &'a TreeSnapshot) -> impl Iterator<Item = &'a Bitset> + 'a {
        let mut seen: HashMap<&'a Bitset, usize> = HashMap::new();
        self.parts.iter().filter(move |p| {
            let n = seen.entry(*p).or_default();
            *n += 1;
            *n > other.count(p)
        })
    }
}

/// Bitset of every node's clade, indexed by node.
fn clade_bitsets(tree: &Topology, aliases: &[usize], num_leaves: usize) -> Vec<Bitset> {
    let mut cache: Vec<Bitset> = Vec::with_capacity(tree.len());
    for idx in tree.postorder() {
        let mut bitset = Bitset::for_leaves(num_leaves);
        match tree.kind(idx) {
            NodeKind::Leaf { rank } => bitset.set(aliases[rank]),
            NodeKind::Internal { .. } => {
                for &child in tree.children(idx) {
                    bitset.or_assign(&cache[child]);
                }
            }
        }
        cache.push(bitset);
    }
    cache
}

/// Canonicalize a bipartition to ensure consistent representation.
///
/// # Problem
/// A bipartition {A,B}|{C,D}:
///
/// ```text
/// A --\                   /-- C
///     node1 - (root) - node2
/// B --/                   \-- D
/// ```
///
/// rooted at `node1` yields the cluster {C,D}; rooted at `node2` it yields
/// {A,B}. Without canonicalization, identical splits produce different
/// bitsets.
///
/// # Solution
/// Always store the side that does NOT contain leaf 0 (the first leaf
/// alphabetically). Consider it as rooting the tree at the same leaf.
///
/// # Example
/// Leaves: A=0, B=1, C=2, D=3
/// Partition {A,B}: bitset 0b0011 (leaf 0 SET) → flip to {C,D}: 0b1100
/// Partition {C,D}: bitset 0b1100 (leaf 0 NOT set) → keep as 0b1100
pub fn canonical_split(cluster: &Bitset, num_leaves: usize) -> Bitset {
    if cluster.contains(0) {
        cluster.complement(num_leaves)
    } else {
        cluster.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(newick: &str, kind: PartitionKind) -> TreeSnapshot {
        let tree = Topology::from_newick(newick).unwrap();
        let registry = LeafRegistry::from_topology(&tree).unwrap();
        TreeSnapshot::from_topology(&tree, &registry, kind).unwrap()
    }

    /// Asymmetric tree with distinct partitions
    ///
    /// ```text
    ///              root
    ///             /    \
    ///         node1     E
    ///         /   \
    ///     node2    D
    ///     /   \
    ///    A    node3
    ///         /   \
    ///        B     C
    /// ```
    ///
    /// Leaves sorted: A=0, B=1, C=2, D=3, E=4
    ///
    /// | Node  | Leaves Below | Raw Bitset | Has A? | Canonical |
    /// |-------|--------------|------------|--------|-----------|
    /// | node3 | {B, C}       | 0b00110    | NO     | 0b00110   |
    /// | node2 | {A, B, C}    | 0b00111    | YES    | 0b11000   |
    /// | node1 | {A,B,C,D}    | 0b01111    | YES    | 0b10000   |
    #[test]
    fn test_asymmetric_tree_example() {
        let splits = snapshot("(((A,(B,C)),D),E);", PartitionKind::Split);
        let words: Vec<u64> = splits.parts.iter().map(|p| p.0[0]).collect();
        assert_eq!(words, vec![0b00110, 0b11000, 0b10000]);

        let clusters = snapshot("(((A,(B,C)),D),E);", PartitionKind::Cluster);
        let words: Vec<u64> = clusters.parts.iter().map(|p| p.0[0]).collect();
        assert_eq!(words, vec![0b00110, 0b00111, 0b01111]);
    }

    /// With canonicalization (always store side WITHOUT leaf 0=A):
    /// ```text
    /// Tree 1: {A,B} contains A → flip to {C,D} = 0b1100
    /// Tree 2: {C,D} no A → keep as {C,D} = 0b1100
    /// ```
    #[test]
    fn test_canonicalization() {
        let mut part_ab = Bitset::zeros(1);
        part_ab.set(0);
        part_ab.set(1);
        let mut part_cd = Bitset::zeros(1);
        part_cd.set(2);
        part_cd.set(3);

        assert_eq!(canonical_split(&part_ab, 4), part_cd);
        assert_eq!(canonical_split(&part_cd, 4), part_cd);

        // Same unrooted tree, two rootings.
        let a = snapshot("(A,B,(C,D));", PartitionKind::Split);
        let b = snapshot("(C,D,(A,B));", PartitionKind::Split);
        assert_eq!(a.common_count(&b), 1);
        assert_eq!(a.difference(&b).count(), 0);
    }

    /// Node IDs differ across files; names do not. Both trees below map
    /// Chimp=0, Gorilla=1, Human=2, so {Chimp, Human} is 0b101 in both.
    #[test]
    fn test_taxon_names_vs_node_ids() {
        let t1 = Topology::from_newick("((Human,Chimp),Gorilla,Orang);").unwrap();
        let t2 = Topology::from_newick("(Orang,(Chimp,Human),Gorilla);").unwrap();
        let registry = LeafRegistry::shared(&t1, &t2).unwrap();
        let s1 = TreeSnapshot::from_topology(&t1, &registry, PartitionKind::Cluster).unwrap();
        let s2 = TreeSnapshot::from_topology(&t2, &registry, PartitionKind::Cluster).unwrap();
        assert_eq!(s1.parts, s2.parts);
        assert_eq!(s1.parts[0].0[0], 0b101);
    }

    #[test]
    fn test_unary_nodes_do_not_duplicate() {
        let clusters = snapshot("(((A,B)),C,D);", PartitionKind::Cluster);
        assert_eq!(clusters.len(), 1);
        assert!(!clusters.is_empty());
    }

    #[test]
    fn test_clusters_differ_where_splits_agree() {
        // Same unrooted topology, different root placement.
        let a = snapshot("((A,B),(C,D));", PartitionKind::Cluster);
        let b = snapshot("(A,(B,(C,D)));", PartitionKind::Cluster);
        assert_eq!(a.common_count(&b), 1);

        let a = snapshot("((A,B),(C,D));", PartitionKind::Split);
        let b = snapshot("(A,(B,(C,D)));", PartitionKind::Split);
        // In a, {A,B} and {C,D} are the same split seen from both root
        // children. b adds the trivial {A}|{B,C,D}.
        assert_eq!(a.len(), 2);
        assert_eq!(a.count(&a.parts[0]), 2);
        assert_eq!(a.common_count(&b), 1);
        assert_eq!(a.difference(&b).count(), 1);
        assert_eq!(b.difference(&a).count(), 1);
        assert_eq!(a.common_count(&a), 2);
        assert_eq!(a.difference(&a).count(), 0);
    }
}
