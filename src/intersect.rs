//! Pairwise clade-intersection sizes between two trees.
//!
//! # Algorithm
//! Nodes of both trees are walked in postorder, T1 on the outer axis and T2
//! on the inner one. When cell `(u, v)` is reached, every cell `(child(u), v)`
//! and `(u, child(v))` is already known, so
//!
//! ```text
//! |u ∩ v| = Σ_{x ∈ children(u)} |x ∩ v|        (u internal)
//! |u ∩ v| = Σ_{y ∈ children(v)} |u ∩ y|        (u leaf, v internal)
//! |u ∩ v| = [id(u) == id(v)]                    (both leaves)
//! ```
//!
//! That fills the whole `|T1| × |T2|` table with O(1) amortised work per
//! cell. Only the internal × internal block is stored as a dense matrix;
//! leaf × internal cells are 0/1 and kept as bitsets over registry ids.
//!
//! While filling, a pair whose intersection equals both clade sizes is an
//! identical cluster in both trees. Those pairs are recorded as
//! *equivalent clusters* so matching metrics can pair them at zero cost
//! without handing them to the solver.

use crate::bitset::Bitset;
use crate::clade::CladeSizes;
use crate::error::Result;
use crate::registry::LeafRegistry;
use crate::topology::{NodeIdx, NodeKind, Topology};
use log::trace;

/// Two internal nodes (one per tree) spanning the same leaf set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterPair {
    pub first: NodeIdx,
    pub second: NodeIdx,
}

/// Intersection sizes for one tree pair. Built once, read-only afterwards,
/// and dropped with the comparison.
#[derive(Debug)]
pub struct ClustIntersectMatrix<'a> {
    first: &'a Topology,
    second: &'a Topology,
    alias1: Vec<usize>,
    alias2: Vec<usize>,
    sizes1: CladeSizes,
    sizes2: CladeSizes,
    /// internal(T1) × internal(T2), row-major by internal rank.
    inter: Vec<u32>,
    /// For every internal node of T1: registry ids of T2 leaves inside it.
    int1_leaf2: Vec<Bitset>,
    /// For every internal node of T2: registry ids of T1 leaves inside it.
    int2_leaf1: Vec<Bitset>,
    equivalent: Vec<ClusterPair>,
    eq1: Vec<bool>,
    eq2: Vec<bool>,
}

impl<'a> ClustIntersectMatrix<'a> {
    /// Build the table for `first` × `second`.
    ///
    /// `registry` must cover every leaf of both trees (a shared registry, or
    /// a merged one for the free-leaf-set metrics).
    ///
    /// # Errors
    /// `UnknownLeaf` if a leaf is not registered, `NumericOverflow` if a
    /// tree is too large for `u32` sizes.
    pub fn build(
        first: &'a Topology,
        second: &'a Topology,
        registry: &LeafRegistry,
    ) -> Result<Self> {
        let n1 = first.internal_count();
        let n2 = second.internal_count();
        let mut m = ClustIntersectMatrix {
            first,
            second,
            alias1: registry.aliases(first)?,
            alias2: registry.aliases(second)?,
            sizes1: CladeSizes::compute(first)?,
            sizes2: CladeSizes::compute(second)?,
            inter: vec![0; n1 * n2],
            int1_leaf2: vec![Bitset::for_leaves(registry.len()); n1],
            int2_leaf1: vec![Bitset::for_leaves(registry.len()); n2],
            equivalent: Vec::with_capacity(n1.min(n2)),
            eq1: vec![false; n1],
            eq2: vec![false; n2],
        };

        for u in first.postorder() {
            for v in second.postorder() {
                match (first.kind(u), second.kind(v)) {
                    (NodeKind::Leaf { .. }, NodeKind::Leaf { .. }) => {}
                    (NodeKind::Leaf { rank: lu }, NodeKind::Internal { rank: rv }) => {
                        let sum: u32 = second.children(v).iter().map(|&y| m.inter_size(u, y)).sum();
                        if sum == 1 {
                            m.int2_leaf1[rv].set(m.alias1[lu]);
                        }
                    }
                    (NodeKind::Internal { rank: ru }, kind_v) => {
                        let sum: u32 = first.children(u).iter().map(|&x| m.inter_size(x, v)).sum();
                        match kind_v {
                            NodeKind::Leaf { rank: lv } => {
                                if sum == 1 {
                                    m.int1_leaf2[ru].set(m.alias2[lv]);
                                }
                            }
                            NodeKind::Internal { rank: rv } => m.set_internal(ru, rv, u, v, sum),
                        }
                    }
                }
            }
        }

        trace!(
            "intersection matrix {}x{} internal nodes, {} equivalent clusters",
            n1,
            n2,
            m.equivalent.len()
        );
        Ok(m)
    }

    fn set_internal(&mut self, ru: usize, rv: usize, u: NodeIdx, v: NodeIdx, size: u32) {
        self.inter[ru * self.second.internal_count() + rv] = size;
        if size == self.sizes1.internal(ru) && size == self.sizes2.internal(rv) {
            self.equivalent.push(ClusterPair { first: u, second: v });
            self.eq1[ru] = true;
            self.eq2[rv] = true;
        }
    }

    /// `|clade(u) ∩ clade(v)|` for any node `u` of T1 and `v` of T2.
    pub fn inter_size(&self, u: NodeIdx, v: NodeIdx) -> u32 {
        match (self.first.kind(u), self.second.kind(v)) {
            (NodeKind::Leaf { rank: a }, NodeKind::Leaf { rank: b }) => {
                u32::from(self.alias1[a] == self.alias2[b])
            }
            (NodeKind::Leaf { rank: a }, NodeKind::Internal { rank: rv }) => {
                u32::from(self.int2_leaf1[rv].contains(self.alias1[a]))
            }
            (NodeKind::Internal { rank: ru }, NodeKind::Leaf { rank: b }) => {
                u32::from(self.int1_leaf2[ru].contains(self.alias2[b]))
            }
            (NodeKind::Internal { rank: ru }, NodeKind::Internal { rank: rv }) => {
                self.inter_internal(ru, rv)
            }
        }
    }

    /// Intersection size by internal ranks.
    #[inline]
    pub fn inter_internal(&self, ru: usize, rv: usize) -> u32 {
        self.inter[ru * self.second.internal_count() + rv]
    }

    /// Clade size of a T1 node (1 for leaves).
    pub fn size1(&self, u: NodeIdx) -> u32 {
        self.sizes1.of(self.first, u)
    }

    /// Clade size of a T2 node (1 for leaves).
    pub fn size2(&self, v: NodeIdx) -> u32 {
        self.sizes2.of(self.second, v)
    }

    pub fn sizes1(&self) -> &CladeSizes {
        &self.sizes1
    }

    pub fn sizes2(&self) -> &CladeSizes {
        &self.sizes2
    }

    /// Identical clusters found while building, in discovery order.
    pub fn equivalent_pairs(&self) -> &[ClusterPair] {
        &self.equivalent
    }

    pub fn is_equivalent1(&self, rank: usize) -> bool {
        self.eq1[rank]
    }

    pub fn is_equivalent2(&self, rank: usize) -> bool {
        self.eq2[rank]
    }

    pub fn first(&self) -> &'a Topology {
        self.first
    }

    pub fn second(&self) -> &'a Topology {
        self.second
    }
}
