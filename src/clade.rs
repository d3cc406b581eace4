//! Clade sizes: number of leaves below every internal node.
//!
//! One forward pass over the postorder arena: a leaf child contributes 1, an
//! internal child contributes its own (already computed) size.

use crate::error::{CompareError, Result};
use crate::topology::{NodeIdx, NodeKind, Topology};

/// Clade size per internal node, indexed by internal rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CladeSizes(Vec<u32>);

impl CladeSizes {
    /// # Errors
    /// `CompareError::NumericOverflow` if the leaf count does not fit `u32`.
    pub fn compute(tree: &Topology) -> Result<Self> {
        u32::try_from(tree.leaf_count()).map_err(|_| {
            CompareError::NumericOverflow(format!(
                "{} leaves exceed the clade size width",
                tree.leaf_count()
            ))
        })?;

        let mut sizes = vec![0u32; tree.internal_count()];
        for &node in tree.internals() {
            let size = tree
                .children(node)
                .iter()
                .map(|&child| match tree.kind(child) {
                    NodeKind::Leaf { .. } => 1,
                    NodeKind::Internal { rank } => sizes[rank],
                })
                .sum();
            if let NodeKind::Internal { rank } = tree.kind(node) {
                sizes[rank] = size;
            }
        }

        debug_assert!(
            tree.is_empty()
                || tree.is_leaf(tree.root())
                || sizes[sizes.len() - 1] as usize == tree.leaf_count()
        );
        Ok(CladeSizes(sizes))
    }

    /// Size of the clade of the internal node with the given rank.
    #[inline]
    pub fn internal(&self, rank: usize) -> u32 {
        self.0[rank]
    }

    /// Size of the clade below any node; leaves count as 1.
    #[inline]
    pub fn of(&self, tree: &Topology, node: NodeIdx) -> u32 {
        match tree.kind(node) {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Internal { rank } => self.0[rank],
        }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}
