//! Postorder node arena built from a phylogenetic tree.
//!
//! # Overview
//! `phylotree` trees are the external tree model. Every comparison first turns
//! a tree into a [`Topology`]: an immutable arena whose node indices *are* the
//! postorder positions. Children therefore always have smaller indices than
//! their parent and the root is the last node, so every dynamic program in the
//! crate is a plain forward loop over `0..len()`.
//!
//! Leaves and internal nodes additionally get dense ranks (`0..leaf_count()`
//! and `0..internal_count()`) in postorder, used to index per-leaf and
//! per-cluster tables.
//!
//! ```text
//!        (A,B,(C,D));
//!
//!   idx:  0  1  2  3  4      5
//!   node: A  B  C  D  (C,D)  root
//!   leaf rank:     0 1 2 3
//!   internal rank: (C,D)=0, root=1
//! ```

use crate::error::{CompareError, Result};
use phylotree::tree::Tree as PhyloTree;
use std::collections::HashMap;
use std::ops::Range;

/// Index of a node inside a [`Topology`] (its postorder position).
pub type NodeIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf { rank: usize },
    Internal { rank: usize },
}

#[derive(Debug, Clone)]
pub struct TopoNode {
    pub kind: NodeKind,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub label: Option<String>,
}

/// Immutable, postorder-indexed view of one tree.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<TopoNode>,
    leaves: Vec<NodeIdx>,
    internals: Vec<NodeIdx>,
}

impl Topology {
    /// Build the arena from a `phylotree` tree.
    ///
    /// # Errors
    /// - `CompareError::Tree` if the tree has no root or a dangling node id.
    /// - `CompareError::UnnamedLeaf` if a leaf carries no (or an empty) name.
    ///
    /// Internal nodes with a single child, e.g. the extra parentheses in
    /// `(((A,B)),C,D);`, are suppressed, so every cluster appears once.
    pub fn from_phylo(tree: &PhyloTree) -> Result<Self> {
        let root = tree.get_root()?;
        let topo = Self::assemble(root, |id| {
            let node = tree.get(&id)?;
            Ok((node.children.clone(), node.name.clone()))
        })?;
        if topo.leaf_count() > 1 && topo.has_unary_nodes() {
            return topo.restricted_to(|_| true);
        }
        Ok(topo)
    }

    /// Parse a Newick string through `phylotree` and build the arena.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let tree =
            PhyloTree::from_newick(newick).map_err(|e| CompareError::Newick(e.to_string()))?;
        Self::from_phylo(&tree)
    }

    /// Generic constructor: walks the source tree from `root`, asking `expand`
    /// for the children and label of every source node id.
    ///
    /// Children are visited in their given order, so the postorder is the
    /// usual left-to-right one.
    fn assemble<F>(root: usize, mut expand: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<(Vec<usize>, Option<String>)>,
    {
        // Pop order root, last child, ... reversed gives a postorder.
        let mut visited: Vec<(usize, Vec<usize>, Option<String>)> = Vec::new();
        let mut stack = vec![root];
        while let Some(src) = stack.pop() {
            let (children, label) = expand(src)?;
            stack.extend(children.iter().copied());
            visited.push((src, children, label));
        }
        visited.reverse();

        let position: HashMap<usize, NodeIdx> = visited
            .iter()
            .enumerate()
            .map(|(idx, (src, _, _))| (*src, idx))
            .collect();
        if position.len() != visited.len() {
            return Err(CompareError::DegenerateInput(
                "tree structure reaches a node twice".to_string(),
            ));
        }

        let mut nodes: Vec<TopoNode> = Vec::with_capacity(visited.len());
        let mut leaves = Vec::new();
        let mut internals = Vec::new();
        for (idx, (_, children, label)) in visited.into_iter().enumerate() {
            let children: Vec<NodeIdx> = children.iter().map(|c| position[c]).collect();
            let kind = if children.is_empty() {
                if label.as_deref().is_none_or(str::is_empty) {
                    return Err(CompareError::UnnamedLeaf);
                }
                leaves.push(idx);
                NodeKind::Leaf { rank: leaves.len() - 1 }
            } else {
                internals.push(idx);
                NodeKind::Internal { rank: internals.len() - 1 }
            };
            for &child in &children {
                nodes[child].parent = Some(idx);
            }
            nodes.push(TopoNode {
                kind,
                parent: None,
                children,
                label,
            });
        }

        Ok(Topology {
            nodes,
            leaves,
            internals,
        })
    }

    /// Rebuild from this arena with an overridden child list per node.
    fn rebuild(&self, root: NodeIdx, children: &[Vec<NodeIdx>]) -> Result<Self> {
        Self::assemble(root, |idx| {
            Ok((children[idx].clone(), self.nodes[idx].label.clone()))
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn internal_count(&self) -> usize {
        self.internals.len()
    }

    /// The root is always the last node in postorder.
    pub fn root(&self) -> NodeIdx {
        self.nodes.len() - 1
    }

    pub fn node(&self, idx: NodeIdx) -> &TopoNode {
        &self.nodes[idx]
    }

    #[inline]
    pub fn kind(&self, idx: NodeIdx) -> NodeKind {
        self.nodes[idx].kind
    }

    #[inline]
    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.nodes[idx].children
    }

    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.nodes[idx].parent
    }

    #[inline]
    pub fn is_leaf(&self, idx: NodeIdx) -> bool {
        matches!(self.nodes[idx].kind, NodeKind::Leaf { .. })
    }

    #[inline]
    pub fn is_root(&self, idx: NodeIdx) -> bool {
        idx + 1 == self.nodes.len()
    }

    pub fn label(&self, idx: NodeIdx) -> Option<&str> {
        self.nodes[idx].label.as_deref()
    }

    /// All node indices in postorder.
    pub fn postorder(&self) -> Range<NodeIdx> {
        0..self.nodes.len()
    }

    /// Leaf nodes, indexed by leaf rank.
    pub fn leaves(&self) -> &[NodeIdx] {
        &self.leaves
    }

    /// Internal nodes (root included), indexed by internal rank.
    pub fn internals(&self) -> &[NodeIdx] {
        &self.internals
    }

    pub fn internal_rank(&self, idx: NodeIdx) -> Option<usize> {
        match self.nodes[idx].kind {
            NodeKind::Internal { rank } => Some(rank),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Labels of all leaves in leaf-rank order.
    pub fn leaf_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.leaves
            .iter()
            .filter_map(move |&idx| self.nodes[idx].label.as_deref())
    }

    fn has_unary_nodes(&self) -> bool {
        self.internals.iter().any(|&idx| self.children(idx).len() == 1)
    }

    /// A tree counts as rooted when its root has exactly two children
    /// (same convention as `phylotree::tree::Tree::is_rooted`).
    pub fn is_rooted(&self) -> bool {
        !self.is_empty() && self.children(self.root()).len() == 2
    }

    /// Checks full resolution: every non-root internal node has two children
    /// and the root has two (rooted) or three (unrooted) children.
    pub fn is_binary(&self, rooted: bool) -> bool {
        self.internals.iter().all(|&idx| {
            let degree = self.children(idx).len();
            if self.is_root(idx) {
                degree == if rooted { 2 } else { 3 }
            } else {
                degree == 2
            }
        })
    }

    /// Collapse a bifurcating root so that the unrooted tree does not report
    /// the root edge as two clusters.
    ///
    /// ```text
    ///      root                root
    ///     /    \      ->     /  |  \
    ///   (A,B)  (C,D)       A    B  (C,D)
    /// ```
    ///
    /// Trees whose root has another degree, or whose two root children are
    /// both leaves, are returned unchanged.
    pub fn unrooted(&self) -> Result<Self> {
        if !self.is_rooted() {
            return Ok(self.clone());
        }
        let root = self.root();
        let Some(&merged) = self.children(root).iter().find(|&&c| !self.is_leaf(c)) else {
            return Ok(self.clone());
        };

        let mut children: Vec<Vec<NodeIdx>> =
            self.nodes.iter().map(|n| n.children.clone()).collect();
        children[root] = self
            .children(root)
            .iter()
            .flat_map(|&c| {
                if c == merged {
                    self.children(c).to_vec()
                } else {
                    vec![c]
                }
            })
            .collect();
        self.rebuild(root, &children)
    }

    /// Restrict the tree to the leaves accepted by `keep`, dropping emptied
    /// subtrees and suppressing internal nodes left with a single child.
    ///
    /// # Errors
    /// `CompareError::DegenerateInput` if no leaf survives.
    pub fn restricted_to<F>(&self, keep: F) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        let mut children: Vec<Vec<NodeIdx>> = vec![Vec::new(); self.len()];
        // Node standing in for each original subtree after restriction.
        let mut stand_in: Vec<Option<NodeIdx>> = vec![None; self.len()];

        for idx in self.postorder() {
            if self.is_leaf(idx) {
                if self.label(idx).is_some_and(|name| keep(name)) {
                    stand_in[idx] = Some(idx);
                }
                continue;
            }
            let kept: Vec<NodeIdx> = self
                .children(idx)
                .iter()
                .filter_map(|&c| stand_in[c])
                .collect();
            stand_in[idx] = match kept.len() {
                0 => None,
                1 => Some(kept[0]),
                _ => {
                    children[idx] = kept;
                    Some(idx)
                }
            };
        }

        let root = stand_in[self.root()].ok_or_else(|| {
            CompareError::DegenerateInput("no leaves left after restriction".to_string())
        })?;
        self.rebuild(root, &children)
    }
}
