//! Matching-Split and Matching-Cluster distances.
//!
//! Both metrics pair the clusters (or splits) of two trees one-to-one so
//! that the summed pairwise cost is minimal; the minimum is the distance.
//! A cluster left without a partner is paired with an empty one.
//!
//! | metric   | pair cost `(u, v)`               | unpaired cost `u` |
//! |----------|----------------------------------|-------------------|
//! | split    | `min(x, n - x)`, `x = \|u ∆ v\|` | `min(\|u\|, n - \|u\|)` |
//! | cluster  | `\|u ∆ v\|`                      | `\|u\|`           |
//!
//! Three strategies compute the same quantities:
//! - [`MatchingStrategy::Exact`] reads sizes from a [`ClustIntersectMatrix`]
//!   and pre-pairs identical clusters at zero cost. It alone can report the
//!   node-to-node [`Alignment`].
//! - [`MatchingStrategy::RfPruned`] works on bitset partitions and drops the
//!   ones both trees share before the solve.
//! - [`MatchingStrategy::FreeLeafSet`] accepts trees on different leaf sets:
//!   leaves take part as size-1 clusters and the intersection matrix is
//!   built over the union of both label sets.

use crate::bitset::Bitset;
use crate::config::{CompareConfig, MatchingStrategy};
use crate::error::Result;
use crate::intersect::ClustIntersectMatrix;
use crate::lap::{self, Assignment, CostMatrix};
use crate::registry::LeafRegistry;
use crate::snapshot::{PartitionKind, TreeSnapshot};
use crate::topology::{NodeIdx, NodeKind, Topology};
use log::{debug, trace};

/// Which side of the split/cluster duality a matching metric compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchingKind {
    Split,
    Cluster,
}

impl MatchingKind {
    /// Cost of pairing two partitions whose symmetric difference is `xor`.
    #[inline]
    fn pair_cost(self, xor: u64, num_leaves: u64) -> u64 {
        match self {
            MatchingKind::Split => xor.min(num_leaves - xor),
            MatchingKind::Cluster => xor,
        }
    }

    /// Cost of leaving a partition of `size` leaves unpaired.
    #[inline]
    fn padding(self, size: u64, num_leaves: u64) -> u64 {
        match self {
            MatchingKind::Split => size.min(num_leaves - size),
            MatchingKind::Cluster => size,
        }
    }

    fn partition_kind(self) -> PartitionKind {
        match self {
            MatchingKind::Split => PartitionKind::Split,
            MatchingKind::Cluster => PartitionKind::Cluster,
        }
    }
}

/// One line of an alignment: two nodes (either may be missing) and the cost
/// of pairing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedPair {
    pub first: Option<NodeIdx>,
    pub second: Option<NodeIdx>,
    pub cost: u32,
}

/// Node-to-node pairing realised by an exact matching distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    pub total_cost: u64,
    pub use_clusters: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingOutcome {
    pub distance: f64,
    pub alignment: Option<Alignment>,
}

/// Matching distance between `first` and `second` with the strategy chosen
/// in `config`.
///
/// Trees are used as given; unrooting and pruning are the caller's business
/// (see [`crate::distances::compare_pair`]).
///
/// # Errors
/// - `LeafSetMismatch` for the exact and RF-pruned strategies when the leaf
///   sets differ.
/// - `NumericOverflow` if a cost does not fit the cost matrix.
pub fn matching_distance(
    first: &Topology,
    second: &Topology,
    kind: MatchingKind,
    config: &CompareConfig,
) -> Result<MatchingOutcome> {
    match config.strategy() {
        MatchingStrategy::Exact => exact(first, second, kind, config.emits_alignments()),
        MatchingStrategy::RfPruned => Ok(MatchingOutcome {
            distance: rf_pruned(first, second, kind)? as f64,
            alignment: None,
        }),
        MatchingStrategy::FreeLeafSet => {
            let distance = match kind {
                MatchingKind::Split => free_split(first, second)?,
                MatchingKind::Cluster => free_cluster(first, second)? as f64,
            };
            Ok(MatchingOutcome {
                distance,
                alignment: None,
            })
        }
    }
}

/// Non-root internal nodes without an identical twin in the other tree.
fn active_clusters(tree: &Topology, equivalent: impl Fn(usize) -> bool) -> Vec<NodeIdx> {
    tree.internals()
        .iter()
        .enumerate()
        .filter(|&(rank, &node)| !tree.is_root(node) && !equivalent(rank))
        .map(|(_, &node)| node)
        .collect()
}

/// Fill a `size × size` matrix from row and column candidates; a missing
/// row or column is the empty partner.
fn assemble<R, C>(
    rows: &[R],
    cols: &[C],
    mut pair: impl FnMut(&R, &C) -> u64,
    mut row_pad: impl FnMut(&R) -> u64,
    mut col_pad: impl FnMut(&C) -> u64,
) -> Result<CostMatrix> {
    let size = rows.len().max(cols.len());
    let mut costs = CostMatrix::zeros(size);
    for i in 0..size {
        for j in 0..size {
            let cost = match (rows.get(i), cols.get(j)) {
                (Some(r), Some(c)) => pair(r, c),
                (Some(r), None) => row_pad(r),
                (None, Some(c)) => col_pad(c),
                (None, None) => 0,
            };
            costs.set(i, j, cost)?;
        }
    }
    Ok(costs)
}

fn exact(
    first: &Topology,
    second: &Topology,
    kind: MatchingKind,
    with_alignment: bool,
) -> Result<MatchingOutcome> {
    let registry = LeafRegistry::shared(first, second)?;
    let cim = ClustIntersectMatrix::build(first, second, &registry)?;
    let n = registry.len() as u64;

    let rows = active_clusters(first, |r| cim.is_equivalent1(r));
    let cols = active_clusters(second, |r| cim.is_equivalent2(r));
    debug!(
        "exact {kind:?} matching: {} x {} active clusters, {} equivalent",
        rows.len(),
        cols.len(),
        cim.equivalent_pairs().len()
    );

    let costs = assemble(
        &rows,
        &cols,
        |&u, &v| {
            let xor = u64::from(cim.size1(u)) + u64::from(cim.size2(v))
                - 2 * u64::from(cim.inter_size(u, v));
            kind.pair_cost(xor, n)
        },
        |&u| kind.padding(u64::from(cim.size1(u)), n),
        |&v| kind.padding(u64::from(cim.size2(v)), n),
    )?;
    let assignment = lap::solve(&costs);
    trace!("exact {kind:?} matching total {}", assignment.total);

    let alignment = with_alignment.then(|| align(&cim, &rows, &cols, &costs, &assignment, kind));
    Ok(MatchingOutcome {
        distance: assignment.total as f64,
        alignment,
    })
}

/// Identical non-root clusters at cost 0, then one line per solver row.
fn align(
    cim: &ClustIntersectMatrix<'_>,
    rows: &[NodeIdx],
    cols: &[NodeIdx],
    costs: &CostMatrix,
    assignment: &Assignment,
    kind: MatchingKind,
) -> Alignment {
    let leaf_count = cim.first().leaf_count();
    let mut pairs: Vec<AlignedPair> = cim
        .equivalent_pairs()
        .iter()
        .filter(|pair| cim.size1(pair.first) as usize != leaf_count)
        .map(|pair| AlignedPair {
            first: Some(pair.first),
            second: Some(pair.second),
            cost: 0,
        })
        .collect();

    pairs.extend(assignment.row_to_col.iter().enumerate().map(|(i, &j)| AlignedPair {
        first: rows.get(i).copied(),
        second: cols.get(j).copied(),
        cost: costs.get(i, j),
    }));

    Alignment {
        pairs,
        total_cost: assignment.total,
        use_clusters: kind == MatchingKind::Cluster,
    }
}

/// Partitions left over once the ones shared by both trees are removed.
#[derive(Debug, Clone)]
pub struct Residual {
    pub first: Vec<Bitset>,
    pub second: Vec<Bitset>,
    pub num_leaves: usize,
}

impl Residual {
    /// Side of the cost matrix the solver will see.
    pub fn size(&self) -> usize {
        self.first.len().max(self.second.len())
    }
}

/// Bitset partitions of both trees minus the shared ones.
///
/// # Errors
/// `LeafSetMismatch` when the trees carry different leaves.
pub fn residual_partitions(
    first: &Topology,
    second: &Topology,
    kind: MatchingKind,
) -> Result<Residual> {
    let registry = LeafRegistry::shared(first, second)?;
    let s1 = TreeSnapshot::from_topology(first, &registry, kind.partition_kind())?;
    let s2 = TreeSnapshot::from_topology(second, &registry, kind.partition_kind())?;
    Ok(Residual {
        first: s1.difference(&s2).cloned().collect(),
        second: s2.difference(&s1).cloned().collect(),
        num_leaves: registry.len(),
    })
}

fn rf_pruned(first: &Topology, second: &Topology, kind: MatchingKind) -> Result<u64> {
    let residual = residual_partitions(first, second, kind)?;
    debug!(
        "rf-pruned {kind:?} matching: {} x {} residual partitions",
        residual.first.len(),
        residual.second.len()
    );
    if residual.size() == 0 {
        return Ok(0);
    }

    let n = residual.num_leaves as u64;
    let costs = assemble(
        &residual.first,
        &residual.second,
        |a, b| kind.pair_cost(a.xor_count(b) as u64, n),
        |a| kind.padding(a.count_ones() as u64, n),
        |b| kind.padding(b.count_ones() as u64, n),
    )?;
    Ok(lap::solve(&costs).total)
}

/// Free-leaf-set Matching-Split.
///
/// Every non-root node `u` of T1 splits the leaves of T1 into `A = clade(u)`
/// and `B = L1 \ A`; likewise `v` splits T2 into `C` and `D`. With
/// `E = |L1| + |L2|` the pair cost is
///
/// ```text
/// E - 2 · max(|A∩C| + |B∩D|, |A∩D| + |B∩C|)
/// ```
///
/// which counts, over both trees, the leaves the two splits disagree on
/// (leaves present in one tree only always disagree). An unpaired split
/// costs `E - ||A| - |B||`. Every edge is seen from both trees, so the
/// total is halved.
fn free_split(first: &Topology, second: &Topology) -> Result<f64> {
    let registry = LeafRegistry::merged(first, second)?;
    let cim = ClustIntersectMatrix::build(first, second, &registry)?;

    let rows: Vec<NodeIdx> = first.postorder().filter(|&u| !first.is_root(u)).collect();
    let cols: Vec<NodeIdx> = second.postorder().filter(|&v| !second.is_root(v)).collect();
    debug!(
        "free-leaf-set split matching: {} x {} nodes over {} leaves",
        rows.len(),
        cols.len(),
        registry.len()
    );
    if rows.is_empty() && cols.is_empty() {
        return Ok(0.0);
    }

    let l1 = first.leaf_count() as u64;
    let l2 = second.leaf_count() as u64;
    let total_leaves = l1 + l2;
    let (root1, root2) = (first.root(), second.root());
    let roots_inter = u64::from(cim.inter_size(root1, root2));

    let costs = assemble(
        &rows,
        &cols,
        |&u, &v| {
            let ac = u64::from(cim.inter_size(u, v));
            let r1c = u64::from(cim.inter_size(root1, v));
            let ar2 = u64::from(cim.inter_size(u, root2));
            let bc = r1c - ac;
            let ad = ar2 - ac;
            let bd = roots_inter + ac - r1c - ar2;
            total_leaves - 2 * (ac + bd).max(ad + bc)
        },
        |&u| {
            let a = u64::from(cim.size1(u));
            total_leaves - a.abs_diff(l1 - a)
        },
        |&v| {
            let c = u64::from(cim.size2(v));
            total_leaves - c.abs_diff(l2 - c)
        },
    )?;
    Ok(lap::solve(&costs).total as f64 / 2.0)
}

/// Free-leaf-set Matching-Cluster: every node, root and leaves included,
/// takes part with cost `|u ∆ v|` and padding `|u|`.
fn free_cluster(first: &Topology, second: &Topology) -> Result<u64> {
    let registry = LeafRegistry::merged(first, second)?;
    let cim = ClustIntersectMatrix::build(first, second, &registry)?;

    let rows: Vec<NodeIdx> = first.postorder().collect();
    let cols: Vec<NodeIdx> = second.postorder().collect();
    debug!(
        "free-leaf-set cluster matching: {} x {} nodes over {} leaves",
        rows.len(),
        cols.len(),
        registry.len()
    );

    let costs = assemble(
        &rows,
        &cols,
        |&u, &v| {
            u64::from(cim.size1(u)) + u64::from(cim.size2(v)) - 2 * u64::from(cim.inter_size(u, v))
        },
        |&u| u64::from(cim.size1(u)),
        |&v| u64::from(cim.size2(v)),
    )?;
    Ok(lap::solve(&costs).total)
}

/// Printable name of a node: the label of a leaf, or the sorted leaf set of
/// an internal node. Used when writing alignments.
pub fn node_label(tree: &Topology, node: NodeIdx) -> String {
    match tree.kind(node) {
        NodeKind::Leaf { .. } => tree.label(node).unwrap_or_default().to_string(),
        NodeKind::Internal { .. } => {
            let mut names: Vec<&str> = subtree_leaves(tree, node)
                .filter_map(|leaf| tree.label(leaf))
                .collect();
            names.sort_unstable();
            format!("({})", names.join(","))
        }
    }
}

/// Alignment line with node indices replaced by printable labels. A missing
/// partner prints as `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledPair {
    pub first: String,
    pub second: String,
    pub cost: u32,
}

impl Alignment {
    /// Resolve node indices against the trees the alignment was computed on.
    pub fn labelled(&self, first: &Topology, second: &Topology) -> Vec<LabelledPair> {
        let label = |tree: &Topology, node: Option<NodeIdx>| {
            node.map_or_else(|| "-".to_string(), |n| node_label(tree, n))
        };
        self.pairs
            .iter()
            .map(|pair| LabelledPair {
                first: label(first, pair.first),
                second: label(second, pair.second),
                cost: pair.cost,
            })
            .collect()
    }
}

/// Leaves below `node`. In postorder a subtree occupies a contiguous index
/// range ending at the node itself.
fn subtree_leaves(tree: &Topology, node: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
    let mut start = node;
    while let Some(&first_child) = tree.children(start).first() {
        start = first_child;
    }
    (start..=node).filter(move |&idx| tree.is_leaf(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    const TREEDIST: [&str; 12] = [
        "(A:0.1,(B:0.1,(H:0.1,(D:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,((J:0.1,H:0.1):0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,(H:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((F:0.1,I:0.1):0.1,(G:0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((F:0.1,I:0.1):0.1,(G:0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,(H:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
    ];

    fn topo(newick: &str) -> Topology {
        Topology::from_newick(newick).unwrap()
    }

    fn with(strategy: MatchingStrategy) -> CompareConfig {
        CompareConfig::builder().strategy(strategy).build()
    }

    fn distance(t1: &Topology, t2: &Topology, kind: MatchingKind, strategy: MatchingStrategy) -> f64 {
        matching_distance(t1, t2, kind, &with(strategy)).unwrap().distance
    }

    #[test]
    fn test_identity_is_zero() {
        let t = topo("(A,B,(C,D));");
        for kind in [MatchingKind::Split, MatchingKind::Cluster] {
            for strategy in [
                MatchingStrategy::Exact,
                MatchingStrategy::RfPruned,
                MatchingStrategy::FreeLeafSet,
            ] {
                assert_eq!(distance(&t, &t, kind, strategy), 0.0, "{kind:?} {strategy:?}");
            }
            assert_eq!(residual_partitions(&t, &t, kind).unwrap().size(), 0);
        }
    }

    #[test]
    fn test_single_split_swap() {
        // {A,B}|{C,D} against {A,C}|{B,D}: one 1x1 assignment of cost min(2, 2).
        let t1 = topo("(A,B,(C,D));");
        let t2 = topo("(A,C,(B,D));");
        for strategy in [MatchingStrategy::Exact, MatchingStrategy::RfPruned] {
            assert_eq!(distance(&t1, &t2, MatchingKind::Split, strategy), 2.0);
        }
        assert_eq!(residual_partitions(&t1, &t2, MatchingKind::Split).unwrap().size(), 1);
    }

    #[test]
    fn test_three_leaves_have_no_splits() {
        let t1 = topo("(A,B,C);");
        let t2 = topo("(C,A,B);");
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::Exact), 0.0);
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::RfPruned), 0.0);
    }

    #[test]
    fn test_leaf_set_mismatch_rejected() {
        let t1 = topo("(A,B,(C,D));");
        let t2 = topo("(A,B,(C,E));");
        for strategy in [MatchingStrategy::Exact, MatchingStrategy::RfPruned] {
            let res = matching_distance(&t1, &t2, MatchingKind::Split, &with(strategy));
            assert!(matches!(
                res,
                Err(crate::error::CompareError::LeafSetMismatch { .. })
            ));
        }
        assert!(
            matching_distance(&t1, &t2, MatchingKind::Split, &with(MatchingStrategy::FreeLeafSet))
                .is_ok()
        );
    }

    #[test]
    fn test_exact_and_pruned_agree_and_are_symmetric() {
        let trees: Vec<Topology> = TREEDIST.iter().map(|t| topo(t).unrooted().unwrap()).collect();
        for pair in (0..trees.len()).combinations(2) {
            let (a, b) = (&trees[pair[0]], &trees[pair[1]]);
            for kind in [MatchingKind::Split, MatchingKind::Cluster] {
                let exact = distance(a, b, kind, MatchingStrategy::Exact);
                let pruned = distance(a, b, kind, MatchingStrategy::RfPruned);
                assert_eq!(exact, pruned, "{kind:?} {pair:?}");
                assert_eq!(exact, distance(b, a, kind, MatchingStrategy::Exact));
            }
        }
    }

    #[test]
    fn test_exact_and_pruned_agree_on_rooted_splits() {
        // Left rooted, both root children report the root edge.
        let (t1, t2) = (topo("((A,B),(C,D));"), topo("((A,C),(B,D));"));
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::Exact), 4.0);
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::RfPruned), 4.0);

        let trees: Vec<Topology> = TREEDIST.iter().map(|t| topo(t)).collect();
        for pair in (0..trees.len()).combinations(2) {
            let (a, b) = (&trees[pair[0]], &trees[pair[1]]);
            let exact = distance(a, b, MatchingKind::Split, MatchingStrategy::Exact);
            let pruned = distance(a, b, MatchingKind::Split, MatchingStrategy::RfPruned);
            assert_eq!(exact, pruned, "{pair:?}");
            assert_eq!(exact, distance(b, a, MatchingKind::Split, MatchingStrategy::RfPruned));
        }
    }

    #[test]
    fn test_single_child_nodes_match_once() {
        // (((A,B)),C,D) is read as ((A,B),C,D): {A,B} against {A,C} costs 2.
        let t1 = topo("(((A,B)),C,D);");
        let t2 = topo("((A,C),B,D);");
        for strategy in [MatchingStrategy::Exact, MatchingStrategy::RfPruned] {
            assert_eq!(distance(&t1, &t2, MatchingKind::Cluster, strategy), 2.0, "{strategy:?}");
        }
        assert_eq!(distance(&t1, &t1, MatchingKind::Cluster, MatchingStrategy::Exact), 0.0);
    }

    #[test]
    fn test_cluster_sees_root_position() {
        // Same unrooted tree, different root: clusters differ, splits do not.
        let t1 = topo("((A,B),(C,D));");
        let t2 = topo("(A,(B,(C,D)));");
        assert!(distance(&t1, &t2, MatchingKind::Cluster, MatchingStrategy::Exact) > 0.0);
        let (u1, u2) = (t1.unrooted().unwrap(), t2.unrooted().unwrap());
        assert_eq!(distance(&u1, &u2, MatchingKind::Split, MatchingStrategy::Exact), 0.0);
    }

    #[test]
    fn test_alignment_reports_pairs() {
        let t1 = topo("(A,B,(C,(D,E)));");
        let t2 = topo("(A,C,(B,(D,E)));");
        let config = CompareConfig::builder().alignments(true).build();
        let outcome = matching_distance(&t1, &t2, MatchingKind::Split, &config).unwrap();
        assert_eq!(outcome.distance, 2.0);

        let alignment = outcome.alignment.unwrap();
        assert_eq!(alignment.total_cost, 2);
        assert!(!alignment.use_clusters);
        assert_eq!(alignment.pairs.len(), 2);

        let shared = alignment.pairs[0];
        assert_eq!(shared.cost, 0);
        assert_eq!(node_label(&t1, shared.first.unwrap()), "(D,E)");
        assert_eq!(node_label(&t2, shared.second.unwrap()), "(D,E)");

        let moved = alignment.pairs[1];
        assert_eq!(moved.cost, 2);
        assert_eq!(node_label(&t1, moved.first.unwrap()), "(C,D,E)");
        assert_eq!(node_label(&t2, moved.second.unwrap()), "(B,D,E)");

        let summed: u64 = alignment.pairs.iter().map(|p| u64::from(p.cost)).sum();
        assert_eq!(summed, alignment.total_cost);

        let lines = alignment.labelled(&t1, &t2);
        assert_eq!(lines[1].first, "(C,D,E)");
        assert_eq!(lines[1].second, "(B,D,E)");
        assert_eq!(lines[1].cost, 2);
    }

    #[test]
    fn test_alignment_pads_with_missing_nodes() {
        let t1 = topo("(A,B,(C,(D,E)));");
        let t2 = topo("(A,B,C,D,E);");
        let config = CompareConfig::builder().alignments(true).build();
        let outcome = matching_distance(&t1, &t2, MatchingKind::Cluster, &config).unwrap();
        // {D,E} and {C,D,E} against nothing.
        assert_eq!(outcome.distance, 5.0);
        let alignment = outcome.alignment.unwrap();
        assert!(alignment.use_clusters);
        assert!(alignment.pairs.iter().all(|p| p.first.is_some() && p.second.is_none()));
        assert!(alignment.labelled(&t1, &t2).iter().all(|line| line.second == "-"));
    }

    #[test]
    fn test_free_cluster_small_case() {
        // Nodes A, B, (A,B) against A, C, (A,C): A-A 0, B-C 2, root-root 2.
        let t1 = topo("(A,B);");
        let t2 = topo("(A,C);");
        assert_eq!(distance(&t1, &t2, MatchingKind::Cluster, MatchingStrategy::FreeLeafSet), 4.0);
        assert_eq!(distance(&t2, &t1, MatchingKind::Cluster, MatchingStrategy::FreeLeafSet), 4.0);
    }

    #[test]
    fn test_free_split_symmetric_and_positive() {
        let t1 = topo("((A,B),(C,D),E);");
        let t2 = topo("((A,C),(B,F),E);");
        let d12 = distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::FreeLeafSet);
        let d21 = distance(&t2, &t1, MatchingKind::Split, MatchingStrategy::FreeLeafSet);
        assert!(d12 > 0.0);
        assert_eq!(d12, d21);
    }

    #[test]
    fn test_free_split_known_values() {
        // L1 = {A,B,C}, L2 = {A,B,D}, E = 6. Splits agree at most on the two
        // shared leaves, so each of the four pairs costs 6 - 2·2 = 2.
        let t1 = topo("((A,B),C);");
        let t2 = topo("((A,B),D);");
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::FreeLeafSet), 4.0);

        // L1 = {A,B}, L2 = {A,B,C}, E = 5. A-A and B-B cost 1, the spare C
        // costs E - |1 - 2| = 4: (1 + 1 + 4) / 2.
        let t1 = topo("(A,B);");
        let t2 = topo("(A,B,C);");
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::FreeLeafSet), 3.0);
        assert_eq!(distance(&t2, &t1, MatchingKind::Split, MatchingStrategy::FreeLeafSet), 3.0);
    }

    #[test]
    fn test_free_split_matches_exact_on_shared_leaves() {
        let t1 = topo("(A,B,(C,(D,(E,F))));");
        let t2 = topo("(A,C,(B,(E,(D,F))));");
        let exact = distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::Exact);
        assert_eq!(exact, 4.0);
        assert_eq!(distance(&t1, &t2, MatchingKind::Split, MatchingStrategy::FreeLeafSet), exact);
        assert_eq!(distance(&t1, &t1, MatchingKind::Split, MatchingStrategy::FreeLeafSet), 0.0);
    }

    #[test]
    fn test_subtree_leaves_range() {
        let t = topo("((A,B),(C,(D,E)));");
        let root = t.root();
        assert_eq!(subtree_leaves(&t, root).count(), 5);
        assert_eq!(node_label(&t, root), "(A,B,C,D,E)");
        assert_eq!(node_label(&t, t.leaves()[2]), "C");
    }
}
