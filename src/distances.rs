//! Metric catalogue and tree-pair dispatch.
//!
//! This module ties the individual distance implementations together:
//!
//! 1. **Matching Split / Matching Cluster** (`ms`, `mc`): optimal one-to-one
//!    pairing of splits or clusters, see [`crate::matching`].
//!
//! 2. **Robinson-Foulds** (`rf`, `rc`): number of splits (or clusters) found
//!    in only one of the trees, halved.
//!
//! 3. **Nodal distances** (`ns`, `nsl2`) and **Triplet** (`tt`): leaf-pair
//!    matrix metrics, see [`crate::combinatorics`].
//!
//! Every comparison goes through [`compare_pair`], which equalises leaf sets
//! (pruning) and unroots split metrics before handing the pair to the
//! metric. Batch drivers ([`all_pairs`], [`against_references`]) run pairs
//! in parallel with `rayon`; each comparison owns all of its scratch state.

use crate::combinatorics;
use crate::config::{CompareConfig, MatchingStrategy};
use crate::error::{CompareError, Result};
use crate::matching::{self, LabelledPair, MatchingKind};
use crate::registry::{self, LeafRegistry};
use crate::snapshot::{PartitionKind, TreeSnapshot};
use crate::topology::Topology;
use log::{debug, error};
use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Distances that can be requested for a tree pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MatchingSplit,
    MatchingCluster,
    RobinsonFoulds,
    RobinsonFouldsCluster,
    NodalL2,
    NodalSplittedL2,
    Triplet,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::MatchingSplit,
        Metric::MatchingCluster,
        Metric::RobinsonFoulds,
        Metric::RobinsonFouldsCluster,
        Metric::NodalL2,
        Metric::NodalSplittedL2,
        Metric::Triplet,
    ];

    /// Short code used on the command line and in output headers.
    pub fn code(self) -> &'static str {
        match self {
            Metric::MatchingSplit => "ms",
            Metric::MatchingCluster => "mc",
            Metric::RobinsonFoulds => "rf",
            Metric::RobinsonFouldsCluster => "rc",
            Metric::NodalL2 => "ns",
            Metric::NodalSplittedL2 => "nsl2",
            Metric::Triplet => "tt",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::MatchingSplit => "Matching Split",
            Metric::MatchingCluster => "Matching Cluster",
            Metric::RobinsonFoulds => "Robinson-Foulds",
            Metric::RobinsonFouldsCluster => "Robinson-Foulds (clusters)",
            Metric::NodalL2 => "Nodal L2 (path difference)",
            Metric::NodalSplittedL2 => "Nodal L2 (splitted)",
            Metric::Triplet => "Triplet",
        }
    }

    /// Rooted metrics compare clusters and keep the root as given. The
    /// others compare splits and collapse a bifurcating root first.
    pub fn is_rooted(self) -> bool {
        matches!(
            self,
            Metric::MatchingCluster
                | Metric::RobinsonFouldsCluster
                | Metric::NodalSplittedL2
                | Metric::Triplet
        )
    }

    fn matching_kind(self) -> Option<MatchingKind> {
        match self {
            Metric::MatchingSplit => Some(MatchingKind::Split),
            Metric::MatchingCluster => Some(MatchingKind::Cluster),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Metric {
    type Err = CompareError;

    fn from_str(code: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| CompareError::UnknownMetric(code.to_string()))
    }
}

/// Alignment of a matching comparison with nodes printed as labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentReport {
    pub lines: Vec<LabelledPair>,
    pub total_cost: u64,
}

/// Result of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub distance: f64,
    pub alignment: Option<AlignmentReport>,
}

/// Outcome of a comparison inside a batch: `first` and `second` index the
/// input slices the batch was run on.
#[derive(Debug, Clone, PartialEq)]
pub struct PairRecord {
    pub first: usize,
    pub second: usize,
    pub outcome: PairOutcome,
}

/// Compare two trees with one metric.
///
/// # Steps
/// 1. Leaf sets that differ are restricted to their common leaves when
///    pruning is on. Otherwise only the free-leaf-set matching strategy
///    accepts them.
/// 2. Split metrics collapse a bifurcating root unless the run treats trees
///    as rooted.
/// 3. The metric runs on the prepared pair.
///
/// # Errors
/// - `LeafSetMismatch` for differing leaf sets that the run cannot handle.
/// - `DegenerateInput` when pruning leaves no common leaf.
/// - `NumericOverflow` from the matching metrics.
pub fn compare_pair(
    first: &Topology,
    second: &Topology,
    metric: Metric,
    config: &CompareConfig,
) -> Result<PairOutcome> {
    let free = metric.matching_kind().is_some() && config.strategy() == MatchingStrategy::FreeLeafSet;
    let (first, second) = equalize_leaves(first, second, config.prune(), free)?;
    let (first, second) = if metric.is_rooted() || config.rooted() {
        (first, second)
    } else {
        (Cow::Owned(first.unrooted()?), Cow::Owned(second.unrooted()?))
    };

    let distance = match metric {
        Metric::MatchingSplit | Metric::MatchingCluster => {
            let kind = if metric == Metric::MatchingSplit {
                MatchingKind::Split
            } else {
                MatchingKind::Cluster
            };
            let outcome = matching::matching_distance(&first, &second, kind, config)?;
            let alignment = outcome.alignment.map(|a| AlignmentReport {
                lines: a.labelled(&first, &second),
                total_cost: a.total_cost,
            });
            return Ok(PairOutcome {
                distance: outcome.distance,
                alignment,
            });
        }
        Metric::RobinsonFoulds => rf_distance(&first, &second, PartitionKind::Split)?,
        Metric::RobinsonFouldsCluster => rf_distance(&first, &second, PartitionKind::Cluster)?,
        Metric::NodalL2 => {
            let registry = LeafRegistry::shared(&first, &second)?;
            combinatorics::nodal_l2(&first, &second, &registry)?
        }
        Metric::NodalSplittedL2 => {
            let registry = LeafRegistry::shared(&first, &second)?;
            combinatorics::nodal_split_l2(&first, &second, &registry)?
        }
        Metric::Triplet => {
            let registry = LeafRegistry::shared(&first, &second)?;
            combinatorics::triplet_distance(&first, &second, &registry)? as f64
        }
    };
    Ok(PairOutcome {
        distance,
        alignment: None,
    })
}

/// Bring both trees onto the same leaf set, or report why that is not
/// possible.
fn equalize_leaves<'a>(
    first: &'a Topology,
    second: &'a Topology,
    prune: bool,
    free: bool,
) -> Result<(Cow<'a, Topology>, Cow<'a, Topology>)> {
    let borrowed = (Cow::Borrowed(first), Cow::Borrowed(second));
    if registry::same_leaf_set(first, second) {
        return Ok(borrowed);
    }
    if prune {
        let common = registry::common_leaves(first, second);
        debug!(
            "pruning {} and {} leaves to {} common leaves",
            first.leaf_count(),
            second.leaf_count(),
            common.len()
        );
        let keep = |name: &str| common.contains(name);
        return Ok((
            Cow::Owned(first.restricted_to(keep)?),
            Cow::Owned(second.restricted_to(keep)?),
        ));
    }
    if free {
        return Ok(borrowed);
    }
    // Reports how far the leaf sets are apart.
    LeafRegistry::shared(first, second).map(|_| borrowed)
}

/// Robinson-Foulds distance: `(N1 + N2) / 2 - common`, where `N1`, `N2` are
/// the numbers of partitions of each tree and `common` those found in both.
///
/// # Example
/// ```text
/// Tree 1:  (A,B,(C,D))     Splits: {A,B}|{C,D}
/// Tree 2:  (A,C,(B,D))     Splits: {A,C}|{B,D}
///
/// Common: 0
/// RF = (1 + 1) / 2 - 0 = 1
/// ```
///
/// Trees on three or fewer leaves have no non-trivial split, so the split
/// distance is 0 for them.
pub fn rf_distance(first: &Topology, second: &Topology, kind: PartitionKind) -> Result<f64> {
    let registry = LeafRegistry::shared(first, second)?;
    if kind == PartitionKind::Split && registry.len() <= 3 {
        return Ok(0.0);
    }
    let a = TreeSnapshot::from_topology(first, &registry, kind)?;
    let b = TreeSnapshot::from_topology(second, &registry, kind)?;
    Ok(rf_from_snapshots(&a, &b))
}

/// Compute Robinson-Foulds distance from two pre-computed snapshots.
pub fn rf_from_snapshots(a: &TreeSnapshot, b: &TreeSnapshot) -> f64 {
    let common = a.common_count(b);
    (a.len() + b.len()) as f64 / 2.0 - common as f64
}

/// Distance between two `phylotree` trees.
///
/// # Errors
/// Conversion errors (unnamed leaves, malformed trees) and every error of
/// [`compare_pair`].
pub fn tree_distance(
    tree_a: &PhyloTree,
    tree_b: &PhyloTree,
    metric: Metric,
    config: &CompareConfig,
) -> Result<f64> {
    let a = Topology::from_phylo(tree_a)?;
    let b = Topology::from_phylo(tree_b)?;
    Ok(compare_pair(&a, &b, metric, config)?.distance)
}

/// Convert a batch of `phylotree` trees once, before any comparison runs.
pub fn build_topologies(trees: &[PhyloTree]) -> Result<Vec<Topology>> {
    trees.iter().map(Topology::from_phylo).collect()
}

/// Every unordered pair `(i, j)`, `i < j`, in row-major order.
///
/// # Errors
/// The first failing comparison aborts the batch; every failure is logged
/// with the indices of its pair.
pub fn all_pairs(trees: &[Topology], metric: Metric, config: &CompareConfig) -> Result<Vec<PairRecord>> {
    let n = trees.len();
    (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| {
            compare_pair(&trees[i], &trees[j], metric, config)
                .map(|outcome| PairRecord {
                    first: i,
                    second: j,
                    outcome,
                })
                .inspect_err(|e| error!("{metric} on trees {i} and {j} failed: {e}"))
        })
        .collect()
}

/// Every reference tree against every input tree. `first` indexes
/// `references`, `second` indexes `trees`.
pub fn against_references(
    references: &[Topology],
    trees: &[Topology],
    metric: Metric,
    config: &CompareConfig,
) -> Result<Vec<PairRecord>> {
    (0..references.len())
        .into_par_iter()
        .flat_map_iter(|r| (0..trees.len()).map(move |t| (r, t)))
        .map(|(r, t)| {
            compare_pair(&references[r], &trees[t], metric, config)
                .map(|outcome| PairRecord {
                    first: r,
                    second: t,
                    outcome,
                })
                .inspect_err(|e| error!("{metric} on reference {r} and tree {t} failed: {e}"))
        })
        .collect()
}

/// Symmetric `n × n` matrix from all-pairs records; the diagonal is 0.
pub fn distance_matrix(n: usize, records: &[PairRecord]) -> Vec<Vec<f64>> {
    let mut mat = vec![vec![0.0f64; n]; n];
    for rec in records {
        mat[rec.first][rec.second] = rec.outcome.distance;
        mat[rec.second][rec.first] = rec.outcome.distance;
    }
    mat
}

/// Pairwise matrix of one metric over a tree collection.
pub fn pairwise_matrix(trees: &[Topology], metric: Metric, config: &CompareConfig) -> Result<Vec<Vec<f64>>> {
    let records = all_pairs(trees, metric, config)?;
    Ok(distance_matrix(trees.len(), &records))
}
