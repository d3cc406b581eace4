//! Leaf-pair matrices and triplet counting.
//!
//! # LCA and nodal-split matrices
//! One postorder sweep. Every node hands its parent the list of leaves below
//! it (with their distance to the node). At an internal node the lists of
//! different children are cross-multiplied: a leaf pair meets for the first
//! time exactly there, so the node is their LCA and the recorded distances
//! are the leaf-to-LCA path lengths. Every pair is produced once, giving
//! O(n²) total work for a tree on n leaves.
//!
//! Matrices are indexed by registry id, so matrices of two trees built with
//! the same registry can be compared cell by cell.
//!
//! # Resolved triplets
//! A triplet `{a, b, c}` is resolved as `ab|c` in a rooted tree when some
//! non-root cluster contains `a` and `b` but not `c`. Counting, per cluster
//! `v`, the pairs inside `v` whose LCA is `v` itself times the leaves
//! outside `v` gives the number of resolved triplets without enumerating
//! them:
//!
//! ```text
//! R(T) = Σ_v [ C(|v|, 2) - Σ_{x child of v} C(|x|, 2) ] · (n - |v|)
//! ```
//!
//! The same inclusion-exclusion over pairs of clusters `(u, v)` with
//! `|u ∩ v|` in place of `|v|` counts triplets resolved identically in two
//! trees.

use crate::clade::CladeSizes;
use crate::error::{CompareError, Result};
use crate::intersect::ClustIntersectMatrix;
use crate::registry::LeafRegistry;
use crate::topology::{NodeIdx, NodeKind, Topology};
use std::collections::HashMap;

/// Dense `n × n` matrix over registry ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPairMatrix<T> {
    n: usize,
    cells: Vec<T>,
}

impl<T: Copy> LeafPairMatrix<T> {
    fn filled(n: usize, value: T) -> Self {
        LeafPairMatrix {
            n,
            cells: vec![value; n * n],
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.cells[i * self.n + j]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, value: T) {
        self.cells[i * self.n + j] = value;
    }

    pub fn size(&self) -> usize {
        self.n
    }
}

/// Postorder sweep calling `meet(lca, (id_a, dist_a), (id_b, dist_b))` once
/// for every unordered leaf pair, where `dist_*` is the edge count from the
/// leaf up to `lca`.
fn sweep_leaf_pairs<F>(tree: &Topology, aliases: &[usize], mut meet: F)
where
    F: FnMut(NodeIdx, (usize, u32), (usize, u32)),
{
    let mut below: Vec<Vec<(usize, u32)>> = vec![Vec::new(); tree.len()];
    for node in tree.postorder() {
        if let NodeKind::Leaf { rank } = tree.kind(node) {
            below[node].push((aliases[rank], 0));
            continue;
        }
        let mut groups: Vec<Vec<(usize, u32)>> = Vec::with_capacity(tree.children(node).len());
        for &child in tree.children(node) {
            let mut group = std::mem::take(&mut below[child]);
            for entry in &mut group {
                entry.1 += 1;
            }
            groups.push(group);
        }
        for (j, first) in groups.iter().enumerate() {
            for second in &groups[j + 1..] {
                for &a in first {
                    for &b in second {
                        meet(node, a, b);
                    }
                }
            }
        }
        below[node] = groups.concat();
    }
}

/// `lca[i][j]`: node index of the lowest common ancestor of leaves `i` and
/// `j` (registry ids). The diagonal holds the leaf node itself.
///
/// # Errors
/// `UnknownLeaf` if `tree` has a leaf missing from `registry`.
pub fn lca_matrix(tree: &Topology, registry: &LeafRegistry) -> Result<LeafPairMatrix<NodeIdx>> {
    let aliases = registry.aliases(tree)?;
    let mut lca = LeafPairMatrix::filled(registry.len(), 0);
    for (rank, &leaf) in tree.leaves().iter().enumerate() {
        lca.set(aliases[rank], aliases[rank], leaf);
    }
    sweep_leaf_pairs(tree, &aliases, |node, (a, _), (b, _)| {
        lca.set(a, b, node);
        lca.set(b, a, node);
    });
    Ok(lca)
}

/// `m[i][j]`: number of edges from leaf `i` up to `LCA(i, j)`. Not
/// symmetric; `m[i][j] + m[j][i]` is the path length between the leaves.
///
/// # Errors
/// `UnknownLeaf` if `tree` has a leaf missing from `registry`.
pub fn nodal_split_matrix(tree: &Topology, registry: &LeafRegistry) -> Result<LeafPairMatrix<u32>> {
    let aliases = registry.aliases(tree)?;
    let mut m = LeafPairMatrix::filled(registry.len(), 0);
    sweep_leaf_pairs(tree, &aliases, |_, (a, da), (b, db)| {
        m.set(a, b, da);
        m.set(b, a, db);
    });
    Ok(m)
}

#[inline]
pub fn choose2(n: u64) -> u64 {
    if n < 2 { 0 } else { n * (n - 1) / 2 }
}

#[inline]
pub fn choose3(n: u64) -> u64 {
    if n < 3 { 0 } else { n * (n - 1) * (n - 2) / 6 }
}

/// Number of triplets resolved by the rooted tree `tree`.
pub fn resolved_triplets(tree: &Topology, sizes: &CladeSizes) -> u64 {
    let n = tree.leaf_count() as u64;
    tree.internals()
        .iter()
        .enumerate()
        .filter(|&(_, &node)| !tree.is_root(node))
        .map(|(rank, &node)| {
            let alpha = u64::from(sizes.internal(rank));
            let inner: u64 = tree
                .children(node)
                .iter()
                .filter_map(|&x| tree.internal_rank(x))
                .map(|rx| choose2(u64::from(sizes.internal(rx))))
                .sum();
            (choose2(alpha) - inner) * (n - alpha)
        })
        .sum()
}

/// Number of triplets resolved, and resolved the same way, in both trees of
/// `cim` (which must share one leaf set).
pub fn resolved_and_equal_triplets(cim: &ClustIntersectMatrix<'_>) -> u64 {
    let (t1, t2) = (cim.first(), cim.second());
    let n = t1.leaf_count() as i64;
    let c2 = |x: u32| choose2(u64::from(x)) as i64;

    let mut total = 0i64;
    for (ru, &u) in t1.internals().iter().enumerate() {
        if t1.is_root(u) {
            continue;
        }
        let xs: Vec<usize> = t1.children(u).iter().filter_map(|&x| t1.internal_rank(x)).collect();
        for (rv, &v) in t2.internals().iter().enumerate() {
            if t2.is_root(v) {
                continue;
            }
            let ys: Vec<usize> = t2.children(v).iter().filter_map(|&y| t2.internal_rank(y)).collect();

            let uv = cim.inter_internal(ru, rv);
            // Leaves outside both clusters.
            let outside = n
                - (i64::from(cim.sizes1().internal(ru)) + i64::from(cim.sizes2().internal(rv))
                    - i64::from(uv));
            let n1 = c2(uv);
            let n2: i64 = xs.iter().map(|&rx| c2(cim.inter_internal(rx, rv))).sum();
            let n3: i64 = ys.iter().map(|&ry| c2(cim.inter_internal(ru, ry))).sum();
            let n4: i64 = xs
                .iter()
                .flat_map(|&rx| ys.iter().map(move |&ry| (rx, ry)))
                .map(|(rx, ry)| c2(cim.inter_internal(rx, ry)))
                .sum();
            total += (n1 - n2 - n3 + n4) * outside;
        }
    }
    debug_assert!(total >= 0);
    total as u64
}

/// Path-difference distance on topological leaf-to-leaf distances:
/// `sqrt(Σ_{i<j} (d1(i,j) - d2(i,j))²)`.
pub fn nodal_l2(first: &Topology, second: &Topology, registry: &LeafRegistry) -> Result<f64> {
    let m1 = nodal_split_matrix(first, registry)?;
    let m2 = nodal_split_matrix(second, registry)?;
    let n = registry.len();
    let mut sum = 0.0;
    for i in 0..n {
        for j in i + 1..n {
            let d1 = i64::from(m1.get(i, j)) + i64::from(m1.get(j, i));
            let d2 = i64::from(m2.get(i, j)) + i64::from(m2.get(j, i));
            let diff = (d1 - d2) as f64;
            sum += diff * diff;
        }
    }
    Ok(sum.sqrt())
}

/// L2 distance between the nodal-split matrices: `sqrt(Σ_{i,j} (m1 - m2)²)`.
pub fn nodal_split_l2(first: &Topology, second: &Topology, registry: &LeafRegistry) -> Result<f64> {
    let m1 = nodal_split_matrix(first, registry)?;
    let m2 = nodal_split_matrix(second, registry)?;
    let sum: f64 = m1
        .cells
        .iter()
        .zip(&m2.cells)
        .map(|(&a, &b)| {
            let diff = f64::from(a) - f64::from(b);
            diff * diff
        })
        .sum();
    Ok(sum.sqrt())
}

/// Number of triplets whose rooted topology differs between the trees.
///
/// Fully resolved trees go through the LCA-pattern count in O(n²); any
/// other pair is enumerated triplet by triplet.
pub fn triplet_distance(first: &Topology, second: &Topology, registry: &LeafRegistry) -> Result<u64> {
    if first.is_binary(true) && second.is_binary(true) {
        triplet_distance_binary(first, second, registry)
    } else {
        triplet_distance_general(first, second, registry)
    }
}

/// For leaf `x`, two other leaves `i`, `j` form a triplet resolved the same
/// way around `x` in both trees when `(lca1(x,i), lca2(x,i)) ==
/// (lca1(x,j), lca2(x,j))`. Summing `C(count, 2)` over the patterns of every
/// `x` counts each triplet agreeing in both trees exactly once.
fn triplet_distance_binary(first: &Topology, second: &Topology, registry: &LeafRegistry) -> Result<u64> {
    let lca1 = lca_matrix(first, registry)?;
    let lca2 = lca_matrix(second, registry)?;
    let n = registry.len();

    let mut common = 0u64;
    let mut patterns: HashMap<(NodeIdx, NodeIdx), u64> = HashMap::with_capacity(n);
    for x in 0..n {
        patterns.clear();
        for i in (0..n).filter(|&i| i != x) {
            *patterns.entry((lca1.get(x, i), lca2.get(x, i))).or_insert(0) += 1;
        }
        common += patterns.values().map(|&count| choose2(count)).sum::<u64>();
    }
    choose3(n as u64).checked_sub(common).ok_or_else(|| {
        CompareError::DegenerateInput("triplet pattern count exceeds the number of triplets".to_string())
    })
}

/// Outgroup of `{i, j, k}` read from a nodal-split matrix, or `None` when
/// the triplet is unresolved.
fn triplet_type(i: usize, j: usize, k: usize, m: &LeafPairMatrix<u32>) -> Option<usize> {
    use std::cmp::Ordering;
    match m.get(j, i).cmp(&m.get(j, k)) {
        Ordering::Greater => Some(i),
        Ordering::Less => Some(k),
        Ordering::Equal if m.get(i, j) > m.get(i, k) => Some(j),
        Ordering::Equal => None,
    }
}

fn triplet_distance_general(first: &Topology, second: &Topology, registry: &LeafRegistry) -> Result<u64> {
    let m1 = nodal_split_matrix(first, registry)?;
    let m2 = nodal_split_matrix(second, registry)?;
    let n = registry.len();

    let mut differing = 0u64;
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if triplet_type(i, j, k, &m1) != triplet_type(i, j, k, &m2) {
                    differing += 1;
                }
            }
        }
    }
    Ok(differing)
}
