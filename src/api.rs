//! Python binding layer for tree distance calculations.
//!
//! Provides Python functions for computing matching-based and related tree
//! distances from BEAST/NEXUS or Newick tree files, or from Newick strings.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{CompareConfig, MatchingStrategy};
use crate::distances::{against_references, compare_pair, pairwise_matrix, Metric};
use crate::error::CompareError;
use crate::io::read_trees;
use crate::registry::same_leaf_set;
use crate::topology::Topology;

fn value_error(e: CompareError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_strategy(strategy: &str) -> PyResult<MatchingStrategy> {
    match strategy.to_ascii_lowercase().as_str() {
        "exact" => Ok(MatchingStrategy::Exact),
        "rf-pruned" | "rf_pruned" => Ok(MatchingStrategy::RfPruned),
        "free-leaf-set" | "free_leaf_set" => Ok(MatchingStrategy::FreeLeafSet),
        other => Err(PyValueError::new_err(format!(
            "unknown strategy '{other}' (expected exact, rf-pruned or free-leaf-set)"
        ))),
    }
}

fn build_config(strategy: &str, prune: bool, rooted: bool) -> PyResult<CompareConfig> {
    Ok(CompareConfig::builder()
        .strategy(parse_strategy(strategy)?)
        .prune(prune)
        .rooted(rooted)
        .build())
}

/// Compute a pairwise distance matrix from multiple tree files.
///
/// Args:
///     paths: List of file paths to BEAST/NEXUS or Newick tree files
///     metric: One of "ms", "mc", "rf", "rc", "ns", "nsl2", "tt" (default: "ms")
///     strategy: "exact", "rf-pruned" or "free-leaf-set" (default: "exact")
///     prune: Restrict each pair to its common leaves (default: False)
///     rooted: Keep bifurcating roots for split metrics (default: False)
///     burnin_trees: Number of trees to skip at the beginning of each file (default: 0)
///     burnin_states: Minimum STATE value to keep trees (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///
/// Returns:
///     A tuple of (tree_names, distance_matrix) where:
///     - tree_names is a list of tree identifiers
///     - distance_matrix is a 2D list of distances
///
/// Raises:
///     ValueError: If no trees are found, leaf sets differ without pruning, or a comparison fails
#[pyfunction]
#[pyo3(signature = (paths, metric="ms", strategy="exact", prune=false, rooted=false, burnin_trees=0, burnin_states=0, use_real_taxa=true))]
#[allow(clippy::too_many_arguments)]
fn pairwise_distances(
    paths: Vec<String>,
    metric: &str,
    strategy: &str,
    prune: bool,
    rooted: bool,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
    let metric: Metric = metric.parse().map_err(value_error)?;
    let config = build_config(strategy, prune, rooted)?;

    let (tree_names, trees) = read_all_trees(&paths, burnin_trees, burnin_states, use_real_taxa)?;
    if trees.len() < 2 {
        return Err(PyValueError::new_err(
            "Need at least 2 trees to compute pairwise distances",
        ));
    }
    sanity_check_trees(&trees, metric, &config)?;

    let matrix = pairwise_matrix(&trees, metric, &config).map_err(value_error)?;
    Ok((tree_names, matrix))
}

/// Compare every reference tree with every tree of `paths`.
///
/// Returns:
///     A tuple of (reference_names, tree_names, distances) where distances[r][t]
///     is the distance between reference r and tree t.
#[pyfunction]
#[pyo3(signature = (reference_paths, paths, metric="ms", strategy="exact", prune=false, rooted=false, use_real_taxa=true))]
fn reference_distances(
    reference_paths: Vec<String>,
    paths: Vec<String>,
    metric: &str,
    strategy: &str,
    prune: bool,
    rooted: bool,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<String>, Vec<Vec<f64>>)> {
    let metric: Metric = metric.parse().map_err(value_error)?;
    let config = build_config(strategy, prune, rooted)?;

    let (ref_names, refs) = read_all_trees(&reference_paths, 0, 0, use_real_taxa)?;
    let (tree_names, trees) = read_all_trees(&paths, 0, 0, use_real_taxa)?;

    let records = against_references(&refs, &trees, metric, &config).map_err(value_error)?;
    let mut matrix = vec![vec![0.0f64; trees.len()]; refs.len()];
    for rec in records {
        matrix[rec.first][rec.second] = rec.outcome.distance;
    }
    Ok((ref_names, tree_names, matrix))
}

/// Distance between two Newick strings.
#[pyfunction]
#[pyo3(signature = (newick_a, newick_b, metric="ms", strategy="exact", prune=false, rooted=false))]
fn distance(
    newick_a: &str,
    newick_b: &str,
    metric: &str,
    strategy: &str,
    prune: bool,
    rooted: bool,
) -> PyResult<f64> {
    let metric: Metric = metric.parse().map_err(value_error)?;
    let config = build_config(strategy, prune, rooted)?;
    let a = Topology::from_newick(newick_a).map_err(value_error)?;
    let b = Topology::from_newick(newick_b).map_err(value_error)?;
    Ok(compare_pair(&a, &b, metric, &config).map_err(value_error)?.distance)
}

/// Helper function to read trees from multiple files
fn read_all_trees(
    paths: &[String],
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Topology>)> {
    let mut all_tree_names = Vec::new();
    let mut all_trees = Vec::new();

    for (file_idx, path) in paths.iter().enumerate() {
        let named_trees = read_trees(path, burnin_trees, burnin_states, use_real_taxa)
            .map_err(value_error)?;

        // Add trees with file prefix in name
        for (name, tree) in named_trees {
            all_tree_names.push(format!("file{}_{}", file_idx, name));
            all_trees.push(Topology::from_phylo(&tree).map_err(value_error)?);
        }
    }

    if all_trees.is_empty() {
        return Err(PyValueError::new_err(
            "No trees found in any of the provided files",
        ));
    }

    Ok((all_tree_names, all_trees))
}

/// Reject collections with differing leaf sets up front, unless the run can
/// handle them (pruning, or free-leaf-set matching).
fn sanity_check_trees(trees: &[Topology], metric: Metric, config: &CompareConfig) -> PyResult<()> {
    let free = config.strategy() == MatchingStrategy::FreeLeafSet
        && matches!(metric, Metric::MatchingSplit | Metric::MatchingCluster);
    if config.prune() || free {
        return Ok(());
    }
    for (idx, tree) in trees.iter().enumerate().skip(1) {
        if !same_leaf_set(&trees[0], tree) {
            return Err(PyValueError::new_err(format!(
                "Tree {} has different leaf set than tree 0. All trees must have the same taxa (or use prune=True).",
                idx
            )));
        }
    }
    Ok(())
}

/// Python module definition
#[pymodule]
fn matching_tree_distances(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(pairwise_distances, m)?)?;
    m.add_function(wrap_pyfunction!(reference_distances, m)?)?;
    m.add_function(wrap_pyfunction!(distance, m)?)?;
    Ok(())
}
