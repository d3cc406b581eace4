//! Error type shared by every tree-pair comparison.
//!
//! All failures are local to one comparison: a batch driver decides whether
//! to abort or to skip the failing pair.

use phylotree::tree::TreeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompareError {
    /// The two trees carry different leaf sets and neither pruning nor the
    /// free-leaf-set strategy is active.
    #[error("trees have different leaf sets ({only_first} leaves only in the first tree, {only_second} only in the second)")]
    LeafSetMismatch { only_first: usize, only_second: usize },

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A clade size, intersection size or cost does not fit the cost width.
    #[error("numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("tree contains a leaf without a name")]
    UnnamedLeaf,

    #[error("leaf name '{0}' occurs more than once in a tree")]
    DuplicateLeaf(String),

    #[error("leaf name '{0}' is not present in the leaf registry")]
    UnknownLeaf(String),

    #[error("could not parse newick string: {0}")]
    Newick(String),

    #[error("unknown metric '{0}' (expected one of ms, mc, rf, rc, ns, nsl2, tt)")]
    UnknownMetric(String),

    #[error("no trees found in {0}")]
    NoTrees(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CompareError>;
