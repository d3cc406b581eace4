//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `topology`: postorder node arena built from `phylotree` trees.
//! - `registry`: leaf name → dense id mapping shared by a tree pair.
//! - `clade`, `intersect`: clade sizes and the clade-intersection matrix.
//! - `lap`: cost matrix and assignment solver.
//! - `bitset`, `snapshot`: bitset partitions for RF and the RF-pruned path.
//! - `matching`: Matching Split / Matching Cluster in three strategies.
//! - `combinatorics`: LCA / nodal-split matrices and triplet counts.
//! - `distances`: metric catalogue, pair dispatch and batch drivers.
//! - `config`, `error`: run settings and the shared error type.
//! - `io`: reading BEAST/NEXUS and Newick files, writing TSV output.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod clade;
pub mod combinatorics;
pub mod config;
pub mod distances;
pub mod error;
pub mod intersect;
pub mod io;
pub mod lap;
pub mod matching;
pub mod registry;
pub mod snapshot;
pub mod topology;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use config::{CompareConfig, MatchingStrategy};
pub use distances::{compare_pair, pairwise_matrix, Metric, PairOutcome};
pub use error::{CompareError, Result};
pub use io::{read_beast_trees, read_trees, write_matrix_tsv};
pub use topology::Topology;
