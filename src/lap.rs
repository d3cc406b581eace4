//! Linear assignment: minimum-cost perfect matching on a square cost matrix.
//!
//! # Algorithm
//! Shortest augmenting paths with dual potentials (Hungarian method in its
//! O(n³) form). Rows are inserted one at a time; for each new row a Dijkstra
//! style scan over the reduced costs `c[i][j] - u[i] - v[j]` finds the
//! cheapest augmenting path, potentials are shifted by the smallest slack and
//! the path is flipped.
//!
//! Reduced costs stay non-negative throughout, so the scan never needs a
//! heap. Costs are `u32` on input and summed as `u64`; potentials are kept in
//! `i64`, which comfortably holds `n * u32::MAX` for any matrix that fits in
//! memory.
//!
//! The matrix always comes from a matching metric: rows are clusters of the
//! first tree, columns clusters of the second one, padded with dummy rows or
//! columns so the matrix is square.

use crate::error::{CompareError, Result};

/// Dense square matrix of non-negative costs, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMatrix {
    n: usize,
    cells: Vec<u32>,
}

impl CostMatrix {
    pub fn zeros(n: usize) -> Self {
        CostMatrix {
            n,
            cells: vec![0; n * n],
        }
    }

    /// Build from explicit rows.
    ///
    /// # Errors
    /// `DegenerateInput` if the rows do not form a square matrix.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != n) {
            return Err(CompareError::DegenerateInput(format!(
                "cost matrix row {bad} has {} columns, expected {n}",
                rows[bad].len()
            )));
        }
        Ok(CostMatrix {
            n,
            cells: rows.iter().flatten().copied().collect(),
        })
    }

    /// Store a cost computed in a wider type.
    ///
    /// # Errors
    /// `NumericOverflow` if `cost` does not fit the cell width.
    pub fn set(&mut self, row: usize, col: usize, cost: u64) -> Result<()> {
        let cost = u32::try_from(cost).map_err(|_| {
            CompareError::NumericOverflow(format!("cost {cost} at ({row}, {col})"))
        })?;
        self.cells[row * self.n + col] = cost;
        Ok(())
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[row * self.n + col]
    }

    pub fn size(&self) -> usize {
        self.n
    }
}

/// Optimal assignment: a permutation and its cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Column assigned to every row.
    pub row_to_col: Vec<usize>,
    /// Row assigned to every column (inverse of `row_to_col`).
    pub col_to_row: Vec<usize>,
    pub total: u64,
}

/// Solve the assignment problem for `costs`.
///
/// An empty matrix yields an empty assignment with total 0.
pub fn solve(costs: &CostMatrix) -> Assignment {
    let n = costs.size();
    if n == 0 {
        return Assignment {
            row_to_col: Vec::new(),
            col_to_row: Vec::new(),
            total: 0,
        };
    }

    // 1-based: index 0 is a virtual column used as the path origin.
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];
    let mut minv = vec![i64::MAX; n + 1];
    let mut used = vec![false; n + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0usize;
        minv.fill(i64::MAX);
        used.fill(false);

        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = i64::MAX;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = i64::from(costs.get(i0 - 1, j - 1)) - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the origin.
        while j0 != 0 {
            let prev = way[j0];
            owner[j0] = owner[prev];
            j0 = prev;
        }
    }

    let mut row_to_col = vec![0usize; n];
    let mut col_to_row = vec![0usize; n];
    for col in 1..=n {
        row_to_col[owner[col] - 1] = col - 1;
        col_to_row[col - 1] = owner[col] - 1;
    }
    let total = row_to_col
        .iter()
        .enumerate()
        .map(|(r, &c)| u64::from(costs.get(r, c)))
        .sum();

    Assignment {
        row_to_col,
        col_to_row,
        total,
    }
}
