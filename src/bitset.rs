//! Compact bitset representation for clusters and splits.
//!
//! # Overview
//! Each bit position corresponds to a leaf id handed out by the
//! [`LeafRegistry`](crate::registry::LeafRegistry). Clades are only
//! materialised as bitsets where exact identity matters (RF metrics and the
//! RF-pruned matching path); the other paths work on sizes alone.
//!
//! # Example
//! For leaves [A, B, C, D] mapped to ids [0, 1, 2, 3]:
//! - Cluster {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Cluster {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)

/// A compact bitset over leaf ids.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 leaf ids.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate as `(num_leaves + 63) / 64`
    ///
    /// # Example
    /// ```
    /// # use matching_tree_distances::bitset::Bitset;
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Creates an empty bitset wide enough for `num_leaves` ids.
    pub fn for_leaves(num_leaves: usize) -> Self {
        Self::zeros(num_leaves.div_ceil(64))
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use matching_tree_distances::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;
        let bit = idx & 63;
        self.0[word] |= 1u64 << bit;
    }

    /// Returns whether leaf `idx` belongs to the set. Ids beyond the
    /// allocated words are reported as absent.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| w & (1u64 << (idx & 63)) != 0)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// # Example
    /// ```
    /// # use matching_tree_distances::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);
    ///
    /// left.or_assign(&right);
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Counts the number of set bits (population count).
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Size of the symmetric difference `|self ∆ other|`.
    ///
    /// ```
    /// # use matching_tree_distances::bitset::Bitset;
    /// let mut a = Bitset::zeros(1);
    /// a.set(0);
    /// a.set(1);
    /// let mut b = Bitset::zeros(1);
    /// b.set(1);
    /// b.set(2);
    /// assert_eq!(a.xor_count(&b), 2);
    /// ```
    #[inline]
    pub fn xor_count(&self, other: &Bitset) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// Size of the intersection `|self ∩ other|`.
    #[inline]
    pub fn and_count(&self, other: &Bitset) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Complement with respect to the first `num_leaves` ids.
    ///
    /// Bits at or above `num_leaves` stay 0 so complements of equal splits
    /// compare (and hash) equal.
    pub fn complement(&self, num_leaves: usize) -> Bitset {
        let mut out = Bitset(self.0.iter().map(|w| !w).collect());
        let tail = num_leaves & 63;
        let full_words = num_leaves >> 6;
        for (i, w) in out.0.iter_mut().enumerate() {
            if i > full_words || (i == full_words && tail == 0) {
                *w = 0;
            } else if i == full_words {
                *w &= (1u64 << tail) - 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = Bitset::zeros(1);
        bs.set(0);
        bs.set(2);
        assert_eq!(bs.0[0], 0b0101);
        assert!(bs.contains(2));
        assert!(!bs.contains(1));
        assert!(!bs.contains(700));
    }

    #[test]
    fn test_bitset_or() {
        let mut bs1 = Bitset::zeros(1);
        bs1.set(0);
        bs1.set(1);

        let mut bs2 = Bitset::zeros(1);
        bs2.set(2);
        bs2.set(3);

        bs1.or_assign(&bs2);
        assert_eq!(bs1.0[0], 0b1111);
    }

    /// ```text
    ///           root
    ///          /    \
    ///        node1   D
    ///        /   \
    ///       A    node2
    ///            /   \
    ///           B     C
    /// ```
    ///
    /// Leaf mapping: A=0, B=1, C=2, D=3
    #[test]
    fn test_mini_tree_example() {
        let mut node2 = Bitset::zeros(1);
        node2.set(1);
        node2.set(2);
        assert_eq!(node2.count_ones(), 2);

        let mut node1 = Bitset::zeros(1);
        node1.set(0);
        node1.or_assign(&node2);
        assert_eq!(node1.0[0], 0b0111);
        assert_eq!(node1.count_ones(), 3);

        // {A,B,C} vs {B,C}: only A differs
        assert_eq!(node1.xor_count(&node2), 1);
        assert_eq!(node1.and_count(&node2), 2);
    }

    #[test]
    fn test_complement_masks_tail() {
        let mut bs = Bitset::for_leaves(5);
        bs.set(0);
        bs.set(1);
        let c = bs.complement(5);
        assert_eq!(c.0[0], 0b11100);
        assert_eq!(c.complement(5), bs);
    }

    #[test]
    fn test_large_tree() {
        let mut bs = Bitset::zeros(2);
        bs.set(0);
        bs.set(63);
        bs.set(64);
        bs.set(127);

        assert_eq!(bs.count_ones(), 4);
        assert!(bs.contains(64) && bs.contains(127));

        let c = bs.complement(128);
        assert_eq!(c.count_ones(), 124);
        let c70 = Bitset::for_leaves(70).complement(70);
        assert_eq!(c70.count_ones(), 70);
        assert_eq!(c70.0[1], (1u64 << 6) - 1);
    }
}
