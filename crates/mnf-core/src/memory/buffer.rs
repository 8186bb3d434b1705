//! Reusable scratch storage for staged results.
//!
//! Some operations cannot write their result directly into the caller's
//! storage, typically the in-place variants where the output is also an
//! input. [`ReusableBuffer`] keeps one scratch matrix per requested shape and
//! hands out views on it, so after a warm-up pass no call allocates.
//!
//! The buffer is owned by the caller and passed explicitly; there is no
//! process-wide pool. Contents of a returned view are unspecified and are
//! overwritten by the next request of the same shape.

use crate::core::types::{DMatrix, MatMut, Scalar, VecMut};
use std::collections::HashMap;

/// Scratch matrices keyed by `(rows, cols)`.
#[derive(Debug, Clone)]
pub struct ReusableBuffer<T: Scalar> {
    entries: HashMap<(usize, usize), DMatrix<T>>,
}

impl<T: Scalar> ReusableBuffer<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Writable view on a `rows x cols` scratch matrix, created on first use.
    pub fn get_map(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        self.entries
            .entry((rows, cols))
            .or_insert_with(|| DMatrix::zeros(rows, cols))
            .view_mut((0, 0), (rows, cols))
    }

    /// Writable view on a scratch vector of length `len`.
    pub fn get_vector(&mut self, len: usize) -> VecMut<'_, T> {
        self.entries
            .entry((len, 1))
            .or_insert_with(|| DMatrix::zeros(len, 1))
            .column_mut(0)
    }

    /// Create the entry for a shape ahead of time.
    pub fn warm(&mut self, rows: usize, cols: usize) {
        self.entries
            .entry((rows, cols))
            .or_insert_with(|| DMatrix::zeros(rows, cols));
    }

    /// Number of distinct shapes held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no scratch matrix has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total memory held by the scratch matrices, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .values()
            .map(|m| m.len() * std::mem::size_of::<T>())
            .sum()
    }

    /// Release every scratch matrix.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Scalar> Default for ReusableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_created_lazily() {
        let mut buffer = ReusableBuffer::<f64>::new();
        assert!(buffer.is_empty());

        let view = buffer.get_map(3, 4);
        assert_eq!(view.shape(), (3, 4));
        assert_eq!(buffer.len(), 1);

        buffer.get_map(3, 4);
        assert_eq!(buffer.len(), 1);

        buffer.get_vector(3);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.memory_usage(), (12 + 3) * 8);
    }

    #[test]
    fn test_contents_persist_between_requests() {
        let mut buffer = ReusableBuffer::<f64>::new();
        buffer.get_vector(4).fill(2.5);
        assert_eq!(buffer.get_vector(4).sum(), 10.0);

        // A vector of length n and an n x 1 map share the same entry.
        assert_eq!(buffer.get_map(4, 1)[(3, 0)], 2.5);
    }

    #[test]
    fn test_warm_and_clear() {
        let mut buffer = ReusableBuffer::<f32>::default();
        buffer.warm(9, 3);
        buffer.warm(9, 3);
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
