//! Utility functions shared by manifold implementations.

pub mod hash;
pub mod linalg;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use hash::{combine_hash, compute_hash};
pub use linalg::{mul_to, mul_transpose_to};
