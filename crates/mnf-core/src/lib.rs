//! Core traits and types for manifold geometry kernels.
//!
//! This crate provides the foundations shared by every concrete manifold: the
//! scalar trait, the view aliases used as argument convention, the error type
//! and contract checks, the [`Manifold`] trait with its structural
//! bookkeeping, and the scratch storage that keeps hot paths allocation-free.
//!
//! # Key Concepts
//!
//! - **Representation vs. tangent space**: points are stored in `R^r`,
//!   increments live in `R^t`, and `r ≥ t ≥ dim`.
//! - **Views**: operations read [`VecRef`]/[`MatRef`] and write
//!   [`VecMut`]/[`MatMut`]; callers own all storage.
//! - **Contracts**: size checks return errors by default and abort with the
//!   `fatal-contracts` feature.
//!
//! # Modules
//!
//! - [`core`]: scalars and views, errors, contracts, the manifold trait
//! - [`memory`]: reusable scratch buffers
//! - [`utils`]: structural hashes and non-allocating products

pub mod core;
pub mod memory;
pub mod utils;

// Re-export commonly used items at the crate root
pub use crate::core::{
    contract,
    error::{self, ManifoldError, Result},
    manifold::{self, format_row, Manifold, ManifoldBase, ManifoldInfo},
    types::{self, constants, DMatrix, DVector, MatMut, MatRef, SMatrix, SVector, Scalar, VecMut, VecRef},
};
pub use crate::memory::ReusableBuffer;

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use mnf_core::prelude::*;
///
/// let mut buffer = ReusableBuffer::<f64>::new();
/// assert_eq!(buffer.get_vector(3).len(), 3);
/// ```
pub mod prelude {
    pub use crate::core::error::{ManifoldError, Result};
    pub use crate::core::manifold::{Manifold, ManifoldBase, ManifoldInfo};
    pub use crate::core::types::{
        constants, DMatrix, DVector, MatMut, MatRef, SMatrix, SVector, Scalar, VecMut, VecRef,
    };
    pub use crate::memory::ReusableBuffer;
}
