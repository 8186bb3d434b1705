//! Core abstractions: scalars and views, errors, contracts, the manifold trait.

pub mod contract;
pub mod error;
pub mod manifold;
pub mod types;

pub use error::{ManifoldError, Result};
pub use manifold::{Manifold, ManifoldBase, ManifoldInfo};
pub use types::{DMatrix, DVector, MatMut, MatRef, SMatrix, SVector, Scalar, VecMut, VecRef};
