//! # mnf
//!
//! A geometric kernel for optimization over manifolds: a uniform interface
//! for retractions, logarithms, their Jacobians and vector transport, with
//! closed-form implementations for the rotation group, the unit sphere and
//! Euclidean space, and a Cartesian product to compose them.
//!
//! ## Features
//!
//! - **Manifolds**: `SO(3)` as rotation matrices or unit quaternions, `S2`,
//!   `R^n`, and products such as the pose space `R³ × SO(3)`
//! - **Caller-owned storage**: every operation reads and writes nalgebra
//!   views, so solvers can work on slices of their own state vectors
//! - **No hot-path allocation**: in-place variants stage through a
//!   [`ReusableBuffer`]
//! - **Checked contracts**: size mismatches and invalid inputs are reported
//!   as [`ManifoldError`]s
//!
//! ## Quick Start
//!
//! ```rust
//! use mnf::prelude::*;
//!
//! let r3 = Euclidean::<f64>::new(3).unwrap();
//! let so3 = SO3Quaternion::<f64>::new().unwrap();
//! let pose = CartesianProduct::from_pair(&r3, &so3).unwrap();
//! assert_eq!(pose.name(), "R3xSO3");
//!
//! let x = pose.identity().unwrap();
//! let v = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.5]);
//! let mut y = DVector::zeros(7);
//! pose.plus((&mut y).into(), (&x).into(), (&v).into()).unwrap();
//!
//! let mut back = DVector::zeros(6);
//! pose.minus((&mut back).into(), (&y).into(), (&x).into()).unwrap();
//! assert!((back - v).norm() < 1e-12);
//! ```

// Re-export core functionality
pub use mnf_core::{
    constants, contract, error, format_row, manifold, types, utils, DMatrix, DVector, Manifold,
    ManifoldBase, ManifoldError, ManifoldInfo, MatMut, MatRef, Result, ReusableBuffer, SMatrix,
    SVector, Scalar, VecMut, VecRef,
};

// Re-export manifolds
pub use mnf_manifolds::{
    CartesianProduct, Euclidean, ExpMap, ExpMapMatrix, ExpMapQuaternion, S2, SO3Matrix,
    SO3Quaternion, SO3,
};

pub use nalgebra;

/// Prelude module for convenient imports
pub mod prelude {
    pub use mnf_core::prelude::*;
    pub use mnf_manifolds::{
        CartesianProduct, Euclidean, ExpMap, ExpMapMatrix, ExpMapQuaternion, S2, SO3Matrix,
        SO3Quaternion, SO3,
    };
}
