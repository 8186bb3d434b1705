//! Concrete manifolds for the `mnf` geometric kernel.
//!
//! This crate provides the rotation group SO(3) in two charts, the unit
//! sphere S2, Euclidean space R^n, and the Cartesian product that composes
//! them, e.g. the pose space `R³ × SO(3)`.

pub mod euclidean;
pub mod exp_map;
pub mod product;
pub mod s2;
pub mod so3;
pub mod utils;

// Re-export main manifolds for convenience
pub use euclidean::Euclidean;
pub use exp_map::{ExpMap, ExpMapMatrix, ExpMapQuaternion};
pub use product::CartesianProduct;
pub use s2::S2;
pub use so3::{SO3Matrix, SO3Quaternion, SO3};
