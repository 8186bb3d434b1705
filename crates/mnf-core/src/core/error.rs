//! Error types for manifold operations.
//!
//! Every fallible operation of the crate returns [`Result`]. Which failures are
//! recoverable is decided by the contract layer (see
//! [`contract`](crate::core::contract)): by default a violated precondition is
//! reported as one of the variants below, with the `fatal-contracts` feature it
//! aborts the process instead.

use std::fmt::Display;
use thiserror::Error;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifoldError {
    /// Point is not on the manifold.
    #[error("Point is not on the manifold: {reason}")]
    InvalidPoint {
        /// Description of why the point is invalid
        reason: String,
    },

    /// Vector is not an admissible tangent increment.
    ///
    /// Also raised when an increment leaves the domain in which a chart is
    /// defined, e.g. a rotation increment whose norm reaches π.
    #[error("Vector is not in the tangent space: {reason}")]
    InvalidTangent {
        /// Description of why the tangent vector is invalid
        reason: String,
    },

    /// Dimension mismatch between a view and the manifold it is passed to.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Numerical failure that no series branch could recover.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// A construction parameter is out of range.
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of the rejected parameter
        reason: String,
    },

    /// Structural change attempted on a manifold owned by a product.
    #[error("Manifold is locked: {reason}")]
    Locked {
        /// Description of the rejected change
        reason: String,
    },
}

impl ManifoldError {
    /// A stored point fails its manifold's membership test.
    pub fn invalid_point(reason: impl Into<String>) -> Self {
        Self::InvalidPoint {
            reason: reason.into(),
        }
    }

    /// An increment is outside the chart's domain.
    pub fn invalid_tangent(reason: impl Into<String>) -> Self {
        Self::InvalidTangent {
            reason: reason.into(),
        }
    }

    /// A view has the wrong length or shape.
    pub fn dimension_mismatch(expected: impl Display, actual: impl Display) -> Self {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// A computation hit a singularity, e.g. normalizing the zero vector.
    pub fn numerical_error(reason: impl Into<String>) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// A constructor or setter argument is out of range.
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// A manifold owned by a product was asked to change, or to join a
    /// second product.
    pub fn locked(reason: impl Into<String>) -> Self {
        Self::Locked {
            reason: reason.into(),
        }
    }
}

/// Result of every fallible manifold operation.
pub type Result<T> = std::result::Result<T, ManifoldError>;
