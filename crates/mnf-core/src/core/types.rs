//! Type definitions and aliases for manifold computations.
//!
//! This module provides the scalar trait every kernel is generic over, the
//! owned matrix aliases, and the view aliases used as the argument convention
//! of all hot-path operations.
//!
//! # Views
//!
//! Operations never take owned vectors. Inputs are [`VecRef`]/[`MatRef`]
//! (read-only, non-owning) and outputs are [`VecMut`]/[`MatMut`]
//! (writable, non-owning). Any contiguous nalgebra storage converts into them
//! with `(&x).into()` / `(&mut x).into()`, and sub-blocks are obtained with
//! `rows`, `columns`, `view` and their `_mut` counterparts without copying.

use nalgebra::{Const, Dyn, OMatrix, OVector, RealField};
use num_traits::Float;
use std::fmt::{Debug, Display};

/// Real scalar the kernels are generic over, implemented for `f32` and `f64`.
///
/// `RealField` gives the nalgebra arithmetic, `Float` the libm functions the
/// closed-form maps need. Calls that exist on both must be disambiguated,
/// e.g. `<T as Float>::sqrt(x)`.
pub trait Scalar: RealField + Float + Display + Debug + Default + Copy + Send + Sync + 'static {
    /// Machine epsilon.
    const EPSILON: Self;

    /// Lossy conversion of an `f64` literal.
    fn from_f64(v: f64) -> Self;
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a statically-sized matrix.
pub type SMatrix<T, const R: usize, const C: usize> = OMatrix<T, Const<R>, Const<C>>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

/// Type alias for a statically-sized vector.
pub type SVector<T, const N: usize> = OVector<T, Const<N>>;

/// Read-only view on a contiguous vector.
pub type VecRef<'a, T> = nalgebra::DVectorView<'a, T>;

/// Writable view on a contiguous vector.
pub type VecMut<'a, T> = nalgebra::DVectorViewMut<'a, T>;

/// Read-only view on a column-major matrix block.
pub type MatRef<'a, T> = nalgebra::DMatrixView<'a, T>;

/// Writable view on a column-major matrix block.
pub type MatMut<'a, T> = nalgebra::DMatrixViewMut<'a, T>;

/// Constants shared by the charts.
pub mod constants {
    use super::Scalar;

    /// `π` in `T`.
    pub fn pi<T: Scalar>() -> T {
        <T as Scalar>::from_f64(std::f64::consts::PI)
    }

    /// `+∞`, the limit of unbounded charts.
    pub fn infinity<T: Scalar>() -> T {
        <T as num_traits::Float>::infinity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_conversions() {
        assert_relative_eq!(<f32 as Scalar>::from_f64(2.5), 2.5f32);
        assert_relative_eq!(constants::pi::<f64>(), std::f64::consts::PI);
        assert_relative_eq!(constants::pi::<f32>(), std::f32::consts::PI);
        assert!(constants::infinity::<f64>().is_infinite());
        assert!(<f32 as Scalar>::EPSILON > <f64 as Scalar>::EPSILON as f32);
    }

    #[test]
    fn test_views_share_storage() {
        let mut owned = DMatrix::<f64>::zeros(4, 3);
        {
            let mut view: MatMut<'_, f64> = (&mut owned).into();
            view.columns_mut(1, 2).fill(2.0);
        }
        let view: MatRef<'_, f64> = (&owned).into();
        assert_eq!(view.columns(0, 1).sum(), 0.0);
        assert_eq!(view.columns(1, 2).sum(), 16.0);

        let mut v = DVector::<f64>::zeros(5);
        let mut vm: VecMut<'_, f64> = (&mut v).into();
        vm.rows_mut(2, 3).fill(1.0);
        let vr: VecRef<'_, f64> = (&v).into();
        assert_eq!(vr.rows(0, 2).sum(), 0.0);
        assert_eq!(vr.len(), 5);
    }
}
