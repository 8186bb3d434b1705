//! Exponential-map charts of the rotation group SO(3).
//!
//! A chart fixes how a rotation is stored and implements the closed-form
//! geometry of SO(3) for that storage: exponential and logarithm, their
//! Jacobians, and the transport of tangent data along an increment.
//!
//! # Mathematical Background
//!
//! Increments are angular velocities `v ∈ R³`. The exponential map
//!
//! ```text
//! exp([v]×) = I + (sin t / t) [v]× + ((1 − cos t) / t²) [v]×²,   t = ‖v‖
//! ```
//!
//! is a diffeomorphism on the ball `‖v‖ < π`; increments on or beyond that
//! sphere are rejected with [`ManifoldError::InvalidTangent`]. Near `t = 0`
//! the trigonometric ratios are replaced by their Taylor series below the
//! chart's [`PRECISION`](ExpMap::PRECISION) threshold.
//!
//! Transports act with the rotation `E = exp([v]×)`:
//! `applyTransport(H) = E H` on columns and `applyInvTransport(H) = H Eᵀ` on
//! rows.

mod matrix;
mod quaternion;

pub use matrix::ExpMapMatrix;
pub use quaternion::ExpMapQuaternion;

use mnf_core::{
    contract,
    error::{ManifoldError, Result},
    types::{MatMut, MatRef, Scalar, VecMut, VecRef},
    utils::{mul_to, mul_transpose_to},
};
use nalgebra::{Matrix3, Vector3};
use num_traits::Float;
use std::fmt::Debug;

/// Storage-specific geometry of SO(3).
///
/// Charts are stateless; every function is associated and the manifold
/// selects its chart at compile time through a type parameter.
pub trait ExpMap: Debug + Clone + Copy + Default + Send + Sync + 'static {
    /// Size of an increment.
    const INPUT_DIM: usize = 3;

    /// Size of the stored rotation.
    const OUTPUT_DIM: usize;

    /// Threshold below which small-angle series replace the closed forms.
    const PRECISION: f64;

    /// Name folded into the structural hash of manifolds using this chart.
    const HASH_NAME: &'static str;

    /// Write the identity rotation.
    fn set_identity<T: Scalar>(out: VecMut<'_, T>);

    /// `out = x ⊕ v`.
    fn plus<T: Scalar>(out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()>;

    /// `out = log(y⁻¹ x)`.
    fn minus<T: Scalar>(out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>);

    /// `out = log(x)`.
    fn inv_map<T: Scalar>(out: VecMut<'_, T>, x: VecRef<'_, T>);

    /// Write the `OUTPUT_DIM x 3` Jacobian of `v ↦ x ⊕ v` at `v = 0`.
    fn diff_map<T: Scalar>(out: MatMut<'_, T>, x: VecRef<'_, T>);

    /// `out = input * diffMap(x)`.
    fn apply_diff_map<T: Scalar>(out: MatMut<'_, T>, input: MatRef<'_, T>, x: VecRef<'_, T>);

    /// Write the `3 x OUTPUT_DIM` Jacobian of the logarithm at `x`.
    fn diff_inv_map<T: Scalar>(out: MatMut<'_, T>, x: VecRef<'_, T>);

    /// `out = input * diffInvMap(x)`.
    fn apply_diff_inv_map<T: Scalar>(
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    );

    /// Whether `x` stores a rotation within `prec`.
    fn is_valid_init<T: Scalar>(x: VecRef<'_, T>, prec: T) -> bool;

    /// Nearest rotation to `input`.
    fn force_on_m<T: Scalar>(out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()>;

    /// Fail if [`force_on_m`](Self::force_on_m) cannot project `input`.
    fn check_projection<T: Scalar>(input: VecRef<'_, T>) -> Result<()>;

    /// Render a stored rotation.
    fn format_point<T: Scalar>(x: VecRef<'_, T>, prefix: &str, precision: usize) -> String;

    /// Rotation matrix `exp([v]×)` of an increment.
    fn rotation<T: Scalar>(v: VecRef<'_, T>) -> Result<Matrix3<T>>;

    /// `out = E input`, transporting the columns of `input`.
    fn apply_transport<T: Scalar>(
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        let e = Self::rotation(v)?;
        mul_to(&e, &input, &mut out);
        Ok(())
    }

    /// `out = input Eᵀ`, transporting the rows of `input`.
    fn apply_inv_transport<T: Scalar>(
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        let e = Self::rotation(v)?;
        mul_transpose_to(&input, &e, &mut out);
        Ok(())
    }

    /// The chart is exact: the constraint matrix has no rows.
    fn tangent_constraint<T: Scalar>(_out: MatMut<'_, T>, _x: VecRef<'_, T>) {}

    /// Every 3-vector is an admissible increment.
    fn is_in_txm<T: Scalar>(_x: VecRef<'_, T>, _v: VecRef<'_, T>, _prec: T) -> bool {
        true
    }

    /// Increments need no projection.
    fn force_on_txm<T: Scalar>(mut out: VecMut<'_, T>, input: VecRef<'_, T>, _x: VecRef<'_, T>) {
        out.copy_from(&input);
    }
}

/// Read an increment and check that it lies in the injectivity ball.
///
/// Returns the increment and its squared norm.
pub(crate) fn checked_increment<T: Scalar>(v: &VecRef<'_, T>) -> Result<(Vector3<T>, T)> {
    let v = Vector3::new(v[0], v[1], v[2]);
    let n2 = v.norm_squared();
    let pi = <T as Scalar>::from_f64(std::f64::consts::PI);
    contract::require(n2 < pi * pi, || {
        ManifoldError::invalid_tangent(format!(
            "rotation increment norm {} is not below pi",
            <T as Float>::sqrt(n2)
        ))
    })?;
    Ok((v, n2))
}

/// Rodrigues' formula with series coefficients below `prec`.
pub(crate) fn rodrigues<T: Scalar>(v: &Vector3<T>, n2: T, prec: T) -> Matrix3<T> {
    let one = T::one();
    let (c, s) = if n2 < prec {
        (
            <T as Scalar>::from_f64(0.5) - n2 / <T as Scalar>::from_f64(24.0),
            one - n2 / <T as Scalar>::from_f64(6.0),
        )
    } else {
        let t = <T as Float>::sqrt(n2);
        ((one - <T as Float>::cos(t)) / n2, <T as Float>::sin(t) / t)
    };
    let (x, y, z) = (v[0], v[1], v[2]);
    Matrix3::new(
        one - c * (y * y + z * z),
        -s * z + c * x * y,
        s * y + c * x * z,
        s * z + c * x * y,
        one - c * (x * x + z * z),
        -s * x + c * y * z,
        -s * y + c * x * z,
        s * x + c * y * z,
        one - c * (x * x + y * y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mnf_core::types::DVector;

    #[test]
    fn test_rodrigues_is_a_rotation() {
        let v = Vector3::new(0.3, -1.2, 0.7);
        let e = rodrigues(&v, v.norm_squared(), 1e-12);
        assert_relative_eq!(e.transpose() * e, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(e.determinant(), 1.0, epsilon = 1e-12);
        // The rotation axis is fixed.
        assert_relative_eq!(e * v, v, epsilon = 1e-12);
    }

    #[test]
    fn test_rodrigues_series_branch_is_continuous() {
        let v = Vector3::new(3e-7, -2e-7, 5e-7);
        let n2 = v.norm_squared();
        assert!(n2 < 1e-12);
        let series = rodrigues(&v, n2, 1e-12);
        let exact = rodrigues(&v, n2, 0.0);
        assert_relative_eq!(series, exact, epsilon = 1e-15);
    }

    #[test]
    fn test_increment_domain() {
        let ok = DVector::from_vec(vec![3.0, 0.0, 0.0]);
        assert!(checked_increment::<f64>(&(&ok).into()).is_ok());

        let too_long = DVector::from_vec(vec![0.0, 2.5, 2.0]);
        let err = checked_increment::<f64>(&(&too_long).into()).unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidTangent { .. }));
    }
}
