//! Unit-quaternion chart of SO(3).
//!
//! Rotations are stored as `[x, y, z, w]` with the scalar part last. The
//! retraction is `q ⊕ v = q ⊗ exp(v)` with the half-angle exponential
//!
//! ```text
//! exp(v) = (sin(t/2)/t · v, cos(t/2)),   t = ‖v‖
//! ```
//!
//! and the logarithm uses `atan2`, which picks the short rotation for both
//! `q` and `−q`.

use super::{checked_increment, ExpMap};
use crate::utils::{read_quaternion, write_quaternion, write_vector3};
use mnf_core::{
    error::{ManifoldError, Result},
    format_row,
    types::{MatMut, MatRef, SMatrix, Scalar, VecMut, VecRef},
    utils::mul_to,
};
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use num_traits::Float;

/// Unit-quaternion chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpMapQuaternion;

impl ExpMapQuaternion {
    fn precision<T: Scalar>() -> T {
        <T as Scalar>::from_f64(Self::PRECISION)
    }

    /// Quaternion exponential of an increment with squared norm `n2`.
    fn exponential<T: Scalar>(v: &Vector3<T>, n2: T) -> Quaternion<T> {
        let one = T::one();
        let half = <T as Scalar>::from_f64(0.5);
        let (w, s) = if n2 < Self::precision() {
            let from = <T as Scalar>::from_f64;
            (
                one + (n2 / from(48.0) - one) * (n2 / from(8.0)),
                (one + (from(0.0125) * n2 - one) * n2 / from(24.0)) * half,
            )
        } else {
            let t = <T as Float>::sqrt(n2);
            (<T as Float>::cos(t * half), <T as Float>::sin(t * half) / t)
        };
        Quaternion::new(w, s * v[0], s * v[1], s * v[2])
    }

    /// Quaternion logarithm, the inverse of [`Self::exponential`].
    fn logarithm<T: Scalar>(q: &Quaternion<T>) -> Vector3<T> {
        let vec = q.imag();
        let w = q.w;
        let n2 = vec.norm_squared();
        let n = <T as Float>::sqrt(n2);
        let two = <T as Scalar>::from_f64(2.0);
        if n < Self::precision() {
            vec * (two / w)
        } else {
            vec * (<T as Float>::atan2(two * n * w, w * w - n2) / n)
        }
    }

    /// `∂(q ⊗ (v/2, 0)) / ∂v`, rows ordered `x, y, z, w`.
    #[rustfmt::skip]
    fn left_jacobian<T: Scalar>(q: &Quaternion<T>) -> SMatrix<T, 4, 3> {
        let half = <T as Scalar>::from_f64(0.5);
        let (x, y, z, w) = (q.i * half, q.j * half, q.k * half, q.w * half);
        SMatrix::<T, 4, 3>::new(
            w, -z, y,
            z, w, -x,
            -y, x, w,
            -x, -y, -z,
        )
    }

    /// Jacobian of [`Self::logarithm`] with respect to `[x, y, z, w]`.
    fn log_jacobian<T: Scalar>(q: &Quaternion<T>) -> SMatrix<T, 3, 4> {
        let vec = q.imag();
        let w = q.w;
        let n2 = vec.norm_squared();
        let n = <T as Float>::sqrt(n2);
        let two = <T as Scalar>::from_f64(2.0);

        let (f, radial, dw) = if n < Self::precision() {
            (two / w, T::zero(), -two / (w * w))
        } else {
            let norm2 = w * w + n2;
            let phi = <T as Float>::atan2(two * n * w, w * w - n2);
            let f = phi / n;
            (f, (two * w / norm2 - f) / n2, -two / norm2)
        };

        let mut jacobian = SMatrix::<T, 3, 4>::zeros();
        for i in 0..3 {
            for j in 0..3 {
                jacobian[(i, j)] = radial * vec[i] * vec[j];
            }
            jacobian[(i, i)] += f;
            jacobian[(i, 3)] = dw * vec[i];
        }
        jacobian
    }
}

impl ExpMap for ExpMapQuaternion {
    const OUTPUT_DIM: usize = 4;
    const PRECISION: f64 = 1e-8;
    const HASH_NAME: &'static str = "ExpMapQuaternion";

    fn set_identity<T: Scalar>(mut out: VecMut<'_, T>) {
        write_quaternion(&mut out, &Quaternion::identity());
    }

    fn plus<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        let (v, n2) = checked_increment(&v)?;
        let q = read_quaternion(&x) * Self::exponential(&v, n2);
        write_quaternion(&mut out, &q);
        Ok(())
    }

    fn minus<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) {
        let q = read_quaternion(&y).conjugate() * read_quaternion(&x);
        write_vector3(&mut out, &Self::logarithm(&q));
    }

    fn inv_map<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>) {
        write_vector3(&mut out, &Self::logarithm(&read_quaternion(&x)));
    }

    fn diff_map<T: Scalar>(mut out: MatMut<'_, T>, x: VecRef<'_, T>) {
        out.copy_from(&Self::left_jacobian(&read_quaternion(&x)));
    }

    fn apply_diff_map<T: Scalar>(mut out: MatMut<'_, T>, input: MatRef<'_, T>, x: VecRef<'_, T>) {
        let jacobian = Self::left_jacobian(&read_quaternion(&x));
        mul_to(&input, &jacobian, &mut out);
    }

    fn diff_inv_map<T: Scalar>(mut out: MatMut<'_, T>, x: VecRef<'_, T>) {
        out.copy_from(&Self::log_jacobian(&read_quaternion(&x)));
    }

    fn apply_diff_inv_map<T: Scalar>(
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) {
        let jacobian = Self::log_jacobian(&read_quaternion(&x));
        mul_to(&input, &jacobian, &mut out);
    }

    fn is_valid_init<T: Scalar>(x: VecRef<'_, T>, prec: T) -> bool {
        approx::abs_diff_eq!(x.norm(), T::one(), epsilon = prec)
    }

    fn force_on_m<T: Scalar>(mut out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        Self::check_projection(input)?;
        out.copy_from(&input);
        out.unscale_mut(input.norm());
        Ok(())
    }

    fn check_projection<T: Scalar>(input: VecRef<'_, T>) -> Result<()> {
        if input.norm() <= T::EPSILON {
            return Err(ManifoldError::numerical_error(
                "cannot normalize a zero quaternion",
            ));
        }
        Ok(())
    }

    fn format_point<T: Scalar>(x: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
        format_row(x, prefix, precision)
    }

    fn rotation<T: Scalar>(v: VecRef<'_, T>) -> Result<Matrix3<T>> {
        let (v, n2) = checked_increment(&v)?;
        let q = UnitQuaternion::new_unchecked(Self::exponential(&v, n2));
        Ok(q.to_rotation_matrix().into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mnf_core::types::{DMatrix, DVector};

    fn quaternion_of(v: [f64; 3]) -> DVector<f64> {
        let mut identity = DVector::zeros(4);
        ExpMapQuaternion::set_identity::<f64>((&mut identity).into());
        let increment = DVector::from_row_slice(&v);
        let mut out = DVector::zeros(4);
        ExpMapQuaternion::plus::<f64>(
            (&mut out).into(),
            (&identity).into(),
            (&increment).into(),
        )
        .unwrap();
        out
    }

    #[test]
    fn test_identity_layout() {
        let mut q = DVector::zeros(4);
        ExpMapQuaternion::set_identity::<f64>((&mut q).into());
        assert_eq!(q.as_slice(), &[0.0, 0.0, 0.0, 1.0]);
        assert!(ExpMapQuaternion::is_valid_init::<f64>((&q).into(), 1e-12));
    }

    #[test]
    fn test_exponential_matches_half_angle_form() {
        let q = quaternion_of([0.0, 0.0, 1.0]);
        assert_relative_eq!(q[2], 0.5f64.sin(), epsilon = 1e-15);
        assert_relative_eq!(q[3], 0.5f64.cos(), epsilon = 1e-15);
    }

    #[test]
    fn test_series_branch_is_continuous() {
        let v = Vector3::new(4e-5, -3e-5, 6e-5);
        let n2 = v.norm_squared();
        assert!(n2 < 1e-8);
        let series = ExpMapQuaternion::exponential(&v, n2);
        let t = n2.sqrt();
        let exact = Quaternion::new((t / 2.0).cos(), 0.0, 0.0, 0.0)
            + Quaternion::from_imag(v * ((t / 2.0).sin() / t));
        assert_relative_eq!(series.coords, exact.coords, epsilon = 1e-15);
    }

    #[test]
    fn test_logarithm_picks_short_rotation() {
        let q = quaternion_of([0.3, -0.2, 0.9]);
        let negated = -&q;
        let mut a = DVector::zeros(3);
        let mut b = DVector::zeros(3);
        ExpMapQuaternion::inv_map::<f64>((&mut a).into(), (&q).into());
        ExpMapQuaternion::inv_map::<f64>((&mut b).into(), (&negated).into());
        assert_relative_eq!(a, DVector::from_row_slice(&[0.3, -0.2, 0.9]), epsilon = 1e-12);
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_matches_matrix_chart() {
        let v = DVector::from_row_slice(&[0.7, 0.1, -1.4]);
        let from_quaternion = ExpMapQuaternion::rotation::<f64>((&v).into()).unwrap();
        let from_matrix = crate::exp_map::ExpMapMatrix::rotation::<f64>((&v).into()).unwrap();
        assert_relative_eq!(from_quaternion, from_matrix, epsilon = 1e-12);
    }

    #[test]
    fn test_small_angle_log_jacobian() {
        let q = quaternion_of([0.0, 0.0, 0.0]);
        let mut j = DMatrix::zeros(3, 4);
        ExpMapQuaternion::diff_inv_map::<f64>((&mut j).into(), (&q).into());
        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(3, 4, &[
            2.0, 0.0, 0.0, 0.0,
            0.0, 2.0, 0.0, 0.0,
            0.0, 0.0, 2.0, 0.0,
        ]);
        assert_relative_eq!(j, expected);
    }

    #[test]
    fn test_force_on_m_normalizes() {
        let raw = DVector::from_row_slice(&[0.0, 0.0, 3.0, 4.0]);
        let mut q = DVector::zeros(4);
        ExpMapQuaternion::force_on_m::<f64>((&mut q).into(), (&raw).into()).unwrap();
        assert_relative_eq!(q, DVector::from_row_slice(&[0.0, 0.0, 0.6, 0.8]));

        let zero = DVector::zeros(4);
        assert!(ExpMapQuaternion::force_on_m::<f64>((&mut q).into(), (&zero).into()).is_err());
    }
}
