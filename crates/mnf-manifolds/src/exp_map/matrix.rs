//! Rotation-matrix chart of SO(3).
//!
//! A rotation is stored as its 3x3 matrix in column-major order (9 entries).
//! The retraction multiplies on the right, `X ⊕ v = X exp([v]×)`, so
//! increments are expressed in the body frame of `X`.

use super::{checked_increment, rodrigues, ExpMap};
use crate::utils::{read_matrix3, skew, write_matrix3, write_vector3};
use mnf_core::{
    error::{ManifoldError, Result},
    format_row,
    types::{MatMut, MatRef, SMatrix, Scalar, VecMut, VecRef},
    utils::mul_to,
};
use nalgebra::{Matrix3, Vector3};
use num_traits::Float;

/// Below this `cos θ` the logarithm reads the rotation axis from the symmetric part.
const NEAR_PI_COS: f64 = -0.5;

/// Rotation-matrix chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpMapMatrix;

impl ExpMapMatrix {
    fn precision<T: Scalar>() -> T {
        <T as Scalar>::from_f64(Self::PRECISION)
    }

    /// `h(c) = θ / (2 sin θ)` and its derivative in `c = cos θ`.
    fn log_coefficients<T: Scalar>(trace: T) -> (T, T) {
        let one = T::one();
        let half = <T as Scalar>::from_f64(0.5);
        let c = <T as Float>::max(-one, <T as Float>::min(one, (trace - one) * half));
        let theta = <T as Float>::acos(c);
        let theta2 = theta * theta;
        if theta2 < Self::precision() {
            (
                half + theta2 / <T as Scalar>::from_f64(12.0),
                -one / <T as Scalar>::from_f64(6.0),
            )
        } else {
            let s = <T as Float>::sin(theta);
            (theta * half / s, (theta * c - s) * half / (s * s * s))
        }
    }

    /// Logarithm of a rotation matrix.
    fn log<T: Scalar>(r: &Matrix3<T>) -> Vector3<T> {
        let half = <T as Scalar>::from_f64(0.5);
        let a = vee_antisymmetric(r);
        let c = (r.trace() - T::one()) * half;
        if c > <T as Scalar>::from_f64(NEAR_PI_COS) {
            let (h, _) = Self::log_coefficients(r.trace());
            return a * h;
        }

        // Near π: vee(R − Rᵀ) = 2 sin θ u vanishes, but
        // (R + Rᵀ)/2 − cI = (1 − c) u uᵀ does not. Its largest diagonal entry
        // selects the column to read u from; the skew part gives the sign.
        let theta = <T as Float>::atan2(a.norm() * half, c);
        let b = (r + r.transpose()) * half - Matrix3::identity() * c;
        let mut k = 0;
        for i in 1..3 {
            if b[(i, i)] > b[(k, k)] {
                k = i;
            }
        }
        let mut axis = b.column(k).normalize();
        if axis.dot(&a) < T::zero() {
            axis.neg_mut();
        }
        axis * theta
    }

    /// Jacobian of `v ↦ vec(X exp([v]×))` at `v = 0`; column `i` is `vec(X [eᵢ]×)`.
    fn generator_jacobian<T: Scalar>(x: &Matrix3<T>) -> SMatrix<T, 9, 3> {
        let mut jacobian = SMatrix::<T, 9, 3>::zeros();
        for i in 0..3 {
            let column = x * skew(&Vector3::ith(i, T::one()));
            for (k, value) in column.iter().enumerate() {
                jacobian[(k, i)] = *value;
            }
        }
        jacobian
    }

    /// Jacobian of the logarithm with respect to the 9 stored entries.
    fn log_jacobian<T: Scalar>(x: &Matrix3<T>) -> SMatrix<T, 3, 9> {
        let (h, dh) = Self::log_coefficients(x.trace());
        let a = vee_antisymmetric(x);
        let half = <T as Scalar>::from_f64(0.5);

        let mut jacobian = SMatrix::<T, 3, 9>::zeros();
        // d vee(X - Xᵀ) / dX, entries indexed column-major.
        jacobian[(0, 5)] = h;
        jacobian[(0, 7)] = -h;
        jacobian[(1, 6)] = h;
        jacobian[(1, 2)] = -h;
        jacobian[(2, 1)] = h;
        jacobian[(2, 3)] = -h;
        // d cos θ / dX_ii = 1/2
        for k in 0..3 {
            for diagonal in [0, 4, 8] {
                jacobian[(k, diagonal)] += a[k] * dh * half;
            }
        }
        jacobian
    }
}

/// `vee(R − Rᵀ)`.
fn vee_antisymmetric<T: Scalar>(r: &Matrix3<T>) -> Vector3<T> {
    Vector3::new(
        r[(2, 1)] - r[(1, 2)],
        r[(0, 2)] - r[(2, 0)],
        r[(1, 0)] - r[(0, 1)],
    )
}

impl ExpMap for ExpMapMatrix {
    const OUTPUT_DIM: usize = 9;
    const PRECISION: f64 = 1e-12;
    const HASH_NAME: &'static str = "ExpMapMatrix";

    fn set_identity<T: Scalar>(mut out: VecMut<'_, T>) {
        write_matrix3(&mut out, &Matrix3::identity());
    }

    fn plus<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        let (v, n2) = checked_increment(&v)?;
        let e = rodrigues(&v, n2, Self::precision());
        write_matrix3(&mut out, &(read_matrix3(&x) * e));
        Ok(())
    }

    fn minus<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) {
        let r = read_matrix3(&y).transpose() * read_matrix3(&x);
        write_vector3(&mut out, &Self::log(&r));
    }

    fn inv_map<T: Scalar>(mut out: VecMut<'_, T>, x: VecRef<'_, T>) {
        write_vector3(&mut out, &Self::log(&read_matrix3(&x)));
    }

    fn diff_map<T: Scalar>(mut out: MatMut<'_, T>, x: VecRef<'_, T>) {
        out.copy_from(&Self::generator_jacobian(&read_matrix3(&x)));
    }

    fn apply_diff_map<T: Scalar>(mut out: MatMut<'_, T>, input: MatRef<'_, T>, x: VecRef<'_, T>) {
        let jacobian = Self::generator_jacobian(&read_matrix3(&x));
        mul_to(&input, &jacobian, &mut out);
    }

    fn diff_inv_map<T: Scalar>(mut out: MatMut<'_, T>, x: VecRef<'_, T>) {
        out.copy_from(&Self::log_jacobian(&read_matrix3(&x)));
    }

    fn apply_diff_inv_map<T: Scalar>(
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) {
        let jacobian = Self::log_jacobian(&read_matrix3(&x));
        mul_to(&input, &jacobian, &mut out);
    }

    fn is_valid_init<T: Scalar>(x: VecRef<'_, T>, prec: T) -> bool {
        let r = read_matrix3(&x);
        let gram = r.transpose() * r - Matrix3::identity();
        <T as Float>::abs(r.determinant() - T::one()) < prec
            && gram.iter().all(|entry| <T as Float>::abs(*entry) < prec)
    }

    fn force_on_m<T: Scalar>(mut out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        Self::check_projection(input)?;
        let svd = read_matrix3(&input).svd(true, true);
        let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(ManifoldError::numerical_error(
                "SVD failed while projecting onto SO(3)",
            ));
        };
        if (u * v_t).determinant() < T::zero() {
            u.column_mut(2).neg_mut();
        }
        write_matrix3(&mut out, &(u * v_t));
        Ok(())
    }

    fn check_projection<T: Scalar>(input: VecRef<'_, T>) -> Result<()> {
        if !input.iter().all(|entry| <T as Float>::is_finite(*entry)) {
            return Err(ManifoldError::numerical_error(
                "cannot project a matrix with non-finite entries onto SO(3)",
            ));
        }
        Ok(())
    }

    fn format_point<T: Scalar>(x: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
        let r = read_matrix3(&x);
        (0..3)
            .map(|i| {
                let row = r.row(i).transpose();
                format_row((&row).into(), prefix, precision)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn rotation<T: Scalar>(v: VecRef<'_, T>) -> Result<Matrix3<T>> {
        let (v, n2) = checked_increment(&v)?;
        Ok(rodrigues(&v, n2, Self::precision()))
    }
}
