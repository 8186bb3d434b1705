//! The unit sphere S2 = {x ∈ R³ : ‖x‖ = 1}.
//!
//! S2 is stored by its ambient coordinates, so points and tangent vectors are
//! both 3-vectors while the sphere has 2 degrees of freedom. The tangent
//! space at `x` is the plane orthogonal to `x`, exposed to solvers through
//! the one-row constraint `xᵀ v = 0`.
//!
//! # Geometry
//!
//! - **Retraction**: the exponential map
//!   `exp_x(v) = cos(‖v‖) x + sin(‖v‖) v / ‖v‖`
//! - **Logarithm**: `log_x(y)` is the projection of `y − x` on `T_x S2`,
//!   rescaled to the geodesic distance `2 asin(‖x − y‖ / 2)`
//! - **Transport**: parallel transport along the great circle leaving `x` in
//!   the direction of `v`
//!
//! The identity element is `e = (1, 0, 0)`. `inv_map` is the logarithm at
//! `e` and is undefined at the antipode `−e`.

use crate::utils::{read_vector3, write_vector3};
use mnf_core::{
    constants, contract,
    error::{ManifoldError, Result},
    format_row,
    manifold::{Manifold, ManifoldBase},
    types::{MatMut, MatRef, Scalar, VecMut, VecRef},
    utils::compute_hash,
};
use nalgebra::Vector3;
use num_traits::Float;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

/// Below this squared angle the trigonometric ratios use their series.
const PRECISION: f64 = 1e-12;

/// Below this angle the logarithm is not rescaled.
const RESCALE_THRESHOLD: f64 = 1e-6;

/// The unit sphere in R³.
#[derive(Debug, Clone)]
pub struct S2<T: Scalar> {
    base: ManifoldBase,
    typical_magnitude: Vector3<T>,
}

impl<T: Scalar> S2<T> {
    /// Creates the sphere with typical magnitude π on every axis.
    ///
    /// # Errors
    ///
    /// Never fails for the fixed sphere dimensions; the `Result` mirrors the
    /// other constructors.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base: ManifoldBase::new(2, 3, 3, "S2")?,
            typical_magnitude: Vector3::repeat(constants::pi()),
        })
    }

    fn precision() -> T {
        <T as Scalar>::from_f64(PRECISION)
    }

    /// Use the same typical magnitude on every axis.
    pub fn set_typical_magnitude(&mut self, magnitude: T) {
        self.typical_magnitude.fill(magnitude);
    }

    /// Set the typical magnitude axis by axis.
    pub fn set_typical_magnitude_per_axis(&mut self, magnitude: VecRef<'_, T>) -> Result<()> {
        contract::require_len("magnitude", magnitude.len(), 3)?;
        self.typical_magnitude.copy_from(&magnitude);
        Ok(())
    }

    /// Geodesic distance between two points.
    pub fn distance(&self, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<T> {
        contract::require_len("point", x.len(), 3)?;
        contract::require_len("point", y.len(), 3)?;
        Ok(geodesic_distance(&read_vector3(&x), &read_vector3(&y)))
    }

    /// Riemannian logarithm `out = log_x(y)`, the tangent vector at `x`
    /// pointing to `y` with length their geodesic distance.
    pub fn logarithm(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), 3)?;
        contract::require_len("point", y.len(), 3)?;
        contract::require_len("output", out.len(), 3)?;
        write_vector3(&mut out, &log_at(&read_vector3(&x), &read_vector3(&y)));
        Ok(())
    }

    /// Project `input` on the tangent space at `x`.
    pub fn proj_vec(&self, mut out: VecMut<'_, T>, input: VecRef<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), 3)?;
        contract::require_len("input", input.len(), 3)?;
        contract::require_len("output", out.len(), 3)?;
        let x = read_vector3(&x);
        let input = read_vector3(&input);
        write_vector3(&mut out, &(input - x * x.dot(&input)));
        Ok(())
    }

    /// Project every row of `input` on the tangent space at `x`.
    pub fn proj_rows(&self, mut out: MatMut<'_, T>, input: MatRef<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), 3)?;
        contract::require(input.ncols() == 3, || {
            ManifoldError::dimension_mismatch("input with 3 columns", format!("{} columns", input.ncols()))
        })?;
        contract::require_shape("output", out.shape(), input.shape())?;
        for i in 0..input.nrows() {
            let d = input[(i, 0)] * x[0] + input[(i, 1)] * x[1] + input[(i, 2)] * x[2];
            for j in 0..3 {
                out[(i, j)] = input[(i, j)] - d * x[j];
            }
        }
        Ok(())
    }

    /// Project every column of `input` on the tangent space at `x`.
    pub fn proj_cols(&self, mut out: MatMut<'_, T>, input: MatRef<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), 3)?;
        contract::require(input.nrows() == 3, || {
            ManifoldError::dimension_mismatch("input with 3 rows", format!("{} rows", input.nrows()))
        })?;
        contract::require_shape("output", out.shape(), input.shape())?;
        for j in 0..input.ncols() {
            let d = input[(0, j)] * x[0] + input[(1, j)] * x[1] + input[(2, j)] * x[2];
            for i in 0..3 {
                out[(i, j)] = input[(i, j)] - d * x[i];
            }
        }
        Ok(())
    }

    /// Random tangent vector at `x` with unit norm.
    pub fn random_vec(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, rng: &mut dyn RngCore) -> Result<()> {
        contract::require_len("point", x.len(), 3)?;
        contract::require_len("output", out.len(), 3)?;
        let x = read_vector3(&x);
        write_vector3(&mut out, &random_direction(&x, rng)?);
        Ok(())
    }

    /// `g(c) = acos(c) / √(1 − c²)` and its derivative, `c` the first coordinate.
    fn inv_map_coefficients(c: T) -> Result<(T, T)> {
        let one = T::one();
        let c = <T as Float>::max(-one, <T as Float>::min(one, c));
        let s2 = one - c * c;
        if s2 < Self::precision() {
            contract::require(c > T::zero(), || {
                ManifoldError::invalid_point("the logarithm at (1, 0, 0) is undefined at (-1, 0, 0)")
            })?;
            let from = <T as Scalar>::from_f64;
            return Ok((one + s2 / from(6.0), -one / from(3.0)));
        }
        let s = <T as Float>::sqrt(s2);
        let theta = <T as Float>::acos(c);
        Ok((theta / s, (theta * c - s) / (s2 * s)))
    }
}

/// `exp_x(v)`, with series coefficients for tiny increments.
fn exp_at<T: Scalar>(x: &Vector3<T>, v: &Vector3<T>) -> Vector3<T> {
    let n2 = v.norm_squared();
    let one = T::one();
    let (c, s) = if n2 < <T as Scalar>::from_f64(PRECISION) {
        let from = <T as Scalar>::from_f64;
        (one - n2 / from(2.0), one - n2 / from(6.0))
    } else {
        let n = <T as Float>::sqrt(n2);
        (<T as Float>::cos(n), <T as Float>::sin(n) / n)
    };
    x * c + v * s
}

/// `2 asin(‖x − y‖ / 2)`.
fn geodesic_distance<T: Scalar>(x: &Vector3<T>, y: &Vector3<T>) -> T {
    let half_chord = (x - y).norm() * <T as Scalar>::from_f64(0.5);
    <T as Scalar>::from_f64(2.0) * <T as Float>::asin(<T as Float>::min(T::one(), half_chord))
}

/// `log_x(y)`; zero at the antipode, where every direction is a geodesic.
fn log_at<T: Scalar>(x: &Vector3<T>, y: &Vector3<T>) -> Vector3<T> {
    let d = y - x;
    let p = d - x * x.dot(&d);
    let theta = geodesic_distance(x, y);
    let norm = p.norm();
    if theta > <T as Scalar>::from_f64(RESCALE_THRESHOLD) && norm > T::EPSILON {
        p * (theta / norm)
    } else {
        p
    }
}

/// Unit tangent direction at `x` drawn from a projected standard normal.
fn random_direction<T: Scalar>(x: &Vector3<T>, rng: &mut dyn RngCore) -> Result<Vector3<T>> {
    let mut sample = || -> T {
        let value: f64 = StandardNormal.sample(&mut *rng);
        <T as Scalar>::from_f64(value)
    };
    for _ in 0..16 {
        let raw = Vector3::new(sample(), sample(), sample());
        let tangent = raw - x * x.dot(&raw);
        let norm = tangent.norm();
        if norm > <T as Scalar>::from_f64(1e-8) {
            return Ok(tangent / norm);
        }
    }
    Err(ManifoldError::numerical_error(
        "could not draw a tangent direction on S2",
    ))
}

impl<T: Scalar> Manifold<T> for S2<T> {
    fn base(&self) -> &ManifoldBase {
        &self.base
    }

    fn number_of_submanifolds(&self) -> usize {
        1
    }

    fn submanifold(&self, i: usize) -> Result<&dyn Manifold<T>> {
        contract::require(i == 0, || {
            ManifoldError::invalid_parameter(format!("S2 has no submanifold {i}"))
        })?;
        Ok(self)
    }

    fn type_hash(&self) -> u64 {
        compute_hash("S2", "")
    }

    fn set_identity_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        write_vector3(&mut out, &Vector3::x());
        Ok(())
    }

    fn plus_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        write_vector3(&mut out, &exp_at(&read_vector3(&x), &read_vector3(&v)));
        Ok(())
    }

    fn minus_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<()> {
        write_vector3(&mut out, &log_at(&read_vector3(&y), &read_vector3(&x)));
        Ok(())
    }

    fn inv_map_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        let (g, _) = Self::inv_map_coefficients(x[0])?;
        out[0] = T::zero();
        out[1] = g * x[1];
        out[2] = g * x[2];
        Ok(())
    }

    fn diff_map_impl(&self, mut out: MatMut<'_, T>, _x: VecRef<'_, T>) -> Result<()> {
        out.fill_with_identity();
        Ok(())
    }

    fn apply_diff_map_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn diff_inv_map_impl(&self, mut out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        let (g, dg) = Self::inv_map_coefficients(x[0])?;
        out.fill(T::zero());
        out[(1, 0)] = dg * x[1];
        out[(2, 0)] = dg * x[2];
        out[(1, 1)] = g;
        out[(2, 2)] = g;
        Ok(())
    }

    fn apply_diff_inv_map_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        let (g, dg) = Self::inv_map_coefficients(x[0])?;
        for i in 0..input.nrows() {
            let (b, c) = (input[(i, 1)], input[(i, 2)]);
            out[(i, 0)] = dg * (b * x[1] + c * x[2]);
            out[(i, 1)] = g * b;
            out[(i, 2)] = g * c;
        }
        Ok(())
    }

    fn apply_transport_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        let Some((u, a)) = transport_axes(&read_vector3(&x), &read_vector3(&v), Self::precision()) else {
            return Ok(());
        };
        for j in 0..input.ncols() {
            let d = u[0] * input[(0, j)] + u[1] * input[(1, j)] + u[2] * input[(2, j)];
            for i in 0..3 {
                out[(i, j)] += a[i] * d;
            }
        }
        Ok(())
    }

    fn apply_inv_transport_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        let Some((u, a)) = transport_axes(&read_vector3(&x), &read_vector3(&v), Self::precision()) else {
            return Ok(());
        };
        for i in 0..input.nrows() {
            let d = input[(i, 0)] * u[0] + input[(i, 1)] * u[1] + input[(i, 2)] * u[2];
            for j in 0..3 {
                out[(i, j)] += d * a[j];
            }
        }
        Ok(())
    }

    fn tangent_constraint_impl(&self, mut out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        for j in 0..3 {
            out[(0, j)] = x[j];
        }
        Ok(())
    }

    fn is_in_m_impl(&self, x: VecRef<'_, T>, prec: T) -> Result<bool> {
        Ok(<T as Float>::abs(x.norm() - T::one()) < prec)
    }

    fn is_in_txm_impl(&self, x: VecRef<'_, T>, v: VecRef<'_, T>, prec: T) -> Result<bool> {
        Ok(<T as Float>::abs(x.dot(&v)) < prec)
    }

    fn force_on_m_impl(&self, mut out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        self.check_projection_impl(input)?;
        out.copy_from(&input);
        out.unscale_mut(input.norm());
        Ok(())
    }

    fn force_on_txm_impl(
        &self,
        mut out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        let x = read_vector3(&x);
        let input = read_vector3(&input);
        write_vector3(&mut out, &(input - x * x.dot(&input)));
        Ok(())
    }

    fn create_random_point_impl(
        &self,
        mut out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let identity = Vector3::x();
        let length = coeff * <T as Scalar>::from_f64(rng.gen_range(0.0..1.0));
        let v = random_direction(&identity, rng)? * length;
        write_vector3(&mut out, &exp_at(&identity, &v));
        Ok(())
    }

    fn typical_magnitude_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        out.copy_from(&self.typical_magnitude);
        Ok(())
    }

    fn limit_map_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        out.fill(constants::infinity());
        Ok(())
    }

    fn format_point_impl(&self, x: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
        format_row(x, prefix, precision)
    }

    fn check_log_domain_impl(&self, x: VecRef<'_, T>) -> Result<()> {
        Self::inv_map_coefficients(x[0]).map(|_| ())
    }

    fn check_projection_impl(&self, input: VecRef<'_, T>) -> Result<()> {
        if input.norm() <= T::EPSILON {
            return Err(ManifoldError::numerical_error(
                "cannot project the origin onto S2",
            ));
        }
        Ok(())
    }
}

/// Unit direction `u` of `v` and `a = (cos n − 1) u − sin n x`, or `None`
/// for an increment too small to move.
fn transport_axes<T: Scalar>(
    x: &Vector3<T>,
    v: &Vector3<T>,
    prec: T,
) -> Option<(Vector3<T>, Vector3<T>)> {
    let n2 = v.norm_squared();
    if n2 < prec {
        return None;
    }
    let n = <T as Float>::sqrt(n2);
    let u = v / n;
    let a = u * (<T as Float>::cos(n) - T::one()) - x * <T as Float>::sin(n);
    Some((u, a))
}
