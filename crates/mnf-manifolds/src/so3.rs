//! The rotation group SO(3).
//!
//! SO(3) = {R ∈ R^{3×3} : RᵀR = I, det R = 1} is a 3-dimensional Lie group.
//! How a rotation is stored, and therefore how its exponential, logarithm and
//! Jacobians are computed, is delegated to an [`ExpMap`] chart chosen at
//! compile time:
//!
//! - [`SO3Matrix`] stores the 9 entries of the rotation matrix,
//! - [`SO3Quaternion`] stores a unit quaternion `[x, y, z, w]`.
//!
//! Both charts share the tangent convention: an increment `v ∈ R³` is a
//! rotation vector in the body frame, and `R ⊕ v = R exp([v]×)`.
//!
//! # Example
//!
//! ```
//! use mnf_core::prelude::*;
//! use mnf_manifolds::SO3Matrix;
//!
//! let so3 = SO3Matrix::<f64>::new().unwrap();
//! let identity = so3.identity().unwrap();
//! let v = DVector::from_vec(vec![0.0, 0.0, std::f64::consts::FRAC_PI_2]);
//!
//! let mut r = DVector::zeros(9);
//! so3.plus((&mut r).into(), (&identity).into(), (&v).into()).unwrap();
//! assert!(so3.is_in_m((&r).into(), 1e-12).unwrap());
//! ```

use crate::exp_map::{checked_increment, ExpMap, ExpMapMatrix, ExpMapQuaternion};
use mnf_core::{
    constants, contract,
    error::{ManifoldError, Result},
    manifold::{Manifold, ManifoldBase},
    types::{DVector, MatMut, MatRef, Scalar, VecMut, VecRef},
    utils::compute_hash,
};
use nalgebra::Vector3;
use num_traits::Float;
use rand::{Rng, RngCore};
use std::marker::PhantomData;

/// SO(3) in the chart `M`.
#[derive(Debug, Clone)]
pub struct SO3<T: Scalar, M: ExpMap = ExpMapMatrix> {
    base: ManifoldBase,
    typical_magnitude: Vector3<T>,
    _chart: PhantomData<M>,
}

/// SO(3) stored as rotation matrices.
pub type SO3Matrix<T> = SO3<T, ExpMapMatrix>;

/// SO(3) stored as unit quaternions.
pub type SO3Quaternion<T> = SO3<T, ExpMapQuaternion>;

impl<T: Scalar, M: ExpMap> SO3<T, M> {
    /// Creates the rotation group in chart `M`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart stores fewer than 3 entries.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base: ManifoldBase::new(3, 3, M::OUTPUT_DIM, "SO3")?,
            typical_magnitude: Vector3::repeat(constants::pi()),
            _chart: PhantomData,
        })
    }

    /// Use the same typical magnitude on the three axes.
    pub fn set_typical_magnitude(&mut self, magnitude: T) {
        self.typical_magnitude.fill(magnitude);
    }

    /// Set the typical magnitude axis by axis.
    pub fn set_typical_magnitude_per_axis(&mut self, magnitude: VecRef<'_, T>) -> Result<()> {
        contract::require_len("magnitude", magnitude.len(), 3)?;
        self.typical_magnitude.copy_from(&magnitude);
        Ok(())
    }

    /// Rotation matrix `exp([v]×)` of an increment.
    pub fn rotation(&self, v: VecRef<'_, T>) -> Result<nalgebra::Matrix3<T>> {
        contract::require_len("increment", v.len(), 3)?;
        M::rotation(v)
    }
}

impl<T: Scalar, M: ExpMap> Manifold<T> for SO3<T, M> {
    fn base(&self) -> &ManifoldBase {
        &self.base
    }

    fn number_of_submanifolds(&self) -> usize {
        1
    }

    fn submanifold(&self, i: usize) -> Result<&dyn Manifold<T>> {
        contract::require(i == 0, || {
            ManifoldError::invalid_parameter(format!("SO3 has no submanifold {i}"))
        })?;
        Ok(self)
    }

    fn type_hash(&self) -> u64 {
        compute_hash("SO3", M::HASH_NAME)
    }

    fn set_identity_impl(&self, out: VecMut<'_, T>) -> Result<()> {
        M::set_identity(out);
        Ok(())
    }

    fn plus_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        M::plus(out, x, v)
    }

    fn minus_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<()> {
        M::minus(out, x, y);
        Ok(())
    }

    fn inv_map_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        M::inv_map(out, x);
        Ok(())
    }

    fn diff_map_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        M::diff_map(out, x);
        Ok(())
    }

    fn apply_diff_map_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        M::apply_diff_map(out, input, x);
        Ok(())
    }

    fn diff_inv_map_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        M::diff_inv_map(out, x);
        Ok(())
    }

    fn apply_diff_inv_map_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        M::apply_diff_inv_map(out, input, x);
        Ok(())
    }

    fn apply_transport_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        M::apply_transport(out, input, x, v)
    }

    fn apply_inv_transport_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        M::apply_inv_transport(out, input, x, v)
    }

    fn tangent_constraint_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        M::tangent_constraint(out, x);
        Ok(())
    }

    fn is_in_m_impl(&self, x: VecRef<'_, T>, prec: T) -> Result<bool> {
        Ok(M::is_valid_init(x, prec))
    }

    fn is_in_txm_impl(&self, x: VecRef<'_, T>, v: VecRef<'_, T>, prec: T) -> Result<bool> {
        Ok(M::is_in_txm(x, v, prec))
    }

    fn force_on_m_impl(&self, out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        M::force_on_m(out, input)
    }

    fn force_on_txm_impl(
        &self,
        out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        M::force_on_txm(out, input, x);
        Ok(())
    }

    fn create_random_point_impl(
        &self,
        out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let mut identity = DVector::zeros(M::OUTPUT_DIM);
        M::set_identity((&mut identity).into());
        let v = DVector::from_fn(3, |_, _| {
            coeff * <T as Scalar>::from_f64(rng.gen_range(-1.0..1.0))
        });
        M::plus(out, (&identity).into(), (&v).into())
    }

    fn typical_magnitude_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        out.copy_from(&self.typical_magnitude);
        Ok(())
    }

    fn limit_map_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        let three = <T as Scalar>::from_f64(3.0);
        out.fill(constants::pi::<T>() / <T as Float>::sqrt(three));
        Ok(())
    }

    fn check_increment_impl(&self, _x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        checked_increment(&v).map(|_| ())
    }

    fn check_projection_impl(&self, input: VecRef<'_, T>) -> Result<()> {
        M::check_projection(input)
    }

    fn format_point_impl(&self, x: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
        M::format_point(x, prefix, precision)
    }
}
