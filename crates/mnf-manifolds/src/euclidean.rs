//! Euclidean space R^n.
//!
//! The flat factor of most products, e.g. the translation part of a pose in
//! `R³ × SO(3)`. Every operation is the linear-algebra identity it reduces to:
//! `x ⊕ v = x + v`, `x ⊖ y = x − y`, identity Jacobians and transports.

use mnf_core::{
    constants, contract,
    error::{ManifoldError, Result},
    format_row,
    manifold::{Manifold, ManifoldBase},
    types::{DVector, MatMut, MatRef, Scalar, VecMut, VecRef},
    utils::{combine_hash, compute_hash},
};
use num_traits::Float;
use rand::{Rng, RngCore};

/// Euclidean space R^n with points and increments in the same coordinates.
#[derive(Debug, Clone)]
pub struct Euclidean<T: Scalar> {
    base: ManifoldBase,
    typical_magnitude: DVector<T>,
}

impl<T: Scalar> Euclidean<T> {
    /// Creates R^n, named `R{n}`.
    ///
    /// # Errors
    ///
    /// Returns an error if `n == 0`.
    pub fn new(n: usize) -> Result<Self> {
        contract::require(n > 0, || {
            ManifoldError::invalid_parameter("Euclidean space requires n >= 1")
        })?;
        Ok(Self {
            base: ManifoldBase::new(n, n, n, format!("R{n}"))?,
            typical_magnitude: DVector::from_element(n, T::one()),
        })
    }

    /// Use the same typical magnitude on every axis.
    pub fn set_typical_magnitude(&mut self, magnitude: T) {
        self.typical_magnitude.fill(magnitude);
    }

    /// Set the typical magnitude axis by axis.
    pub fn set_typical_magnitude_per_axis(&mut self, magnitude: VecRef<'_, T>) -> Result<()> {
        contract::require_len("magnitude", magnitude.len(), self.base.tangent_dim())?;
        self.typical_magnitude.copy_from(&magnitude);
        Ok(())
    }
}

impl<T: Scalar> Manifold<T> for Euclidean<T> {
    fn base(&self) -> &ManifoldBase {
        &self.base
    }

    fn number_of_submanifolds(&self) -> usize {
        1
    }

    fn submanifold(&self, i: usize) -> Result<&dyn Manifold<T>> {
        contract::require(i == 0, || {
            ManifoldError::invalid_parameter(format!("{} has no submanifold {i}", self.name()))
        })?;
        Ok(self)
    }

    fn type_hash(&self) -> u64 {
        combine_hash(compute_hash("Euclidean", ""), self.base.dim() as u64)
    }

    fn set_identity_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        out.fill(T::zero());
        Ok(())
    }

    fn plus_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        out.copy_from(&x);
        out += &v;
        Ok(())
    }

    fn minus_impl(
        &self,
        mut out: VecMut<'_, T>,
        x: VecRef<'_, T>,
        y: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&x);
        out -= &y;
        Ok(())
    }

    fn inv_map_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        out.copy_from(&x);
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

    fn diff_inv_map_impl(&self, mut out: MatMut<'_, T>, _x: VecRef<'_, T>) -> Result<()> {
        out.fill_with_identity();
        Ok(())
    }

    fn apply_diff_inv_map_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn apply_transport_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
        _v: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn apply_inv_transport_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        _x: VecRef<'_, T>,
        _v: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn tangent_constraint_impl(&self, _out: MatMut<'_, T>, _x: VecRef<'_, T>) -> Result<()> {
        Ok(())
    }

    fn is_in_m_impl(&self, x: VecRef<'_, T>, _prec: T) -> Result<bool> {
        Ok(x.iter().all(|value| Float::is_finite(*value)))
    }

    fn is_in_txm_impl(&self, _x: VecRef<'_, T>, v: VecRef<'_, T>, _prec: T) -> Result<bool> {
        Ok(v.iter().all(|value| Float::is_finite(*value)))
    }

    fn force_on_m_impl(&self, mut out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn force_on_txm_impl(
        &self,
        mut out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        _x: VecRef<'_, T>,
    ) -> Result<()> {
        out.copy_from(&input);
        Ok(())
    }

    fn create_random_point_impl(
        &self,
        mut out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        for value in out.iter_mut() {
            *value = coeff * <T as Scalar>::from_f64(rng.gen_range(-1.0..1.0));
        }
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
}
