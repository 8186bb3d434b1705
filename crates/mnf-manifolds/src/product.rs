//! # Cartesian Product M₁ × M₂ × ... × Mₙ
//!
//! The product composes borrowed manifolds into a single manifold whose
//! points and increments are the concatenations of the factors' ones.
//!
//! ## Mathematical Definition
//!
//! ```text
//! M = M₁ × ... × Mₙ = {(x₁, ..., xₙ) : xᵢ ∈ Mᵢ}
//! (x₁, ..., xₙ) ⊕ (v₁, ..., vₙ) = (x₁ ⊕ v₁, ..., xₙ ⊕ vₙ)
//! ```
//!
//! Jacobians are block diagonal and transports act block by block; there is
//! no coupling between factors.
//!
//! Every block is checked against its factor's domain before the first block
//! is written, so a call that fails leaves its output untouched.
//!
//! ## Data Layout
//!
//! Because a factor's representation size generally differs from its tangent
//! size (SO(3) in the matrix chart stores 9 numbers for 3 degrees of
//! freedom), the product keeps two prefix-sum tables:
//!
//! ```text
//! R³ × SO3 × S2     tangent offsets        [0, 3, 6, 9]
//!                   representation offsets [0, 3, 12, 15]
//! ```
//!
//! Representation-space data (points, columns of `diffMap` inputs) is sliced
//! with the representation table, tangent-space data (increments, transport
//! inputs) with the tangent table.
//!
//! ## Ownership
//!
//! Factors are borrowed for the lifetime of the product and locked for it: a
//! locked manifold cannot be absorbed into another product, and a product
//! that is itself a factor can no longer grow. Dropping the product releases
//! its locks.
//!
//! ## Example Usage
//!
//! ```rust
//! use mnf_core::prelude::*;
//! use mnf_manifolds::{CartesianProduct, Euclidean, SO3Quaternion};
//!
//! let r3 = Euclidean::<f64>::new(3)?;
//! let so3 = SO3Quaternion::<f64>::new()?;
//! let pose = CartesianProduct::from_pair(&r3, &so3)?;
//! assert_eq!(pose.name(), "R3xSO3");
//! assert_eq!(pose.tangent_offsets(), &[0, 3, 6]);
//! assert_eq!(pose.representation_offsets(), &[0, 3, 7]);
//!
//! let x = pose.identity()?;
//! let v = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.1]);
//! let mut y = DVector::zeros(7);
//! pose.plus((&mut y).into(), (&x).into(), (&v).into())?;
//! assert_eq!(pose.sub_value(&y, 0)?[0], 1.0);
//! # Ok::<(), mnf_core::ManifoldError>(())
//! ```

use mnf_core::{
    contract,
    error::{ManifoldError, Result},
    manifold::{Manifold, ManifoldBase},
    types::{MatMut, MatRef, Scalar, VecMut, VecRef},
    utils::{combine_hash, compute_hash},
};
use nalgebra::{storage::RawStorage, storage::RawStorageMut, Dyn, Matrix, U1};
use rand::RngCore;

/// Product of borrowed manifolds.
#[derive(Debug)]
pub struct CartesianProduct<'a, T: Scalar> {
    base: ManifoldBase,
    submanifolds: Vec<&'a dyn Manifold<T>>,
    tangent_offsets: Vec<usize>,
    representation_offsets: Vec<usize>,
}

impl<'a, T: Scalar> CartesianProduct<'a, T> {
    /// Creates the empty product, a trivial manifold of dimension 0.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base: ManifoldBase::new(0, 0, 0, "")?,
            submanifolds: Vec::new(),
            tangent_offsets: vec![0],
            representation_offsets: vec![0],
        })
    }

    /// Creates `m1 × m2`.
    pub fn from_pair(m1: &'a dyn Manifold<T>, m2: &'a dyn Manifold<T>) -> Result<Self> {
        let mut product = Self::new()?;
        product.multiply(m1)?;
        product.multiply(m2)?;
        Ok(product)
    }

    /// Appends `m` as the last factor and locks it for this product.
    ///
    /// # Errors
    ///
    /// Fails with [`ManifoldError::Locked`] if this product is itself a
    /// factor of another product, or if `m` belongs to another product.
    pub fn multiply(&mut self, m: &'a dyn Manifold<T>) -> Result<&mut Self> {
        self.base.ensure_unlocked()?;
        m.base().lock_for(self.base.id())?;

        self.submanifolds.push(m);
        let t = self.base.tangent_dim() + m.tangent_dim();
        let r = self.base.representation_dim() + m.representation_dim();
        self.tangent_offsets.push(t);
        self.representation_offsets.push(r);
        self.base.set_dimensions(self.base.dim() + m.dim(), t, r)?;

        let name = self
            .submanifolds
            .iter()
            .map(|sub| sub.name())
            .collect::<Vec<_>>()
            .join("x");
        self.base.set_name(name);

        log::debug!(
            "product #{} is now {} (dims {}, {}, {})",
            self.base.id(),
            self.base.name(),
            self.base.dim(),
            t,
            r
        );
        Ok(self)
    }

    /// Start of every factor's block in tangent vectors, plus the total size.
    pub fn tangent_offsets(&self) -> &[usize] {
        &self.tangent_offsets
    }

    /// Start of every factor's block in points, plus the total size.
    pub fn representation_offsets(&self) -> &[usize] {
        &self.representation_offsets
    }

    /// Representation block of factor `i` in the product point `x`.
    pub fn sub_value<'b, S>(&self, x: &'b Matrix<T, Dyn, U1, S>, i: usize) -> Result<VecRef<'b, T>>
    where
        S: RawStorage<T, Dyn, U1, RStride = U1, CStride = Dyn>,
    {
        self.check_index(i)?;
        contract::require_len("point", x.len(), self.representation_dim())?;
        let (start, len) = self.representation_block(i);
        Ok(x.rows(start, len))
    }

    /// Writable representation block of factor `i` in the product point `x`.
    pub fn sub_value_mut<'b, S>(
        &self,
        x: &'b mut Matrix<T, Dyn, U1, S>,
        i: usize,
    ) -> Result<VecMut<'b, T>>
    where
        S: RawStorageMut<T, Dyn, U1, RStride = U1, CStride = Dyn>,
    {
        self.check_index(i)?;
        contract::require_len("point", x.len(), self.representation_dim())?;
        let (start, len) = self.representation_block(i);
        Ok(x.rows_mut(start, len))
    }

    fn check_index(&self, i: usize) -> Result<()> {
        contract::require(i < self.submanifolds.len(), || {
            ManifoldError::invalid_parameter(format!(
                "{} has {} submanifolds, index {i} is out of range",
                self.base.name(),
                self.submanifolds.len()
            ))
        })
    }

    #[inline]
    fn tangent_block(&self, i: usize) -> (usize, usize) {
        let start = self.tangent_offsets[i];
        (start, self.tangent_offsets[i + 1] - start)
    }

    #[inline]
    fn representation_block(&self, i: usize) -> (usize, usize) {
        let start = self.representation_offsets[i];
        (start, self.representation_offsets[i + 1] - start)
    }

    /// Factors with their tangent and representation blocks.
    fn blocks(
        &self,
    ) -> impl Iterator<Item = (&'a dyn Manifold<T>, (usize, usize), (usize, usize))> + '_ {
        self.submanifolds
            .iter()
            .enumerate()
            .map(|(i, sub)| (*sub, self.tangent_block(i), self.representation_block(i)))
    }
}

impl<T: Scalar> Drop for CartesianProduct<'_, T> {
    fn drop(&mut self) {
        for sub in &self.submanifolds {
            sub.base().release_from(self.base.id());
        }
    }
}

impl<T: Scalar> Manifold<T> for CartesianProduct<'_, T> {
    fn base(&self) -> &ManifoldBase {
        &self.base
    }

    fn number_of_submanifolds(&self) -> usize {
        self.submanifolds.len()
    }

    fn submanifold(&self, i: usize) -> Result<&dyn Manifold<T>> {
        self.check_index(i)?;
        Ok(self.submanifolds[i])
    }

    fn is_elementary(&self) -> bool {
        false
    }

    fn type_hash(&self) -> u64 {
        self.submanifolds
            .iter()
            .fold(compute_hash("CartesianProduct", ""), |seed, sub| {
                combine_hash(seed, sub.type_hash())
            })
    }

    fn set_identity_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        for (sub, _, (r, nr)) in self.blocks() {
            sub.set_identity_impl(out.rows_mut(r, nr))?;
        }
        Ok(())
    }

    fn plus_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        self.check_increment_impl(x, v)?;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.plus_impl(out.rows_mut(r, nr), x.rows(r, nr), v.rows(t, nt))?;
        }
        Ok(())
    }

    fn minus_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<()> {
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.minus_impl(out.rows_mut(t, nt), x.rows(r, nr), y.rows(r, nr))?;
        }
        Ok(())
    }

    fn inv_map_impl(&self, mut out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        self.check_log_domain_impl(x)?;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.inv_map_impl(out.rows_mut(t, nt), x.rows(r, nr))?;
        }
        Ok(())
    }

    fn diff_map_impl(&self, mut out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        out.fill(T::zero());
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.diff_map_impl(out.view_mut((r, t), (nr, nt)), x.rows(r, nr))?;
        }
        Ok(())
    }

    fn apply_diff_map_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.apply_diff_map_impl(
                out.columns_mut(t, nt),
                input.columns(r, nr),
                x.rows(r, nr),
            )?;
        }
        Ok(())
    }

    fn diff_inv_map_impl(&self, mut out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        self.check_log_domain_impl(x)?;
        out.fill(T::zero());
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.diff_inv_map_impl(out.view_mut((t, r), (nt, nr)), x.rows(r, nr))?;
        }
        Ok(())
    }

    fn apply_diff_inv_map_impl(
        &self,
        mut out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        self.check_log_domain_impl(x)?;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.apply_diff_inv_map_impl(
                out.columns_mut(r, nr),
                input.columns(t, nt),
                x.rows(r, nr),
            )?;
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
        self.check_increment_impl(x, v)?;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.apply_transport_impl(
                out.rows_mut(t, nt),
                input.rows(t, nt),
                x.rows(r, nr),
                v.rows(t, nt),
            )?;
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
        self.check_increment_impl(x, v)?;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.apply_inv_transport_impl(
                out.columns_mut(t, nt),
                input.columns(t, nt),
                x.rows(r, nr),
                v.rows(t, nt),
            )?;
        }
        Ok(())
    }

    fn tangent_constraint_impl(&self, mut out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        out.fill(T::zero());
        let mut row = 0;
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            let rows = nt - sub.dim();
            sub.tangent_constraint_impl(out.view_mut((row, t), (rows, nt)), x.rows(r, nr))?;
            row += rows;
        }
        Ok(())
    }

    fn is_in_m_impl(&self, x: VecRef<'_, T>, prec: T) -> Result<bool> {
        for (sub, _, (r, nr)) in self.blocks() {
            if !sub.is_in_m_impl(x.rows(r, nr), prec)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_in_txm_impl(&self, x: VecRef<'_, T>, v: VecRef<'_, T>, prec: T) -> Result<bool> {
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            if !sub.is_in_txm_impl(x.rows(r, nr), v.rows(t, nt), prec)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn force_on_m_impl(&self, mut out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        self.check_projection_impl(input)?;
        for (sub, _, (r, nr)) in self.blocks() {
            sub.force_on_m_impl(out.rows_mut(r, nr), input.rows(r, nr))?;
        }
        Ok(())
    }

    fn force_on_txm_impl(
        &self,
        mut out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.force_on_txm_impl(out.rows_mut(t, nt), input.rows(t, nt), x.rows(r, nr))?;
        }
        Ok(())
    }

    fn create_random_point_impl(
        &self,
        mut out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        for (sub, _, (r, nr)) in self.blocks() {
            sub.create_random_point_impl(out.rows_mut(r, nr), coeff, rng)?;
        }
        Ok(())
    }

    fn typical_magnitude_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        for (sub, (t, nt), _) in self.blocks() {
            sub.typical_magnitude_impl(out.rows_mut(t, nt))?;
        }
        Ok(())
    }

    fn limit_map_impl(&self, mut out: VecMut<'_, T>) -> Result<()> {
        for (sub, (t, nt), _) in self.blocks() {
            sub.limit_map_impl(out.rows_mut(t, nt))?;
        }
        Ok(())
    }

    fn format_point_impl(&self, x: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
        let nested = format!("{prefix}  ");
        self.blocks()
            .map(|(sub, _, (r, nr))| {
                format!(
                    "{prefix}{}:\n{}",
                    sub.name(),
                    sub.format_point_impl(x.rows(r, nr), &nested, precision)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn check_increment_impl(&self, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        for (sub, (t, nt), (r, nr)) in self.blocks() {
            sub.check_increment_impl(x.rows(r, nr), v.rows(t, nt))?;
        }
        Ok(())
    }

    fn check_log_domain_impl(&self, x: VecRef<'_, T>) -> Result<()> {
        for (sub, _, (r, nr)) in self.blocks() {
            sub.check_log_domain_impl(x.rows(r, nr))?;
        }
        Ok(())
    }

    fn check_projection_impl(&self, input: VecRef<'_, T>) -> Result<()> {
        for (sub, _, (r, nr)) in self.blocks() {
            sub.check_projection_impl(input.rows(r, nr))?;
        }
        Ok(())
    }
}
