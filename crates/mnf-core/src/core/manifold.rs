//! Core manifold trait and structural bookkeeping.
//!
//! A manifold here is a *chart-based* description of a smooth space: points
//! are stored in a representation space `R^r`, increments live in a tangent
//! space `R^t`, and the space itself has `d` intrinsic degrees of freedom.
//! These three sizes generally differ:
//!
//! | manifold               | d | t | r |
//! |------------------------|---|---|---|
//! | `R^n`                  | n | n | n |
//! | SO(3), matrix chart    | 3 | 3 | 9 |
//! | SO(3), quaternion chart| 3 | 3 | 4 |
//! | S2                     | 2 | 3 | 3 |
//!
//! # Mathematical Background
//!
//! The retraction `x ⊕ v` (`plus`) moves a point along an increment, and the
//! logarithm `x ⊖ y` (`minus`) returns the increment `v` such that
//! `y ⊕ v = x`. Optimizers linearize through the Jacobians of these maps:
//!
//! - `diffMap(x)` is the `r x t` Jacobian of `v ↦ x ⊕ v` at `v = 0`,
//! - `diffInvMap(x)` is the `t x r` Jacobian of the logarithm at the identity,
//!
//! and carry curvature information between tangent spaces with the parallel
//! transport along `v`.
//!
//! # Calling convention
//!
//! Every operation reads views and writes into caller-provided views. The
//! public methods check sizes through the [`contract`] layer, then forward to
//! the `*_impl` method the implementor provides. No method on the fast path
//! allocates; the few that must stage a copy take a [`ReusableBuffer`].

use crate::core::{
    contract,
    error::{ManifoldError, Result},
    types::{DMatrix, DVector, MatMut, MatRef, Scalar, VecMut, VecRef},
};
use crate::memory::ReusableBuffer;
use rand::RngCore;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Dimensions, name, identity and ownership lock shared by all manifolds.
///
/// The lock records which product, if any, has absorbed the manifold. It is
/// an atomic owner id (`0` when free) so manifolds stay `Sync`.
#[derive(Debug)]
pub struct ManifoldBase {
    dim: usize,
    tangent_dim: usize,
    representation_dim: usize,
    name: String,
    id: u64,
    owner: AtomicU64,
}

impl ManifoldBase {
    /// Create the bookkeeping for a manifold.
    ///
    /// Fails unless `representation_dim >= tangent_dim >= dim`.
    pub fn new(
        dim: usize,
        tangent_dim: usize,
        representation_dim: usize,
        name: impl Into<String>,
    ) -> Result<Self> {
        check_dimensions(dim, tangent_dim, representation_dim)?;
        Ok(Self {
            dim,
            tangent_dim,
            representation_dim,
            name: name.into(),
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            owner: AtomicU64::new(0),
        })
    }

    /// Intrinsic number of degrees of freedom.
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Size of tangent vectors.
    pub const fn tangent_dim(&self) -> usize {
        self.tangent_dim
    }

    /// Size of the point representation.
    pub const fn representation_dim(&self) -> usize {
        self.representation_dim
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the manifold.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Process-unique id of this instance.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Id of the product that owns this manifold, if any.
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            0 => None,
            owner => Some(owner),
        }
    }

    /// Whether the manifold has been absorbed into a product.
    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    /// Mark the manifold as owned by `owner`.
    ///
    /// Locking again for the same owner is a no-op, so a product may contain
    /// the same manifold several times.
    pub fn lock_for(&self, owner: u64) -> Result<()> {
        match self
            .owner
            .compare_exchange(0, owner, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                log::debug!("{} (#{}) locked by product #{owner}", self.name, self.id);
                Ok(())
            }
            Err(current) if current == owner => Ok(()),
            Err(current) => contract::require(false, || {
                ManifoldError::locked(format!(
                    "{} (#{}) already belongs to product #{current}",
                    self.name, self.id
                ))
            }),
        }
    }

    /// Release the lock held by `owner`. Returns whether it was held.
    pub fn release_from(&self, owner: u64) -> bool {
        let released = self
            .owner
            .compare_exchange(owner, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            log::debug!("{} (#{}) released by product #{owner}", self.name, self.id);
        }
        released
    }

    /// Fail if the manifold is owned by a product.
    pub fn ensure_unlocked(&self) -> Result<()> {
        contract::require(!self.is_locked(), || {
            ManifoldError::locked(format!(
                "{} (#{}) cannot change structure while owned by a product",
                self.name, self.id
            ))
        })
    }

    /// Change the three dimensions of an unlocked manifold.
    pub fn set_dimensions(
        &mut self,
        dim: usize,
        tangent_dim: usize,
        representation_dim: usize,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        check_dimensions(dim, tangent_dim, representation_dim)?;
        self.dim = dim;
        self.tangent_dim = tangent_dim;
        self.representation_dim = representation_dim;
        Ok(())
    }
}

/// A clone is a new manifold: fresh id, not owned by any product.
impl Clone for ManifoldBase {
    fn clone(&self) -> Self {
        Self {
            dim: self.dim,
            tangent_dim: self.tangent_dim,
            representation_dim: self.representation_dim,
            name: self.name.clone(),
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            owner: AtomicU64::new(0),
        }
    }
}

fn check_dimensions(dim: usize, tangent_dim: usize, representation_dim: usize) -> Result<()> {
    contract::require(
        representation_dim >= tangent_dim && tangent_dim >= dim,
        || {
            ManifoldError::invalid_parameter(format!(
                "dimensions must satisfy representation ({representation_dim}) >= \
                 tangent ({tangent_dim}) >= intrinsic ({dim})"
            ))
        },
    )
}

/// Serializable snapshot of a manifold's structure.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifoldInfo {
    /// Manifold name
    pub name: String,
    /// Intrinsic dimension
    pub dim: usize,
    /// Tangent vector size
    pub tangent_dim: usize,
    /// Point representation size
    pub representation_dim: usize,
    /// Structural type hash
    pub type_hash: u64,
    /// Descriptors of the submanifolds, empty for elementary manifolds
    pub submanifolds: Vec<ManifoldInfo>,
}

/// Uniform interface of every geometric space.
///
/// Implementors provide the `*_impl` methods; callers use the checked methods,
/// which validate every view size against [`dim`](Self::dim),
/// [`tangent_dim`](Self::tangent_dim) and
/// [`representation_dim`](Self::representation_dim) before forwarding.
/// An `*_impl` method may therefore assume correctly sized arguments, and must
/// write every entry of its output.
///
/// The trait is object safe; products hold their factors as
/// `&dyn Manifold<T>`.
pub trait Manifold<T: Scalar>: Debug + Send + Sync {
    /// Shared bookkeeping of this manifold.
    fn base(&self) -> &ManifoldBase;

    /// Number of factors; `1` for an elementary manifold.
    fn number_of_submanifolds(&self) -> usize;

    /// Factor `i`. An elementary manifold returns itself for `i == 0`.
    fn submanifold(&self, i: usize) -> Result<&dyn Manifold<T>>;

    /// Whether this manifold is not a product.
    fn is_elementary(&self) -> bool {
        true
    }

    /// Structural hash; equal hashes mean interchangeable operations.
    fn type_hash(&self) -> u64;

    // ------------------------------------------------------------------
    // Operations to implement
    // ------------------------------------------------------------------

    /// Write the identity element.
    fn set_identity_impl(&self, out: VecMut<'_, T>) -> Result<()>;

    /// Retraction `out = x ⊕ v`.
    fn plus_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()>;

    /// Logarithm `out = x ⊖ y`, so that `y ⊕ out = x`.
    fn minus_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>)
        -> Result<()>;

    /// Logarithm relative to the identity.
    fn inv_map_impl(&self, out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()>;

    /// Write the `r x t` Jacobian of the retraction at `x`.
    fn diff_map_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()>;

    /// `out = input * diffMap(x)`.
    fn apply_diff_map_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()>;

    /// Write the `t x r` Jacobian of the logarithm at `x`.
    fn diff_inv_map_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()>;

    /// `out = input * diffInvMap(x)`.
    fn apply_diff_inv_map_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()>;

    /// Transport the columns of `input` from `x` to `x ⊕ v`.
    fn apply_transport_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()>;

    /// Right action of the transposed transport on the rows of `input`.
    fn apply_inv_transport_impl(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()>;

    /// Write the `(t - d) x t` matrix whose null space is the tangent space at `x`.
    fn tangent_constraint_impl(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()>;

    /// Whether `x` is on the manifold within `prec`.
    fn is_in_m_impl(&self, x: VecRef<'_, T>, prec: T) -> Result<bool>;

    /// Whether `v` is in the tangent space at `x` within `prec`.
    fn is_in_txm_impl(&self, x: VecRef<'_, T>, v: VecRef<'_, T>, prec: T) -> Result<bool>;

    /// Project `input` onto the manifold.
    fn force_on_m_impl(&self, out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()>;

    /// Project `input` onto the tangent space at `x`.
    fn force_on_txm_impl(
        &self,
        out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()>;

    /// Retract a random increment of magnitude `coeff` from the identity.
    fn create_random_point_impl(
        &self,
        out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()>;

    /// Per-axis scale of tangent increments.
    fn typical_magnitude_impl(&self, out: VecMut<'_, T>) -> Result<()>;

    /// Per-axis bound on increments for which the chart is valid.
    fn limit_map_impl(&self, out: VecMut<'_, T>) -> Result<()>;

    /// Render `x`, each line starting with `prefix`.
    fn format_point_impl(&self, x: VecRef<'_, T>, prefix: &str, precision: usize) -> String;

    // ------------------------------------------------------------------
    // Domain checks
    // ------------------------------------------------------------------
    //
    // Each check reports the error the matching operation would return,
    // without writing anything. Products run them over every block before
    // the first write, so a failing factor leaves the whole output untouched.

    /// Fail if `plus` or the transports reject the increment `v` at `x`.
    fn check_increment_impl(&self, _x: VecRef<'_, T>, _v: VecRef<'_, T>) -> Result<()> {
        Ok(())
    }

    /// Fail if the logarithm at the identity, or its Jacobian, is undefined at `x`.
    fn check_log_domain_impl(&self, _x: VecRef<'_, T>) -> Result<()> {
        Ok(())
    }

    /// Fail if `input` cannot be projected onto the manifold.
    fn check_projection_impl(&self, _input: VecRef<'_, T>) -> Result<()> {
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checked interface
    // ------------------------------------------------------------------

    /// Human-readable name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Intrinsic number of degrees of freedom.
    fn dim(&self) -> usize {
        self.base().dim()
    }

    /// Size of tangent vectors.
    fn tangent_dim(&self) -> usize {
        self.base().tangent_dim()
    }

    /// Size of the point representation.
    fn representation_dim(&self) -> usize {
        self.base().representation_dim()
    }

    /// Whether a product owns this manifold.
    fn is_locked(&self) -> bool {
        self.base().is_locked()
    }

    /// Write the identity element into `out`.
    fn set_identity(&self, out: VecMut<'_, T>) -> Result<()> {
        contract::require_len("identity", out.len(), self.representation_dim())?;
        self.set_identity_impl(out)
    }

    /// Allocate a new vector holding the identity element.
    fn identity(&self) -> Result<DVector<T>> {
        let mut out = DVector::zeros(self.representation_dim());
        self.set_identity_impl((&mut out).into())?;
        Ok(out)
    }

    /// Retraction `out = x ⊕ v`.
    fn plus(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, v: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("increment", v.len(), self.tangent_dim())?;
        contract::require_len("output point", out.len(), self.representation_dim())?;
        self.plus_impl(out, x, v)
    }

    /// `x ← x ⊕ v`, computed in `buffer`. On error `x` is left unchanged.
    fn plus_in_place(
        &self,
        mut x: VecMut<'_, T>,
        v: VecRef<'_, T>,
        buffer: &mut ReusableBuffer<T>,
    ) -> Result<()> {
        let n = x.len();
        let mut staged = buffer.get_vector(n);
        self.plus(staged.rows_mut(0, n), x.rows(0, n), v)?;
        x.copy_from(&staged);
        Ok(())
    }

    /// Logarithm `out = x ⊖ y`.
    fn minus(&self, out: VecMut<'_, T>, x: VecRef<'_, T>, y: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("reference point", y.len(), self.representation_dim())?;
        contract::require_len("output increment", out.len(), self.tangent_dim())?;
        self.minus_impl(out, x, y)
    }

    /// Logarithm of `x` relative to the identity.
    fn inv_map(&self, out: VecMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("output increment", out.len(), self.tangent_dim())?;
        self.inv_map_impl(out, x)
    }

    /// Jacobian of the retraction at `x`, written into an `r x t` view.
    fn diff_map_into(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_shape(
            "Jacobian",
            out.shape(),
            (self.representation_dim(), self.tangent_dim()),
        )?;
        self.diff_map_impl(out, x)
    }

    /// Jacobian of the retraction at `x` as a new `r x t` matrix.
    fn diff_map(&self, x: VecRef<'_, T>) -> Result<DMatrix<T>> {
        let mut out = DMatrix::zeros(self.representation_dim(), self.tangent_dim());
        self.diff_map_into((&mut out).into(), x)?;
        Ok(out)
    }

    /// `out = input * diffMap(x)` without forming the Jacobian.
    fn apply_diff_map(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require(input.ncols() == self.representation_dim(), || {
            ManifoldError::dimension_mismatch(
                format!("input with {} columns", self.representation_dim()),
                format!("{} columns", input.ncols()),
            )
        })?;
        contract::require_shape("output", out.shape(), (input.nrows(), self.tangent_dim()))?;
        self.apply_diff_map_impl(out, input, x)
    }

    /// Jacobian of the logarithm at `x`, written into a `t x r` view.
    fn diff_inv_map_into(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_shape(
            "Jacobian",
            out.shape(),
            (self.tangent_dim(), self.representation_dim()),
        )?;
        self.diff_inv_map_impl(out, x)
    }

    /// Jacobian of the logarithm at `x` as a new `t x r` matrix.
    fn diff_inv_map(&self, x: VecRef<'_, T>) -> Result<DMatrix<T>> {
        let mut out = DMatrix::zeros(self.tangent_dim(), self.representation_dim());
        self.diff_inv_map_into((&mut out).into(), x)?;
        Ok(out)
    }

    /// `out = input * diffInvMap(x)` without forming the Jacobian.
    fn apply_diff_inv_map(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require(input.ncols() == self.tangent_dim(), || {
            ManifoldError::dimension_mismatch(
                format!("input with {} columns", self.tangent_dim()),
                format!("{} columns", input.ncols()),
            )
        })?;
        contract::require_shape(
            "output",
            out.shape(),
            (input.nrows(), self.representation_dim()),
        )?;
        self.apply_diff_inv_map_impl(out, input, x)
    }

    /// Transport the columns of `input`, attached at `x`, along `v`.
    fn apply_transport(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("increment", v.len(), self.tangent_dim())?;
        contract::require(input.nrows() == self.tangent_dim(), || {
            ManifoldError::dimension_mismatch(
                format!("input with {} rows", self.tangent_dim()),
                format!("{} rows", input.nrows()),
            )
        })?;
        contract::require_shape("output", out.shape(), input.shape())?;
        self.apply_transport_impl(out, input, x, v)
    }

    /// In-place [`apply_transport`](Self::apply_transport) staged through `buffer`.
    /// On error `m` is left unchanged.
    fn apply_transport_in_place(
        &self,
        mut m: MatMut<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
        buffer: &mut ReusableBuffer<T>,
    ) -> Result<()> {
        let (rows, cols) = m.shape();
        let mut staged = buffer.get_map(rows, cols);
        self.apply_transport(staged.rows_mut(0, rows), m.rows(0, rows), x, v)?;
        m.copy_from(&staged);
        Ok(())
    }

    /// Apply the transposed transport along `v` to the rows of `input`.
    fn apply_inv_transport(
        &self,
        out: MatMut<'_, T>,
        input: MatRef<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
    ) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("increment", v.len(), self.tangent_dim())?;
        contract::require(input.ncols() == self.tangent_dim(), || {
            ManifoldError::dimension_mismatch(
                format!("input with {} columns", self.tangent_dim()),
                format!("{} columns", input.ncols()),
            )
        })?;
        contract::require_shape("output", out.shape(), input.shape())?;
        self.apply_inv_transport_impl(out, input, x, v)
    }

    /// In-place [`apply_inv_transport`](Self::apply_inv_transport) staged through `buffer`.
    /// On error `m` is left unchanged.
    fn apply_inv_transport_in_place(
        &self,
        mut m: MatMut<'_, T>,
        x: VecRef<'_, T>,
        v: VecRef<'_, T>,
        buffer: &mut ReusableBuffer<T>,
    ) -> Result<()> {
        let (rows, cols) = m.shape();
        let mut staged = buffer.get_map(rows, cols);
        self.apply_inv_transport(staged.rows_mut(0, rows), m.rows(0, rows), x, v)?;
        m.copy_from(&staged);
        Ok(())
    }

    /// Matrix of the linear constraints defining the tangent space at `x`.
    fn tangent_constraint(&self, out: MatMut<'_, T>, x: VecRef<'_, T>) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_shape(
            "constraint",
            out.shape(),
            (self.tangent_dim() - self.dim(), self.tangent_dim()),
        )?;
        self.tangent_constraint_impl(out, x)
    }

    /// Whether `x` is on the manifold within `prec`.
    fn is_in_m(&self, x: VecRef<'_, T>, prec: T) -> Result<bool> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        self.is_in_m_impl(x, prec)
    }

    /// Whether `v` is in the tangent space at `x` within `prec`.
    fn is_in_txm(&self, x: VecRef<'_, T>, v: VecRef<'_, T>, prec: T) -> Result<bool> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("tangent vector", v.len(), self.tangent_dim())?;
        self.is_in_txm_impl(x, v, prec)
    }

    /// Project `input` onto the manifold.
    fn force_on_m(&self, out: VecMut<'_, T>, input: VecRef<'_, T>) -> Result<()> {
        contract::require_len("input", input.len(), self.representation_dim())?;
        contract::require_len("output point", out.len(), self.representation_dim())?;
        self.force_on_m_impl(out, input)
    }

    /// Project `input` onto the tangent space at `x`.
    fn force_on_txm(
        &self,
        out: VecMut<'_, T>,
        input: VecRef<'_, T>,
        x: VecRef<'_, T>,
    ) -> Result<()> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        contract::require_len("input", input.len(), self.tangent_dim())?;
        contract::require_len("output", out.len(), self.tangent_dim())?;
        self.force_on_txm_impl(out, input, x)
    }

    /// Random point obtained by retracting a perturbation of magnitude `coeff`.
    fn create_random_point(
        &self,
        out: VecMut<'_, T>,
        coeff: T,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        contract::require_len("output point", out.len(), self.representation_dim())?;
        self.create_random_point_impl(out, coeff, rng)
    }

    /// Allocating [`create_random_point`](Self::create_random_point) on the
    /// thread-local generator.
    fn random_point(&self, coeff: T) -> Result<DVector<T>> {
        let mut out = DVector::zeros(self.representation_dim());
        let mut rng = rand::thread_rng();
        self.create_random_point((&mut out).into(), coeff, &mut rng)?;
        Ok(out)
    }

    /// Per-axis scale of tangent increments.
    fn typical_magnitude(&self, out: VecMut<'_, T>) -> Result<()> {
        contract::require_len("magnitude", out.len(), self.tangent_dim())?;
        self.typical_magnitude_impl(out)
    }

    /// Per-axis bound on increments for which the chart is valid.
    fn limit_map(&self, out: VecMut<'_, T>) -> Result<()> {
        contract::require_len("limit", out.len(), self.tangent_dim())?;
        self.limit_map_impl(out)
    }

    /// Human-readable rendering of `x` with `precision` decimals.
    fn format_point(&self, x: VecRef<'_, T>, prefix: &str, precision: usize) -> Result<String> {
        contract::require_len("point", x.len(), self.representation_dim())?;
        Ok(self.format_point_impl(x, prefix, precision))
    }

    /// Structural descriptor of this manifold and its factors.
    fn info(&self) -> ManifoldInfo {
        let submanifolds = if self.is_elementary() {
            Vec::new()
        } else {
            (0..self.number_of_submanifolds())
                .filter_map(|i| self.submanifold(i).ok())
                .map(|m| m.info())
                .collect()
        };
        ManifoldInfo {
            name: self.name().to_owned(),
            dim: self.dim(),
            tangent_dim: self.tangent_dim(),
            representation_dim: self.representation_dim(),
            type_hash: self.type_hash(),
            submanifolds,
        }
    }
}

/// Format a vector as `prefix[a, b, c]`.
pub fn format_row<T: Scalar>(values: VecRef<'_, T>, prefix: &str, precision: usize) -> String {
    let entries: Vec<String> = values
        .iter()
        .map(|value| format!("{value:.precision$}"))
        .collect();
    format!("{prefix}[{}]", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::compute_hash;
    use approx::assert_relative_eq;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    /// Points of the plane stored as `(x, y, 1)`.
    #[derive(Debug)]
    struct AffinePlane {
        base: ManifoldBase,
    }

    impl AffinePlane {
        fn new() -> Self {
            Self {
                base: ManifoldBase::new(2, 2, 3, "P2").unwrap(),
            }
        }
    }

    impl Manifold<f64> for AffinePlane {
        fn base(&self) -> &ManifoldBase {
            &self.base
        }
        fn number_of_submanifolds(&self) -> usize {
            1
        }
        fn submanifold(&self, i: usize) -> Result<&dyn Manifold<f64>> {
            contract::require(i == 0, || ManifoldError::invalid_parameter("index"))?;
            Ok(self)
        }
        fn type_hash(&self) -> u64 {
            compute_hash("P2", "")
        }
        fn set_identity_impl(&self, mut out: VecMut<'_, f64>) -> Result<()> {
            out.copy_from_slice(&[0.0, 0.0, 1.0]);
            Ok(())
        }
        fn plus_impl(
            &self,
            mut out: VecMut<'_, f64>,
            x: VecRef<'_, f64>,
            v: VecRef<'_, f64>,
        ) -> Result<()> {
            // Writes the first entry before validating the second.
            out[0] = x[0] + v[0];
            contract::require(v[1].is_finite(), || {
                ManifoldError::invalid_tangent("non-finite increment")
            })?;
            out[1] = x[1] + v[1];
            out[2] = 1.0;
            Ok(())
        }
        fn minus_impl(
            &self,
            mut out: VecMut<'_, f64>,
            x: VecRef<'_, f64>,
            y: VecRef<'_, f64>,
        ) -> Result<()> {
            out[0] = x[0] - y[0];
            out[1] = x[1] - y[1];
            Ok(())
        }
        fn inv_map_impl(&self, mut out: VecMut<'_, f64>, x: VecRef<'_, f64>) -> Result<()> {
            out.copy_from(&x.rows(0, 2));
            Ok(())
        }
        fn diff_map_impl(&self, mut out: MatMut<'_, f64>, _x: VecRef<'_, f64>) -> Result<()> {
            out.fill_with_identity();
            Ok(())
        }
        fn apply_diff_map_impl(
            &self,
            mut out: MatMut<'_, f64>,
            input: MatRef<'_, f64>,
            _x: VecRef<'_, f64>,
        ) -> Result<()> {
            out.copy_from(&input.columns(0, 2));
            Ok(())
        }
        fn diff_inv_map_impl(&self, mut out: MatMut<'_, f64>, _x: VecRef<'_, f64>) -> Result<()> {
            out.fill_with_identity();
            Ok(())
        }
        fn apply_diff_inv_map_impl(
            &self,
            mut out: MatMut<'_, f64>,
            input: MatRef<'_, f64>,
            _x: VecRef<'_, f64>,
        ) -> Result<()> {
            out.columns_mut(0, 2).copy_from(&input);
            out.column_mut(2).fill(0.0);
            Ok(())
        }
        fn apply_transport_impl(
            &self,
            mut out: MatMut<'_, f64>,
            input: MatRef<'_, f64>,
            _x: VecRef<'_, f64>,
            v: VecRef<'_, f64>,
        ) -> Result<()> {
            // Shear by the increment so that staging mistakes are visible.
            for j in 0..input.ncols() {
                out[(0, j)] = input[(0, j)] + v[0] * input[(1, j)];
                out[(1, j)] = input[(1, j)];
            }
            Ok(())
        }
        fn apply_inv_transport_impl(
            &self,
            mut out: MatMut<'_, f64>,
            input: MatRef<'_, f64>,
            _x: VecRef<'_, f64>,
            v: VecRef<'_, f64>,
        ) -> Result<()> {
            for i in 0..input.nrows() {
                out[(i, 0)] = input[(i, 0)];
                out[(i, 1)] = input[(i, 1)] + v[0] * input[(i, 0)];
            }
            Ok(())
        }
        fn tangent_constraint_impl(&self, _out: MatMut<'_, f64>, _x: VecRef<'_, f64>) -> Result<()> {
            Ok(())
        }
        fn is_in_m_impl(&self, x: VecRef<'_, f64>, prec: f64) -> Result<bool> {
            Ok((x[2] - 1.0).abs() < prec)
        }
        fn is_in_txm_impl(&self, _x: VecRef<'_, f64>, _v: VecRef<'_, f64>, _prec: f64) -> Result<bool> {
            Ok(true)
        }
        fn force_on_m_impl(&self, mut out: VecMut<'_, f64>, input: VecRef<'_, f64>) -> Result<()> {
            out.copy_from(&input);
            out[2] = 1.0;
            Ok(())
        }
        fn force_on_txm_impl(
            &self,
            mut out: VecMut<'_, f64>,
            input: VecRef<'_, f64>,
            _x: VecRef<'_, f64>,
        ) -> Result<()> {
            out.copy_from(&input);
            Ok(())
        }
        fn create_random_point_impl(
            &self,
            mut out: VecMut<'_, f64>,
            coeff: f64,
            rng: &mut dyn RngCore,
        ) -> Result<()> {
            out[0] = coeff * rng.gen_range(-1.0..1.0);
            out[1] = coeff * rng.gen_range(-1.0..1.0);
            out[2] = 1.0;
            Ok(())
        }
        fn typical_magnitude_impl(&self, mut out: VecMut<'_, f64>) -> Result<()> {
            out.fill(1.0);
            Ok(())
        }
        fn limit_map_impl(&self, mut out: VecMut<'_, f64>) -> Result<()> {
            out.fill(f64::INFINITY);
            Ok(())
        }
        fn format_point_impl(&self, x: VecRef<'_, f64>, prefix: &str, precision: usize) -> String {
            format_row(x.rows(0, 2), prefix, precision)
        }
    }

    #[test]
    fn test_base_rejects_inconsistent_dimensions() {
        assert!(ManifoldBase::new(3, 3, 9, "SO3").is_ok());
        assert!(ManifoldBase::new(0, 0, 0, "empty").is_ok());
        let err = ManifoldBase::new(3, 2, 9, "bad").unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidParameter { .. }));
        assert!(ManifoldBase::new(2, 3, 2, "bad").is_err());
    }

    #[test]
    fn test_lock_lifecycle() {
        let mut base = ManifoldBase::new(1, 1, 1, "R1").unwrap();
        assert!(!base.is_locked());

        base.lock_for(42).unwrap();
        base.lock_for(42).unwrap();
        assert_eq!(base.owner(), Some(42));
        assert!(matches!(base.lock_for(7), Err(ManifoldError::Locked { .. })));
        assert!(base.set_dimensions(2, 2, 2).is_err());

        assert!(!base.release_from(7));
        assert!(base.release_from(42));
        assert!(!base.is_locked());
        base.set_dimensions(2, 2, 2).unwrap();
        assert_eq!(base.representation_dim(), 2);
    }

    #[test]
    fn test_clone_is_a_fresh_instance() {
        let base = ManifoldBase::new(1, 1, 1, "R1").unwrap();
        base.lock_for(3).unwrap();
        let copy = base.clone();
        assert_ne!(copy.id(), base.id());
        assert!(!copy.is_locked());
        assert_eq!(copy.name(), "R1");
    }

    #[test]
    fn test_checked_interface_rejects_bad_sizes() {
        let m = AffinePlane::new();
        let x = DVector::from_vec(vec![1.0, 2.0, 1.0]);
        let v = DVector::from_vec(vec![0.5, -0.5]);
        let mut out = DVector::zeros(3);

        m.plus((&mut out).into(), (&x).into(), (&v).into()).unwrap();
        assert_eq!(out.as_slice(), &[1.5, 1.5, 1.0]);

        let err = m.plus((&mut out).into(), (&v).into(), (&v).into()).unwrap_err();
        assert!(matches!(err, ManifoldError::DimensionMismatch { .. }));

        let mut short = DVector::zeros(2);
        assert!(m.plus((&mut short).into(), (&x).into(), (&v).into()).is_err());
        assert!(m.minus((&mut out).into(), (&x).into(), (&x).into()).is_err());

        let input = DMatrix::zeros(4, 2);
        let mut wrong = DMatrix::zeros(4, 3);
        assert!(m
            .apply_diff_map((&mut wrong).into(), (&input).into(), (&x).into())
            .is_err());
        assert!(m
            .apply_transport((&mut wrong).into(), (&input).into(), (&x).into(), (&v).into())
            .is_err());
        assert!(m.is_in_m((&v).into(), 1e-9).is_err());
    }

    #[test]
    fn test_allocating_conveniences() {
        let m = AffinePlane::new();
        let id = m.identity().unwrap();
        assert_eq!(id.as_slice(), &[0.0, 0.0, 1.0]);

        let j = m.diff_map((&id).into()).unwrap();
        assert_eq!(j.shape(), (3, 2));
        assert_eq!(j[(0, 0)], 1.0);
        assert_eq!(j[(2, 1)], 0.0);

        let p = m.random_point(0.5).unwrap();
        assert!(m.is_in_m((&p).into(), 1e-12).unwrap());
        assert!(p[0].abs() <= 0.5 && p[1].abs() <= 0.5);
    }

    #[test]
    fn test_seeded_random_points_are_reproducible() {
        let m = AffinePlane::new();
        let mut a = DVector::zeros(3);
        let mut b = DVector::zeros(3);
        m.create_random_point((&mut a).into(), 2.0, &mut SmallRng::seed_from_u64(9))
            .unwrap();
        m.create_random_point((&mut b).into(), 2.0, &mut SmallRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_in_place_variants_stage_their_input() {
        let m = AffinePlane::new();
        let mut buffer = ReusableBuffer::new();

        let mut x = DVector::from_vec(vec![1.0, 2.0, 1.0]);
        let v = DVector::from_vec(vec![0.25, 0.5]);
        m.plus_in_place((&mut x).into(), (&v).into(), &mut buffer)
            .unwrap();
        assert_eq!(x.as_slice(), &[1.25, 2.5, 1.0]);

        let mut h = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let expected_t = DMatrix::from_row_slice(2, 2, &[1.75, 3.0, 3.0, 4.0]);
        m.apply_transport_in_place((&mut h).into(), (&x).into(), (&v).into(), &mut buffer)
            .unwrap();
        assert_relative_eq!(h, expected_t);

        let mut g = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let expected_inv = DMatrix::from_row_slice(2, 2, &[1.0, 2.25, 3.0, 4.75]);
        m.apply_inv_transport_in_place((&mut g).into(), (&x).into(), (&v).into(), &mut buffer)
            .unwrap();
        assert_relative_eq!(g, expected_inv);
    }

    #[test]
    fn test_failed_in_place_plus_keeps_the_point() {
        let m = AffinePlane::new();
        let mut buffer = ReusableBuffer::new();
        let mut x = DVector::from_vec(vec![1.0, 2.0, 1.0]);

        let v = DVector::from_vec(vec![0.5, f64::NAN]);
        let err = m
            .plus_in_place((&mut x).into(), (&v).into(), &mut buffer)
            .unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidTangent { .. }));
        assert_eq!(x.as_slice(), &[1.0, 2.0, 1.0]);

        let v = DVector::from_vec(vec![0.5, 0.5]);
        m.plus_in_place((&mut x).into(), (&v).into(), &mut buffer)
            .unwrap();
        assert_eq!(x.as_slice(), &[1.5, 2.5, 1.0]);
    }

    #[test]
    fn test_info_and_formatting() {
        let m = AffinePlane::new();
        let info = m.info();
        assert_eq!(info.name, "P2");
        assert_eq!(
            (info.dim, info.tangent_dim, info.representation_dim),
            (2, 2, 3)
        );
        assert!(info.submanifolds.is_empty());

        let x = DVector::from_vec(vec![1.0, -2.5, 1.0]);
        assert_eq!(
            m.format_point((&x).into(), "  ", 2).unwrap(),
            "  [1.00, -2.50]"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_info_serde_round_trip() {
        use pretty_assertions::assert_eq;

        let info = AffinePlane::new().info();
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"name\":\"P2\""));
        let back: ManifoldInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
