//! Finite-difference references for Jacobian tests.
//!
//! Both estimators use central differences, so with a step `h` the truncation
//! error is `O(h²)` and the round-off error about `ε / h`.

use crate::core::{
    error::Result,
    manifold::Manifold,
    types::{DMatrix, DVector},
};

/// Finite-difference estimate of `diffMap(x)`, perturbing along tangent axes.
pub fn numerical_diff_map(
    manifold: &dyn Manifold<f64>,
    x: &DVector<f64>,
    h: f64,
) -> Result<DMatrix<f64>> {
    let r = manifold.representation_dim();
    let t = manifold.tangent_dim();
    let mut jacobian = DMatrix::zeros(r, t);
    let mut forward = DVector::zeros(r);
    let mut backward = DVector::zeros(r);
    let mut step = DVector::zeros(t);

    for i in 0..t {
        step.fill(0.0);
        step[i] = h;
        manifold.plus((&mut forward).into(), x.into(), (&step).into())?;
        step[i] = -h;
        manifold.plus((&mut backward).into(), x.into(), (&step).into())?;
        jacobian.set_column(i, &((&forward - &backward) / (2.0 * h)));
    }
    Ok(jacobian)
}

/// Finite-difference estimate of `diffInvMap(x)`, perturbing the
/// representation coordinates of `x` one at a time.
pub fn numerical_diff_inv_map(
    manifold: &dyn Manifold<f64>,
    x: &DVector<f64>,
    h: f64,
) -> Result<DMatrix<f64>> {
    let r = manifold.representation_dim();
    let t = manifold.tangent_dim();
    let mut jacobian = DMatrix::zeros(t, r);
    let mut forward = DVector::zeros(t);
    let mut backward = DVector::zeros(t);
    let mut shifted = x.clone();

    for j in 0..r {
        shifted[j] = x[j] + h;
        manifold.inv_map((&mut forward).into(), (&shifted).into())?;
        shifted[j] = x[j] - h;
        manifold.inv_map((&mut backward).into(), (&shifted).into())?;
        shifted[j] = x[j];
        jacobian.set_column(j, &((&forward - &backward) / (2.0 * h)));
    }
    Ok(jacobian)
}

/// Largest absolute entry-wise difference between two matrices.
pub fn max_abs_diff(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "matrices must have the same shape");
    a.iter()
        .zip(b.iter())
        .map(|(u, v)| (u - v).abs())
        .fold(0.0, f64::max)
}
