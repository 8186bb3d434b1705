//! Non-allocating dense products.
//!
//! nalgebra's general `gemm` routes large dynamic products through
//! `matrixmultiply`, which allocates packing buffers. The Jacobians handled
//! here have at most nine columns, so plain loops over views are both
//! allocation-free and fast enough.

use crate::core::types::Scalar;
use nalgebra::{Dim, Matrix, RawStorage, RawStorageMut};

/// `out = a * b`.
///
/// `out` must not alias `a` or `b`, which the borrow checker enforces.
#[inline]
pub fn mul_to<T, R1, C1, S1, R2, C2, S2, R3, C3, S3>(
    a: &Matrix<T, R1, C1, S1>,
    b: &Matrix<T, R2, C2, S2>,
    out: &mut Matrix<T, R3, C3, S3>,
) where
    T: Scalar,
    R1: Dim,
    C1: Dim,
    R2: Dim,
    C2: Dim,
    R3: Dim,
    C3: Dim,
    S1: RawStorage<T, R1, C1>,
    S2: RawStorage<T, R2, C2>,
    S3: RawStorageMut<T, R3, C3>,
{
    debug_assert_eq!(a.ncols(), b.nrows());
    debug_assert_eq!(out.shape(), (a.nrows(), b.ncols()));

    for j in 0..b.ncols() {
        for i in 0..a.nrows() {
            let mut acc = T::zero();
            for k in 0..a.ncols() {
                acc += a[(i, k)] * b[(k, j)];
            }
            out[(i, j)] = acc;
        }
    }
}

/// `out = a * bᵀ`.
#[inline]
pub fn mul_transpose_to<T, R1, C1, S1, R2, C2, S2, R3, C3, S3>(
    a: &Matrix<T, R1, C1, S1>,
    b: &Matrix<T, R2, C2, S2>,
    out: &mut Matrix<T, R3, C3, S3>,
) where
    T: Scalar,
    R1: Dim,
    C1: Dim,
    R2: Dim,
    C2: Dim,
    R3: Dim,
    C3: Dim,
    S1: RawStorage<T, R1, C1>,
    S2: RawStorage<T, R2, C2>,
    S3: RawStorageMut<T, R3, C3>,
{
    debug_assert_eq!(a.ncols(), b.ncols());
    debug_assert_eq!(out.shape(), (a.nrows(), b.nrows()));

    for j in 0..b.nrows() {
        for i in 0..a.nrows() {
            let mut acc = T::zero();
            for k in 0..a.ncols() {
                acc += a[(i, k)] * b[(j, k)];
            }
            out[(i, j)] = acc;
        }
    }
}
