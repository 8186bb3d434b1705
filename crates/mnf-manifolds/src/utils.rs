//! Packing helpers between flat views and small fixed-size nalgebra types.
//!
//! Rotation matrices are stored as 9 entries in column-major order and
//! quaternions as `[x, y, z, w]`.

use mnf_core::types::{Scalar, VecMut, VecRef};
use nalgebra::{Matrix3, Quaternion, Vector3};

/// Read a 3-vector.
#[inline]
pub fn read_vector3<T: Scalar>(v: &VecRef<'_, T>) -> Vector3<T> {
    Vector3::new(v[0], v[1], v[2])
}

/// Write a 3-vector.
#[inline]
pub fn write_vector3<T: Scalar>(out: &mut VecMut<'_, T>, v: &Vector3<T>) {
    out[0] = v[0];
    out[1] = v[1];
    out[2] = v[2];
}

/// Read a column-major 3x3 matrix stored as 9 entries.
#[inline]
pub fn read_matrix3<T: Scalar>(x: &VecRef<'_, T>) -> Matrix3<T> {
    Matrix3::from_fn(|i, j| x[i + 3 * j])
}

/// Write a 3x3 matrix as 9 column-major entries.
#[inline]
pub fn write_matrix3<T: Scalar>(out: &mut VecMut<'_, T>, m: &Matrix3<T>) {
    for j in 0..3 {
        for i in 0..3 {
            out[i + 3 * j] = m[(i, j)];
        }
    }
}

/// Read a quaternion stored as `[x, y, z, w]`.
#[inline]
pub fn read_quaternion<T: Scalar>(x: &VecRef<'_, T>) -> Quaternion<T> {
    Quaternion::new(x[3], x[0], x[1], x[2])
}

/// Write a quaternion as `[x, y, z, w]`.
#[inline]
pub fn write_quaternion<T: Scalar>(out: &mut VecMut<'_, T>, q: &Quaternion<T>) {
    out[0] = q.i;
    out[1] = q.j;
    out[2] = q.k;
    out[3] = q.w;
}

/// Cross-product matrix `[v]×`, such that `[v]× u = v × u`.
#[inline]
#[rustfmt::skip]
pub fn skew<T: Scalar>(v: &Vector3<T>) -> Matrix3<T> {
    let zero = T::zero();
    Matrix3::new(
        zero, -v[2], v[1],
        v[2], zero, -v[0],
        -v[1], v[0], zero,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnf_core::types::DVector;

    #[test]
    fn test_matrix_packing_is_column_major() {
        let flat = DVector::from_vec((0..9).map(f64::from).collect());
        let m = read_matrix3::<f64>(&(&flat).into());
        assert_eq!(m[(1, 0)], 1.0);
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m[(2, 2)], 8.0);

        let mut back = DVector::zeros(9);
        write_matrix3(&mut (&mut back).into(), &m);
        assert_eq!(back, flat);
    }

    #[test]
    fn test_quaternion_packing_puts_w_last() {
        let flat = DVector::from_vec(vec![0.1, 0.2, 0.3, 0.9]);
        let q = read_quaternion::<f64>(&(&flat).into());
        assert_eq!(q.w, 0.9);
        assert_eq!(q.imag(), Vector3::new(0.1, 0.2, 0.3));

        let mut back = DVector::zeros(4);
        write_quaternion(&mut (&mut back).into(), &q);
        assert_eq!(back, flat);
    }

    #[test]
    fn test_skew_matches_cross_product() {
        let v = Vector3::new(1.0, -2.0, 0.5);
        let u = Vector3::new(0.3, 0.7, -1.1);
        assert_eq!(skew(&v) * u, v.cross(&u));
    }
}
