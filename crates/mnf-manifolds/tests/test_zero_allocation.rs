//! The hot-path operations must not touch the heap once their scratch
//! buffer is warm.
#![allow(unsafe_code)]

use mnf_core::{DMatrix, DVector, Manifold, ReusableBuffer};
use mnf_manifolds::{CartesianProduct, Euclidean, SO3Matrix, SO3Quaternion, S2};
use rand::{rngs::SmallRng, SeedableRng};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

struct CountingAllocator;

thread_local! {
    static COUNTING: Cell<bool> = const { Cell::new(false) };
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn record() {
    let _ = COUNTING.try_with(|counting| {
        if counting.get() {
            let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        }
    });
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record();
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record();
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record();
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

/// Number of heap allocations performed by `f` on this thread.
fn allocations_in(f: impl FnOnce()) -> usize {
    ALLOCATIONS.with(|n| n.set(0));
    COUNTING.with(|c| c.set(true));
    f();
    COUNTING.with(|c| c.set(false));
    ALLOCATIONS.with(|n| n.get())
}

/// Runs every hot-path operation of `m` twice and checks that the second
/// pass allocates nothing.
fn assert_hot_path_is_allocation_free(m: &dyn Manifold<f64>) {
    let (t, r) = (m.tangent_dim(), m.representation_dim());
    let mut x = DVector::zeros(r);
    m.create_random_point((&mut x).into(), 1.0, &mut SmallRng::seed_from_u64(5))
        .unwrap();
    let raw = DVector::from_fn(t, |i, _| 0.1 * (i as f64 + 1.0) / t as f64);
    let mut v = DVector::zeros(t);
    m.force_on_txm((&mut v).into(), (&raw).into(), (&x).into())
        .unwrap();

    let mut y = DVector::zeros(r);
    let mut z = x.clone();
    let mut d = DVector::zeros(t);
    let columns = DMatrix::from_fn(t, 4, |i, j| (i + j) as f64);
    let rows = columns.transpose();
    let rep_rows = DMatrix::from_fn(4, r, |i, j| (i * j) as f64);
    let mut tangent_out = DMatrix::zeros(4, t);
    let mut rep_out = DMatrix::zeros(4, r);
    let mut transported = DMatrix::zeros(t, 4);
    let mut transported_rows = DMatrix::zeros(4, t);
    let mut staged_columns = columns.clone();
    let mut staged_rows = rows.clone();
    let mut buffer = ReusableBuffer::new();

    let mut pass = || {
        m.plus((&mut y).into(), (&x).into(), (&v).into()).unwrap();
        m.minus((&mut d).into(), (&y).into(), (&x).into()).unwrap();
        m.inv_map((&mut d).into(), (&x).into()).unwrap();
        m.apply_diff_map((&mut tangent_out).into(), (&rep_rows).into(), (&x).into())
            .unwrap();
        m.apply_diff_inv_map((&mut rep_out).into(), (&rows).into(), (&x).into())
            .unwrap();
        m.apply_transport((&mut transported).into(), (&columns).into(), (&x).into(), (&v).into())
            .unwrap();
        m.apply_inv_transport(
            (&mut transported_rows).into(),
            (&rows).into(),
            (&x).into(),
            (&v).into(),
        )
        .unwrap();
        m.plus_in_place((&mut z).into(), (&v).into(), &mut buffer)
            .unwrap();
        m.apply_transport_in_place((&mut staged_columns).into(), (&x).into(), (&v).into(), &mut buffer)
            .unwrap();
        m.apply_inv_transport_in_place((&mut staged_rows).into(), (&x).into(), (&v).into(), &mut buffer)
            .unwrap();
    };

    pass();
    let count = allocations_in(pass);
    assert_eq!(count, 0, "{} allocated {count} times on the hot path", m.name());
}

#[test]
fn test_euclidean_no_allocation() {
    assert_hot_path_is_allocation_free(&Euclidean::<f64>::new(6).unwrap());
}

#[test]
fn test_so3_matrix_no_allocation() {
    assert_hot_path_is_allocation_free(&SO3Matrix::<f64>::new().unwrap());
}

#[test]
fn test_so3_quaternion_no_allocation() {
    assert_hot_path_is_allocation_free(&SO3Quaternion::<f64>::new().unwrap());
}

#[test]
fn test_s2_no_allocation() {
    assert_hot_path_is_allocation_free(&S2::<f64>::new().unwrap());
}

#[test]
fn test_product_no_allocation() {
    let r3 = Euclidean::<f64>::new(3).unwrap();
    let so3 = SO3Quaternion::<f64>::new().unwrap();
    let s2 = S2::<f64>::new().unwrap();
    let mut product = CartesianProduct::new().unwrap();
    product.multiply(&r3).unwrap();
    product.multiply(&so3).unwrap();
    product.multiply(&s2).unwrap();
    assert_hot_path_is_allocation_free(&product);
}

#[test]
fn test_counter_sees_allocations() {
    let count = allocations_in(|| {
        let v = DVector::<f64>::zeros(16);
        std::hint::black_box(&v);
    });
    assert!(count >= 1);
}
