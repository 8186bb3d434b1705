use approx::assert_relative_eq;
use mnf::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_prelude_builds_a_pose_problem() {
    let r3 = Euclidean::<f64>::new(3).unwrap();
    let so3 = SO3Matrix::<f64>::new().unwrap();
    let pose = CartesianProduct::from_pair(&r3, &so3).unwrap();

    let info = pose.info();
    assert_eq!(info.name, "R3xSO3");
    assert_eq!(
        (info.dim, info.tangent_dim, info.representation_dim),
        (6, 6, 12)
    );
    assert_eq!(
        info.submanifolds.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        vec!["R3", "SO3"]
    );

    let x = pose.random_point(1.0).unwrap();
    assert!(pose.is_in_m((&x).into(), 1e-10).unwrap());
}

#[test]
fn test_errors_surface_through_the_facade() {
    let s2 = S2::<f64>::new().unwrap();
    let mut out = DVector::zeros(3);
    let err = s2
        .force_on_m((&mut out).into(), (&DVector::zeros(3)).into())
        .unwrap_err();
    assert!(matches!(err, ManifoldError::NumericalError { .. }));

    let mut too_short = DVector::zeros(2);
    let err = s2
        .inv_map((&mut too_short).into(), (&s2.identity().unwrap()).into())
        .unwrap_err();
    assert!(matches!(err, ManifoldError::DimensionMismatch { .. }));
}

#[test]
fn test_in_place_transport_through_the_facade() {
    let so3 = SO3Quaternion::<f64>::new().unwrap();
    let x = so3.identity().unwrap();
    let v = DVector::from_vec(vec![0.0, 0.0, std::f64::consts::FRAC_PI_2]);
    let mut h = DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 0.0]);
    let mut buffer = ReusableBuffer::new();

    so3.apply_transport_in_place((&mut h).into(), (&x).into(), (&v).into(), &mut buffer)
        .unwrap();
    assert_relative_eq!(h.column(0).into_owned(), DVector::from_vec(vec![0.0, 1.0, 0.0]), epsilon = 1e-12);
}
