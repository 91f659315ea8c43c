use super::*;
use crate::{DirectConvExt, DirectConvolver};
use ndarray::{array, Array, Array1, Array2, Array3};
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use num::Complex;

#[test]
fn matches_direct_1d() {
    let a = Array::random(37, Uniform::new(-1f64, 1.));

    for extent in UNROLLED_EXTENTS {
        let k = Array::random(extent, Uniform::new(-1f64, 1.));
        for mode in BoundaryMode::ALL {
            assert_eq!(
                a.conv_unrolled(&k, mode).unwrap(),
                a.conv_direct(&k, mode).unwrap(),
                "extent {extent}, {mode}"
            );
        }
    }
}

#[test]
fn matches_direct_2d() {
    let a = Array::random((17, 23), Uniform::new(-1f64, 1.));

    for extent in UNROLLED_EXTENTS {
        let k = Array::random((extent, extent), Uniform::new(-1f64, 1.));
        for mode in BoundaryMode::ALL {
            assert_eq!(
                a.conv_unrolled(&k, mode).unwrap(),
                a.conv_direct(&k, mode).unwrap(),
                "extent {extent}, {mode}"
            );
        }
    }
}

#[test]
fn matches_direct_3d() {
    let a = Array::random((9, 11, 8), Uniform::new(-1f32, 1.));

    for extent in UNROLLED_EXTENTS {
        let k = Array::random((extent, extent, extent), Uniform::new(-1f32, 1.));
        for mode in BoundaryMode::ALL {
            assert_eq!(
                a.conv_unrolled(&k, mode).unwrap(),
                a.conv_direct(&k, mode).unwrap(),
                "extent {extent}, {mode}"
            );
        }
    }
}

#[test]
fn matches_direct_complex() {
    let re = Array::random((12, 10), Uniform::new(-1f64, 1.));
    let im = Array::random((12, 10), Uniform::new(-1f64, 1.));
    let a = Array2::from_shape_fn((12, 10), |ix| Complex::new(re[ix], im[ix]));
    let k = Array2::from_shape_fn((5, 5), |(i, j)| Complex::new(i as f64 - 2., j as f64 * 0.5));

    for mode in BoundaryMode::ALL {
        assert_eq!(
            a.conv_unrolled(&k, mode).unwrap(),
            a.conv_direct(&k, mode).unwrap()
        );
    }
}

#[test]
fn matches_direct_along_axis() {
    let a = Array::random((6, 7, 8), Uniform::new(-1f64, 1.));
    let k = array![0.1, -0.4, 1.3, -0.4, 0.1];

    for axis in 0..3 {
        for mode in BoundaryMode::ALL {
            assert_eq!(
                a.conv_unrolled_axis(&k, axis, mode).unwrap(),
                a.conv_direct_axis(&k, axis, mode).unwrap()
            );
        }
    }
}

#[test]
fn laplacian() {
    let a = array![1., 2., 3., 4., 5.];
    let k = array![1., -2., 1.];

    assert_eq!(
        a.conv_unrolled(&k, BoundaryMode::Zero).unwrap(),
        array![0., 0., 0., 0., 0.]
    );
    assert_eq!(
        a.conv_unrolled(&k, BoundaryMode::Periodic).unwrap(),
        array![5., 0., 0., 0., -5.]
    );
}

#[test]
fn small_arrays_fall_back_to_edges() {
    // no interior at all: every cell goes through the boundary policy
    let a = array![[1., 2.], [3., 4.]];
    let k = Array2::ones((3, 3));

    assert_eq!(
        a.conv_unrolled(&k, BoundaryMode::Periodic).unwrap(),
        a.conv_direct(&k, BoundaryMode::Periodic).unwrap()
    );
    assert_eq!(
        a.conv_unrolled(&k, BoundaryMode::Zero).unwrap(),
        Array2::<f64>::zeros((2, 2))
    );
}

#[test]
fn rejects_other_extents() {
    let a = Array2::<f64>::ones((10, 10));

    assert!(matches!(
        a.conv_unrolled(&Array2::ones((7, 7)), BoundaryMode::Zero),
        Err(ConvError::UnrolledExtent(shape)) if shape == vec![7, 7]
    ));
    assert!(matches!(
        a.conv_unrolled(&Array2::ones((3, 5)), BoundaryMode::Zero),
        Err(ConvError::UnrolledExtent(_))
    ));
    assert!(matches!(
        a.conv_unrolled(&Array2::ones((4, 4)), BoundaryMode::Zero),
        Err(ConvError::UnrolledExtent(_))
    ));
    assert!(matches!(
        a.conv_unrolled_axis(&Array1::ones(9), 0, BoundaryMode::Zero),
        Err(ConvError::UnrolledExtent(_))
    ));
}

#[test]
fn supports() {
    assert!(UnrolledConvolver::supports(&[3]));
    assert!(UnrolledConvolver::supports(&[5, 5]));
    assert!(UnrolledConvolver::supports(&[3, 3, 3]));
    assert!(!UnrolledConvolver::supports(&[7]));
    assert!(!UnrolledConvolver::supports(&[3, 5]));
    assert!(!UnrolledConvolver::supports(&[3, 3, 3, 3]));
    assert!(!UnrolledConvolver::supports(&[]));
}

#[test]
fn dyn_matches_direct() {
    let a = Array3::from_shape_fn((5, 6, 7), |(i, j, k)| ((i * 31 + j * 17 + k * 7) % 11) as f64);
    let k = Array3::from_shape_fn((3, 3, 3), |(i, j, k)| (i + j + k) as f64 - 3.);

    let unrolled = UnrolledConvolver
        .convolve_dyn(a.view().into_dyn(), k.view().into_dyn(), None, BoundaryMode::Mirror)
        .unwrap();
    let direct = DirectConvolver
        .convolve_dyn(a.view().into_dyn(), k.view().into_dyn(), None, BoundaryMode::Mirror)
        .unwrap();
    assert_eq!(unrolled, direct);

    let k1 = array![1., 2., 1.];
    let unrolled = UnrolledConvolver
        .convolve_dyn(a.view().into_dyn(), k1.view().into_dyn(), Some(2), BoundaryMode::Zero)
        .unwrap();
    assert_eq!(unrolled, a.conv_direct_axis(&k1, 2, BoundaryMode::Zero).unwrap().into_dyn());
}
