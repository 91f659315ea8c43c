//! Upsample, FIR filter, downsample.
//!
//! [`upfirdn`] inserts `up - 1` zeros between samples, convolves the result
//! with a 1D kernel through the direct engine (same-size, so the kernel is
//! centred) and keeps every `down`-th sample. [`upfirdn_axis`] does the same to
//! every lane of a 2D or 3D array along one axis.

use ndarray::{
    Array, Array1, ArrayBase, Axis, Data, Dim, IntoDimension, Ix, Ix1, RemoveAxis, Slice,
};
use num::traits::NumAssign;

use crate::{
    reshape::{innermost_shift, shift_dim, unshift_dim},
    BoundaryMode, ConvError, DirectConvExt,
};

fn check_factor(factor: usize) -> Result<isize, ConvError> {
    match factor {
        0 => Err(ConvError::InvalidFactor(factor)),
        f => Ok(f as isize),
    }
}

/// Places `factor - 1` zeros between consecutive samples.
///
/// The result has `n * factor - (factor - 1)` samples: no zeros trail the
/// last input sample.
///
/// # Example
///
/// ```rust
/// use ndarray::array;
/// use ndarray_conv_tune::upfirdn::interpolate_zeros;
///
/// let up = interpolate_zeros(&array![1, 2, 3], 2).unwrap();
/// assert_eq!(up, array![1, 0, 2, 0, 3]);
/// ```
pub fn interpolate_zeros<T, S>(
    input: &ArrayBase<S, Ix1>,
    factor: usize,
) -> Result<Array1<T>, ConvError>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
{
    let step = check_factor(factor)?;
    if input.is_empty() {
        return Err(ConvError::EmptyInput(input.shape().to_vec()));
    }

    let mut output = Array1::zeros(input.len() * factor - (factor - 1));
    output
        .slice_axis_mut(Axis(0), Slice::new(0, None, step))
        .assign(input);

    Ok(output)
}

/// Keeps samples `0, factor, 2 * factor, ...`, that is `ceil(n / factor)` of
/// them.
pub fn decimate<T, S>(input: &ArrayBase<S, Ix1>, factor: usize) -> Result<Array1<T>, ConvError>
where
    T: Clone,
    S: Data<Elem = T>,
{
    let step = check_factor(factor)?;

    Ok(input.slice_axis(Axis(0), Slice::new(0, None, step)).to_owned())
}

/// Number of samples [`upfirdn`] produces from `n` input samples.
#[inline]
pub fn upfirdn_len(n: usize, up: usize, down: usize) -> usize {
    match n {
        0 => 0,
        n => ((n - 1) * up + 1).div_ceil(down),
    }
}

/// Upsamples `input` by `up`, convolves with `kernel` and downsamples by
/// `down`.
///
/// # Example
///
/// ```rust
/// use ndarray::array;
/// use ndarray_conv_tune::{upfirdn::upfirdn, BoundaryMode};
///
/// let res = upfirdn(&array![1., 2., 3.], &array![0.5, 1., 0.5], 2, 1, BoundaryMode::Zero).unwrap();
/// assert_eq!(res, array![0., 1.5, 2., 2.5, 0.]);
/// ```
pub fn upfirdn<T, S, SK>(
    input: &ArrayBase<S, Ix1>,
    kernel: &ArrayBase<SK, Ix1>,
    up: usize,
    down: usize,
    mode: BoundaryMode,
) -> Result<Array1<T>, ConvError>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    SK: Data<Elem = T>,
{
    check_factor(down)?;

    let upsampled = interpolate_zeros(input, up)?;
    let filtered = upsampled.conv_direct(kernel, mode)?;

    decimate(&filtered, down)
}

/// [`upfirdn`] applied to every lane of `input` along `axis`.
///
/// Every other axis keeps its extent; `axis` becomes
/// [`upfirdn_len`]`(n, up, down)` long.
pub fn upfirdn_axis<T, S, SK, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    kernel: &ArrayBase<SK, Ix1>,
    up: usize,
    down: usize,
    axis: usize,
    mode: BoundaryMode,
) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    SK: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    if axis >= N {
        return Err(ConvError::AxisOutOfRange { axis, ndim: N });
    }
    check_factor(up)?;
    check_factor(down)?;
    if input.is_empty() {
        return Err(ConvError::EmptyInput(input.shape().to_vec()));
    }

    let shift = innermost_shift(axis, N);
    let rotated = shift_dim(input, shift);

    let mut shape: [usize; N] = std::array::from_fn(|i| rotated.shape()[i]);
    shape[N - 1] = upfirdn_len(shape[N - 1], up, down);
    let mut output = Array::zeros(shape);

    for (row, mut output_row) in rotated.rows().into_iter().zip(output.rows_mut()) {
        output_row.assign(&upfirdn(&row, kernel, up, down, mode)?);
    }

    Ok(unshift_dim(&output, shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn interpolate() {
        assert_eq!(
            interpolate_zeros(&array![1., 2., 3.], 2).unwrap(),
            array![1., 0., 2., 0., 3.]
        );
        assert_eq!(
            interpolate_zeros(&array![4, 5], 3).unwrap(),
            array![4, 0, 0, 5]
        );
        assert_eq!(interpolate_zeros(&array![7], 4).unwrap(), array![7]);

        let a = array![1, 2, 3];
        assert_eq!(interpolate_zeros(&a, 1).unwrap(), a);

        assert!(matches!(
            interpolate_zeros(&a, 0),
            Err(ConvError::InvalidFactor(0))
        ));
        assert!(matches!(
            interpolate_zeros(&Array1::<f64>::zeros(0), 2),
            Err(ConvError::EmptyInput(_))
        ));
    }

    #[test]
    fn decimate_keeps_every_nth() {
        let a = Array1::from_iter(0..8);
        assert_eq!(decimate(&a, 3).unwrap(), array![0, 3, 6]);
        assert_eq!(decimate(&array![1, 2, 3, 4, 5], 2).unwrap(), array![1, 3, 5]);
        assert_eq!(decimate(&a, 1).unwrap(), a);
        assert_eq!(decimate(&a, 20).unwrap(), array![0]);
        assert!(matches!(decimate(&a, 0), Err(ConvError::InvalidFactor(0))));
    }

    #[test]
    fn output_len() {
        assert_eq!(upfirdn_len(3, 2, 1), 5);
        assert_eq!(upfirdn_len(3, 2, 2), 3);
        assert_eq!(upfirdn_len(4, 3, 2), 5);
        assert_eq!(upfirdn_len(0, 2, 2), 0);
    }

    #[test]
    fn upfirdn_1d() {
        let a = array![1., 2., 3.];
        let k = array![0.5, 1., 0.5];

        // linear interpolation
        assert_eq!(
            upfirdn(&a, &k, 2, 1, BoundaryMode::Zero).unwrap(),
            array![0., 1.5, 2., 2.5, 0.]
        );
        assert_eq!(
            upfirdn(&a, &k, 2, 1, BoundaryMode::Periodic).unwrap(),
            array![2.5, 1.5, 2., 2.5, 3.5]
        );
        assert_eq!(
            upfirdn(&a, &k, 2, 2, BoundaryMode::Zero).unwrap(),
            array![0., 2., 0.]
        );

        // plain filter
        assert_eq!(
            upfirdn(&a, &array![1.], 1, 1, BoundaryMode::Zero).unwrap(),
            a
        );

        assert!(matches!(
            upfirdn(&a, &k, 2, 0, BoundaryMode::Zero),
            Err(ConvError::InvalidFactor(0))
        ));
    }

    #[test]
    fn upfirdn_along_axis_2d() {
        let a = array![[1., 2., 3.], [4., 5., 6.]];
        let k = array![0.5, 1., 0.5];

        assert_eq!(
            upfirdn_axis(&a, &k, 2, 1, 1, BoundaryMode::Zero).unwrap(),
            array![[0., 1.5, 2., 2.5, 0.], [0., 4.5, 5., 5.5, 0.]]
        );
        assert_eq!(
            upfirdn_axis(&a, &k, 2, 1, 0, BoundaryMode::Zero).unwrap(),
            array![[0., 0., 0.], [2.5, 3.5, 4.5], [0., 0., 0.]]
        );
    }

    #[test]
    fn upfirdn_along_axis_3d() {
        let a = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f64);
        let k = array![0.25, 0.5, 1., 0.5, 0.25];

        let res = upfirdn_axis(&a, &k, 3, 2, 2, BoundaryMode::Mirror).unwrap();
        assert_eq!(res.shape(), &[2, 3, 5]);
        for (lane, res_lane) in a.lanes(Axis(2)).into_iter().zip(res.lanes(Axis(2))) {
            assert_eq!(
                res_lane,
                upfirdn(&lane, &k, 3, 2, BoundaryMode::Mirror).unwrap()
            );
        }

        let res = upfirdn_axis(&a, &k, 2, 1, 0, BoundaryMode::Periodic).unwrap();
        assert_eq!(res.shape(), &[3, 3, 4]);
        for (lane, res_lane) in a.lanes(Axis(0)).into_iter().zip(res.lanes(Axis(0))) {
            assert_eq!(
                res_lane,
                upfirdn(&lane, &k, 2, 1, BoundaryMode::Periodic).unwrap()
            );
        }
    }

    #[test]
    fn upfirdn_axis_errors() {
        let a = array![[1., 2.], [3., 4.]];
        let k = array![1., 1.];

        assert!(matches!(
            upfirdn_axis(&a, &k, 2, 1, 2, BoundaryMode::Zero),
            Err(ConvError::AxisOutOfRange { axis: 2, ndim: 2 })
        ));
        assert!(matches!(
            upfirdn_axis(&a, &k, 0, 1, 0, BoundaryMode::Zero),
            Err(ConvError::InvalidFactor(0))
        ));
    }
}
