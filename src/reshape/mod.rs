//! Cyclic axis rotation.
//!
//! Lets the 1D engines run along any axis of a 2D/3D array: rotate the target
//! axis into the innermost (contiguous) position, process every row, rotate
//! back.

use ndarray::{Array, ArrayBase, Data, Dim, IntoDimension, Ix, RemoveAxis};

/// Rotates the axes of `input` left by `shift`, so that result axis `i` is
/// input axis `(i + shift) % N`. The result is an owned standard-layout copy.
///
/// # Example
///
/// ```rust
/// use ndarray::array;
/// use ndarray_conv_tune::reshape::shift_dim;
///
/// let a = array![[1, 2, 3], [4, 5, 6]];
/// assert_eq!(shift_dim(&a, 1), array![[1, 4], [2, 5], [3, 6]]);
/// ```
pub fn shift_dim<T, S, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    shift: usize,
) -> Array<T, Dim<[Ix; N]>>
where
    T: Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    let mut axes: [usize; N] = std::array::from_fn(|i| i);
    axes.rotate_left(shift % N);

    let rotated = input.view().permuted_axes(axes);

    let mut buffer = Array::uninit(rotated.raw_dim());
    buffer.zip_mut_with(&rotated, |dst, &src| {
        dst.write(src);
    });

    // every element was written by the zip above
    unsafe { buffer.assume_init() }
}

/// Inverse of [`shift_dim`].
pub fn unshift_dim<T, S, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    shift: usize,
) -> Array<T, Dim<[Ix; N]>>
where
    T: Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    shift_dim(input, (N - shift % N) % N)
}

/// Shift that moves `axis` into the innermost position of an `ndim` array.
#[inline]
pub fn innermost_shift(axis: usize, ndim: usize) -> usize {
    (axis + 1) % ndim
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array3, Axis};

    #[test]
    fn shift_2d_is_transpose() {
        let a = array![[1, 2, 3], [4, 5, 6]];
        let t = shift_dim(&a, 1);
        assert_eq!(t, a.t());
        assert!(t.is_standard_layout());
        assert_eq!(unshift_dim(&t, 1), a);
    }

    #[test]
    fn shift_3d_rotates_left() {
        let a = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| i * 100 + j * 10 + k);

        let s1 = shift_dim(&a, 1);
        assert_eq!(s1.shape(), &[3, 4, 2]);
        assert_eq!(s1[[2, 1, 1]], a[[1, 2, 1]]);

        let s2 = shift_dim(&a, 2);
        assert_eq!(s2.shape(), &[4, 2, 3]);
        assert_eq!(s2[[3, 1, 2]], a[[1, 2, 3]]);

        assert_eq!(unshift_dim(&s1, 1), a);
        assert_eq!(unshift_dim(&s2, 2), a);
        assert_eq!(shift_dim(&a, 3), a);
    }

    #[test]
    fn innermost() {
        let a = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| i * 100 + j * 10 + k);
        for axis in 0..3 {
            let s = shift_dim(&a, innermost_shift(axis, 3));
            assert_eq!(s.len_of(Axis(2)), a.len_of(Axis(axis)));
        }
        // a lane along axis 0 becomes a contiguous row
        let s = shift_dim(&a, innermost_shift(0, 3));
        assert_eq!(s.slice(s![0, 0, ..]).to_vec(), a.slice(s![.., 0, 0]).to_vec());
    }

    #[test]
    fn non_standard_input() {
        let a = array![[1., 2.], [3., 4.], [5., 6.]];
        let view = a.t();
        let s = shift_dim(&view, 0);
        assert!(s.is_standard_layout());
        assert_eq!(s, array![[1., 3., 5.], [2., 4., 6.]]);
    }
}
