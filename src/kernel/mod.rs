//! Kernel geometry shared by the spatial-domain engines.

use std::ops::Range;

use ndarray::{ArrayBase, Axis, Data, DataMut, Dim, Dimension, IntoDimension, Ix, Slice};
use num::Zero;

/// Per-axis reach of a kernel around its centre tap.
///
/// The centre of an axis with extent `e` is `lo = (e - 1) / 2`, so taps for
/// output cell `x` cover `x - lo ..= x + hi` with `hi = e - 1 - lo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KernelGeometry<const N: usize> {
    pub extent: [usize; N],
    pub lo: [usize; N],
    pub hi: [usize; N],
}

impl<const N: usize> KernelGeometry<N> {
    pub fn new(extent: [usize; N]) -> Self {
        let lo = extent.map(|e| e.saturating_sub(1) / 2);
        let hi = std::array::from_fn(|i| extent[i].saturating_sub(1) - lo[i]);

        Self { extent, lo, hi }
    }

    pub fn of<S: Data>(kernel: &ArrayBase<S, Dim<[Ix; N]>>) -> Self
    where
        Dim<[Ix; N]>: Dimension,
    {
        Self::new(std::array::from_fn(|i| kernel.shape()[i]))
    }

    /// Output positions along `axis` whose taps all land inside `0..n`.
    #[inline]
    pub fn interior(&self, axis: usize, n: usize) -> Range<usize> {
        let start = self.lo[axis];
        let end = n.saturating_sub(self.hi[axis]).max(start);
        start..end
    }

    pub fn is_isotropic(&self, extent: usize) -> bool {
        self.extent.iter().all(|&e| e == extent)
    }
}

/// Zeroes every cell of `output` that is not interior for a kernel of
/// `kernel_shape`, which is what the direct engines leave on the edges under
/// [`crate::BoundaryMode::Zero`].
pub(crate) fn clear_edge_frame<T, S, D>(output: &mut ArrayBase<S, D>, kernel_shape: &[usize])
where
    T: Zero + Clone,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    for (axis, &extent) in kernel_shape.iter().enumerate().take(output.ndim()) {
        let n = output.len_of(Axis(axis));
        let interior = KernelGeometry::new([extent]).interior(0, n);
        let (start, end) = (interior.start.min(n), interior.end.min(n));

        output
            .slice_axis_mut(Axis(axis), Slice::from(..start))
            .fill(T::zero());
        output
            .slice_axis_mut(Axis(axis), Slice::from(end..))
            .fill(T::zero());
    }
}

/// Row-major strides for `shape`.
#[inline]
pub(crate) fn row_major_strides<const N: usize>(shape: &[usize; N]) -> [isize; N] {
    let mut strides = [1isize; N];
    for i in (0..N.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as isize;
    }
    strides
}

/// Generates the flat offset of every kernel tap relative to the output cell,
/// paired with the tap weight, in row-major kernel order.
///
/// With `strides` being the strides of a standard-layout input, the tap at
/// kernel index `p` for the cell at flat position `c` reads `c + offset`.
pub(crate) fn gen_offset_list<T, S, const N: usize>(
    kernel: &ArrayBase<S, Dim<[Ix; N]>>,
    strides: &[isize; N],
) -> Vec<(isize, T)>
where
    T: Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: Dimension,
{
    let geometry = KernelGeometry::of(kernel);

    kernel
        .indexed_iter()
        .map(|(index, &v)| {
            let index = index.into_dimension();
            (
                (0..N)
                    .map(|n| (index[n] as isize - geometry.lo[n] as isize) * strides[n])
                    .sum::<isize>(),
                v,
            )
        })
        .collect()
}

/// Advances `index` over the first `axes` axes of `shape`, last of those
/// fastest. Returns `false` once every position has been visited.
#[inline]
pub(crate) fn advance<const N: usize>(index: &mut [usize; N], shape: &[usize; N], axes: usize) -> bool {
    for a in (0..axes).rev() {
        index[a] += 1;
        if index[a] < shape[a] {
            return true;
        }
        index[a] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn geometry_odd_and_even() {
        let g = KernelGeometry::new([3, 5, 4]);
        assert_eq!(g.lo, [1, 2, 1]);
        assert_eq!(g.hi, [1, 2, 2]);

        assert_eq!(g.interior(0, 10), 1..9);
        assert_eq!(g.interior(1, 10), 2..8);
        // even extent reaches one further to the right
        assert_eq!(g.interior(2, 10), 1..8);
        // too small for any interior cell
        assert!(g.interior(1, 3).is_empty());
    }

    #[test]
    fn strides() {
        assert_eq!(row_major_strides(&[4]), [1]);
        assert_eq!(row_major_strides(&[2, 3]), [3, 1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), [12, 4, 1]);
    }

    #[test]
    fn offsets() {
        let kernel = array![[1, 2, 3], [4, 5, 6], [7, 8, 9]];
        let list = gen_offset_list(&kernel, &[10, 1]);
        assert_eq!(
            list,
            vec![
                (-11, 1),
                (-10, 2),
                (-9, 3),
                (-1, 4),
                (0, 5),
                (1, 6),
                (9, 7),
                (10, 8),
                (11, 9)
            ]
        );

        let kernel = array![1., 1.];
        let list = gen_offset_list(&kernel, &[1]);
        assert_eq!(list, vec![(0, 1.), (1, 1.)]);
    }

    #[test]
    fn edge_frame() {
        let mut a = ndarray::Array2::<f64>::ones((4, 6));
        clear_edge_frame(&mut a, &[3, 4]);
        assert_eq!(
            a,
            array![
                [0., 0., 0., 0., 0., 0.],
                [0., 1., 1., 1., 0., 0.],
                [0., 1., 1., 1., 0., 0.],
                [0., 0., 0., 0., 0., 0.]
            ]
        );

        // no interior at all
        let mut a = ndarray::Array1::<f64>::ones(3);
        clear_edge_frame(&mut a, &[9]);
        assert_eq!(a, array![0., 0., 0.]);
    }

    #[test]
    fn advance_outer_axes() {
        let shape = [2, 3, 7];
        let mut index = [0; 3];
        let mut visited = 1;
        while advance(&mut index, &shape, 2) {
            assert_eq!(index[2], 0);
            visited += 1;
        }
        assert_eq!(visited, 6);
        assert_eq!(index, [0, 0, 0]);
    }
}
