//! Spatial-domain convolution with the tap loop written out by hand.
//!
//! Only isotropic kernels of extent 3 or 5 on 1D, 2D and 3D arrays are
//! handled. The interior sum touches the taps in the same row-major order as
//! [`crate::DirectConvExt`], so both engines agree bit for bit; edge cells go
//! through the same boundary path.

use ndarray::{
    Array, ArrayBase, ArrayD, ArrayView, ArrayView1, ArrayViewD, Data, Dim, IntoDimension, Ix,
    Ix1, RemoveAxis,
};
use num::traits::NumAssign;

use crate::{
    direct::{convolve_along, convolve_same, InteriorSum},
    dispatch::{self, RankedConv},
    kernel::{row_major_strides, KernelGeometry},
    BoundaryMode, ConvError,
};

#[cfg(test)]
mod tests;

/// Kernel extents with a hand-unrolled path.
pub const UNROLLED_EXTENTS: [usize; 2] = [3, 5];

// Taps along the innermost axis around `cur + o`, weights from `w[b..]`.
macro_rules! row3 {
    ($acc:ident, $cur:ident, $o:expr, $s:expr, $w:ident, $b:expr) => {
        $acc += *$cur.offset($o - $s) * $w[$b];
        $acc += *$cur.offset($o) * $w[$b + 1];
        $acc += *$cur.offset($o + $s) * $w[$b + 2];
    };
}

macro_rules! row5 {
    ($acc:ident, $cur:ident, $o:expr, $s:expr, $w:ident, $b:expr) => {
        $acc += *$cur.offset($o - 2 * $s) * $w[$b];
        $acc += *$cur.offset($o - $s) * $w[$b + 1];
        $acc += *$cur.offset($o) * $w[$b + 2];
        $acc += *$cur.offset($o + $s) * $w[$b + 3];
        $acc += *$cur.offset($o + 2 * $s) * $w[$b + 4];
    };
}

macro_rules! plane3 {
    ($acc:ident, $cur:ident, $o:expr, $s0:expr, $s1:expr, $w:ident, $b:expr) => {
        row3!($acc, $cur, $o - $s0, $s1, $w, $b);
        row3!($acc, $cur, $o, $s1, $w, $b + 3);
        row3!($acc, $cur, $o + $s0, $s1, $w, $b + 6);
    };
}

macro_rules! plane5 {
    ($acc:ident, $cur:ident, $o:expr, $s0:expr, $s1:expr, $w:ident, $b:expr) => {
        row5!($acc, $cur, $o - 2 * $s0, $s1, $w, $b);
        row5!($acc, $cur, $o - $s0, $s1, $w, $b + 5);
        row5!($acc, $cur, $o, $s1, $w, $b + 10);
        row5!($acc, $cur, $o + $s0, $s1, $w, $b + 15);
        row5!($acc, $cur, $o + 2 * $s0, $s1, $w, $b + 20);
    };
}

/// Interior path of the unrolled engine.
pub(crate) struct UnrolledSum<T, const N: usize> {
    extent: usize,
    weights: Vec<T>,
    strides: [isize; N],
}

impl<T: Copy, const N: usize> UnrolledSum<T, N> {
    /// Fails with [`ConvError::UnrolledExtent`] unless every axis of `kernel`
    /// has the same extent, 3 or 5.
    pub fn new<S>(kernel: &ArrayBase<S, Dim<[Ix; N]>>, strides: [isize; N]) -> Result<Self, ConvError>
    where
        S: Data<Elem = T>,
        Dim<[Ix; N]>: RemoveAxis,
    {
        if !(1..=3).contains(&N) {
            return Err(ConvError::UnsupportedRank(N));
        }

        let geometry = KernelGeometry::of(kernel);
        let extent = geometry.extent[0];
        if !UNROLLED_EXTENTS.contains(&extent) || !geometry.is_isotropic(extent) {
            return Err(ConvError::UnrolledExtent(kernel.shape().to_vec()));
        }

        Ok(Self {
            extent,
            weights: kernel.iter().copied().collect(),
            strides,
        })
    }
}

impl<T: NumAssign + Copy, const N: usize> InteriorSum<T> for UnrolledSum<T, N> {
    #[inline]
    fn sum(&self, data: &[T], center: usize) -> T {
        let w = &self.weights;
        let s: &[isize] = &self.strides;
        let mut acc = T::zero();

        // SAFETY: only interior cells reach this path, so every tap stays
        // within `data`
        unsafe {
            let cur = data.as_ptr().add(center);
            match (N, self.extent) {
                (1, 3) => {
                    row3!(acc, cur, 0, s[0], w, 0);
                }
                (1, 5) => {
                    row5!(acc, cur, 0, s[0], w, 0);
                }
                (2, 3) => {
                    plane3!(acc, cur, 0, s[0], s[1], w, 0);
                }
                (2, 5) => {
                    plane5!(acc, cur, 0, s[0], s[1], w, 0);
                }
                (3, 3) => {
                    plane3!(acc, cur, -s[0], s[1], s[2], w, 0);
                    plane3!(acc, cur, 0, s[1], s[2], w, 9);
                    plane3!(acc, cur, s[0], s[1], s[2], w, 18);
                }
                (3, 5) => {
                    plane5!(acc, cur, -2 * s[0], s[1], s[2], w, 0);
                    plane5!(acc, cur, -s[0], s[1], s[2], w, 25);
                    plane5!(acc, cur, 0, s[1], s[2], w, 50);
                    plane5!(acc, cur, s[0], s[1], s[2], w, 75);
                    plane5!(acc, cur, 2 * s[0], s[1], s[2], w, 100);
                }
                _ => unreachable!("checked in UnrolledSum::new"),
            }
        }

        acc
    }
}

/// Unrolled convolution on `ndarray` arrays of rank 1, 2 or 3.
pub trait UnrolledConvExt<T: NumAssign + Copy, const N: usize> {
    /// Same-size convolution with an isotropic kernel of extent 3 or 5.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndarray::array;
    /// use ndarray_conv_tune::{BoundaryMode, DirectConvExt, UnrolledConvExt};
    ///
    /// let a = array![[1., 2., 3., 4.], [5., 6., 7., 8.], [9., 10., 11., 12.]];
    /// let k = array![[0., 1., 0.], [1., -4., 1.], [0., 1., 0.]];
    ///
    /// assert_eq!(
    ///     a.conv_unrolled(&k, BoundaryMode::Periodic).unwrap(),
    ///     a.conv_direct(&k, BoundaryMode::Periodic).unwrap()
    /// );
    /// ```
    fn conv_unrolled<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;

    fn conv_unrolled_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;
}

impl<T, S, const N: usize> UnrolledConvExt<T, N> for ArrayBase<S, Dim<[Ix; N]>>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    fn conv_unrolled<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        let shape: [usize; N] = std::array::from_fn(|i| self.shape()[i]);
        let interior = UnrolledSum::new(kernel, row_major_strides(&shape))?;

        convolve_same(self, kernel, mode, &interior)
    }

    fn conv_unrolled_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        let interior = UnrolledSum::<T, 1>::new(kernel, [1])?;

        convolve_along(self, kernel, axis, mode, &interior)
    }
}

/// Dynamic-rank front end of the unrolled engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnrolledConvolver;

impl UnrolledConvolver {
    /// `true` if [`UnrolledConvolver::convolve_dyn`] accepts a kernel of this
    /// shape.
    pub fn supports(kernel_shape: &[usize]) -> bool {
        (1..=3).contains(&kernel_shape.len())
            && UNROLLED_EXTENTS.contains(&kernel_shape[0])
            && kernel_shape.iter().all(|&e| e == kernel_shape[0])
    }

    /// Same contract as [`crate::DirectConvolver::convolve_dyn`], restricted
    /// to isotropic kernels of extent 3 or 5.
    pub fn convolve_dyn<T: NumAssign + Copy>(
        &self,
        array: ArrayViewD<'_, T>,
        kernel: ArrayViewD<'_, T>,
        axis: Option<usize>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<T>, ConvError> {
        dispatch::convolve_dyn(&mut UnrolledConvolver, array, kernel, axis, mode)
    }
}

impl<T: NumAssign + Copy> RankedConv<T> for UnrolledConvolver {
    fn full<const N: usize>(
        &mut self,
        array: ArrayView<'_, T, Dim<[Ix; N]>>,
        kernel: ArrayView<'_, T, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
    {
        array.conv_unrolled(&kernel, mode)
    }

    fn along_axis<const N: usize>(
        &mut self,
        array: ArrayView<'_, T, Dim<[Ix; N]>>,
        kernel: ArrayView1<'_, T>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
    {
        array.conv_unrolled_axis(&kernel, axis, mode)
    }
}
