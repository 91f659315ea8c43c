//! Spatial-domain ("finite difference") convolution.
//!
//! Every output cell is `Σ_p array[x + p - lo] * kernel[p]`, where `lo` is the
//! kernel centre per axis. Output always has the input's shape. Cells whose
//! taps all land inside the array take a bounds-check-free path driven by a
//! precomputed offset list; the remaining edge cells go through
//! [`BoundaryMode::resolve`], or are left at zero under [`BoundaryMode::Zero`].

use std::borrow::Cow;

use ndarray::{
    Array, ArrayBase, ArrayD, ArrayView, ArrayView1, ArrayViewD, Data, Dim, IntoDimension, Ix,
    Ix1, RemoveAxis,
};
use num::traits::NumAssign;

use crate::{
    dispatch::{self, RankedConv},
    kernel::{advance, gen_offset_list, row_major_strides, KernelGeometry},
    reshape::{innermost_shift, shift_dim, unshift_dim},
    BoundaryMode, ConvError,
};


/// Sum over every kernel tap for a cell known to be in the interior.
pub(crate) trait InteriorSum<T> {
    /// `data` is the standard-layout input and `center` the flat index of
    /// the output cell.
    fn sum(&self, data: &[T], center: usize) -> T;
}

/// Interior path of the direct engine: one `(offset, weight)` pair per tap.
pub(crate) struct OffsetSum<T> {
    offsets: Vec<(isize, T)>,
}

impl<T: Copy> OffsetSum<T> {
    pub fn new<S, const N: usize>(kernel: &ArrayBase<S, Dim<[Ix; N]>>, strides: &[isize; N]) -> Self
    where
        S: Data<Elem = T>,
        Dim<[Ix; N]>: RemoveAxis,
    {
        Self {
            offsets: gen_offset_list(kernel, strides),
        }
    }
}

impl<T: NumAssign + Copy> InteriorSum<T> for OffsetSum<T> {
    #[inline]
    fn sum(&self, data: &[T], center: usize) -> T {
        let mut acc = T::zero();

        // SAFETY: callers only pass interior cells, for which every
        // `center + offset` lies inside `data`
        unsafe {
            let cur = data.as_ptr().add(center);
            self.offsets.iter().for_each(|&(offset, k)| {
                debug_assert!((center as isize + offset) < data.len() as isize);
                acc += *cur.offset(offset) * k;
            });
        }

        acc
    }
}

/// Same-size convolution of `input` with a full-rank `kernel`, using
/// `interior` for the hot path.
///
/// Rows along the innermost axis are visited in order; each row is split into
/// its leading edge, interior and trailing edge segments.
pub(crate) fn convolve_same<T, S, SK, I, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
    mode: BoundaryMode,
    interior: &I,
) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    SK: Data<Elem = T>,
    I: InteriorSum<T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    check_non_empty(input.shape())?;
    check_non_empty(kernel.shape())?;

    let input = input.as_standard_layout();
    let data: Cow<[T]> = match input.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(input.iter().copied().collect()),
    };

    let shape: [usize; N] = std::array::from_fn(|i| input.shape()[i]);
    let strides = row_major_strides(&shape);
    let geometry = KernelGeometry::of(kernel);
    let taps: Vec<T> = kernel.iter().copied().collect();

    let edges = Edges {
        data: &data,
        shape: &shape,
        strides: &strides,
        taps: &taps,
        geometry: &geometry,
        mode,
    };

    let last = N - 1;
    let row_len = shape[last];
    let row_interior = geometry.interior(last, row_len);
    let leading = row_interior.start.min(row_len);

    let mut output = vec![T::zero(); data.len()];
    let mut index = [0usize; N];

    loop {
        let row_start: usize = (0..last).map(|a| index[a] * strides[a] as usize).sum();
        let outer_interior = (0..last).all(|a| geometry.interior(a, shape[a]).contains(&index[a]));

        if outer_interior {
            for x in 0..leading {
                index[last] = x;
                edges.fill(&mut output[row_start + x], &index)?;
            }
            for x in row_interior.clone() {
                output[row_start + x] = interior.sum(&data, row_start + x);
            }
            for x in row_interior.end..row_len {
                index[last] = x;
                edges.fill(&mut output[row_start + x], &index)?;
            }
        } else {
            for x in 0..row_len {
                index[last] = x;
                edges.fill(&mut output[row_start + x], &index)?;
            }
        }

        index[last] = 0;
        if !advance(&mut index, &shape, last) {
            break;
        }
    }

    Ok(Array::from_shape_vec(shape, output)?)
}

/// Convolves every lane of `input` along `axis` with the 1D `kernel`.
///
/// The target axis is rotated into the innermost position so each lane is a
/// contiguous row, then rotated back.
pub(crate) fn convolve_along<T, S, SK, I, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    kernel: &ArrayBase<SK, Ix1>,
    axis: usize,
    mode: BoundaryMode,
    interior: &I,
) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    SK: Data<Elem = T>,
    I: InteriorSum<T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    if axis >= N {
        return Err(ConvError::AxisOutOfRange { axis, ndim: N });
    }
    check_non_empty(input.shape())?;

    let shift = innermost_shift(axis, N);
    let rotated = shift_dim(input, shift);
    let mut output = Array::zeros(rotated.raw_dim());

    for (row, mut output_row) in rotated.rows().into_iter().zip(output.rows_mut()) {
        output_row.assign(&convolve_same::<T, _, _, I, 1>(&row, kernel, mode, interior)?);
    }

    Ok(unshift_dim(&output, shift))
}

/// Edge-cell evaluation through the boundary policy.
struct Edges<'a, T, const N: usize> {
    data: &'a [T],
    shape: &'a [usize; N],
    strides: &'a [isize; N],
    taps: &'a [T],
    geometry: &'a KernelGeometry<N>,
    mode: BoundaryMode,
}

impl<T: NumAssign + Copy, const N: usize> Edges<'_, T, N> {
    #[inline]
    fn fill(&self, cell: &mut T, index: &[usize; N]) -> Result<(), ConvError> {
        if !self.mode.skips_edges() {
            *cell = self.sum(index)?;
        }
        Ok(())
    }

    fn sum(&self, index: &[usize; N]) -> Result<T, ConvError> {
        let mut acc = T::zero();
        let mut p = [0usize; N];

        for &k in self.taps {
            let mut flat = Some(0usize);
            for a in 0..N {
                let raw = index[a] as isize + p[a] as isize - self.geometry.lo[a] as isize;
                match self.mode.resolve(raw, self.shape[a])? {
                    Some(r) => flat = flat.map(|f| f + r * self.strides[a] as usize),
                    None => {
                        flat = None;
                        break;
                    }
                }
            }
            if let Some(flat) = flat {
                acc += self.data[flat] * k;
            }
            advance(&mut p, &self.geometry.extent, N);
        }

        Ok(acc)
    }
}

pub(crate) fn check_non_empty(shape: &[usize]) -> Result<(), ConvError> {
    if shape.iter().any(|&n| n == 0) {
        return Err(ConvError::EmptyInput(shape.to_vec()));
    }
    Ok(())
}

/// Direct convolution on `ndarray` arrays of rank 1, 2 or 3.
pub trait DirectConvExt<T: NumAssign + Copy, const N: usize> {
    /// Same-size convolution with a kernel of the array's rank.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndarray::array;
    /// use ndarray_conv_tune::{BoundaryMode, DirectConvExt};
    ///
    /// let res = array![1., 2., 3., 4., 5.]
    ///     .conv_direct(&array![1., -2., 1.], BoundaryMode::Zero)
    ///     .unwrap();
    /// assert_eq!(res, array![0., 0., 0., 0., 0.]);
    /// ```
    fn conv_direct<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;

    /// Same-size convolution of every lane along `axis` with a 1D kernel.
    fn conv_direct_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;
}

impl<T, S, const N: usize> DirectConvExt<T, N> for ArrayBase<S, Dim<[Ix; N]>>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    fn conv_direct<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        let shape: [usize; N] = std::array::from_fn(|i| self.shape()[i]);
        let interior = OffsetSum::new(kernel, &row_major_strides(&shape));

        convolve_same(self, kernel, mode, &interior)
    }

    fn conv_direct_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        let interior = OffsetSum::new::<SK, 1>(kernel, &[1]);

        convolve_along(self, kernel, axis, mode, &interior)
    }
}

/// Dynamic-rank front end of the direct engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectConvolver;

impl DirectConvolver {
    /// Convolves `array` with `kernel`, checking the rank combination at
    /// runtime.
    ///
    /// `kernel` must either have the array's rank, or be 1D and applied along
    /// `axis` (default 0). Arrays must be 1, 2 or 3 dimensional.
    pub fn convolve_dyn<T: NumAssign + Copy>(
        &self,
        array: ArrayViewD<'_, T>,
        kernel: ArrayViewD<'_, T>,
        axis: Option<usize>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<T>, ConvError> {
        dispatch::convolve_dyn(&mut DirectConvolver, array, kernel, axis, mode)
    }
}

impl<T: NumAssign + Copy> RankedConv<T> for DirectConvolver {
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
        array.conv_direct(&kernel, mode)
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
        array.conv_direct_axis(&kernel, axis, mode)
    }
}
