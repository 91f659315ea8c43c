//! Runtime rank dispatch for the dynamic-dimension entry points.

use ndarray::{
    Array, ArrayD, ArrayView, ArrayView1, ArrayViewD, Dim, IntoDimension, Ix, Ix1, Ix2, Ix3,
    RemoveAxis,
};

use crate::{BoundaryMode, ConvError};

/// An engine that can run at any fixed rank.
pub(crate) trait RankedConv<T> {
    fn full<const N: usize>(
        &mut self,
        array: ArrayView<'_, T, Dim<[Ix; N]>>,
        kernel: ArrayView<'_, T, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>;

    fn along_axis<const N: usize>(
        &mut self,
        array: ArrayView<'_, T, Dim<[Ix; N]>>,
        kernel: ArrayView1<'_, T>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>;
}

/// Picks the fixed-rank path for `array` and `kernel`.
///
/// A kernel of the array's rank is applied in full; `axis` must then be
/// absent (or 0 for 1D arrays). A 1D kernel on a 2D/3D array runs along
/// `axis`, defaulting to axis 0.
pub(crate) fn convolve_dyn<T, C>(
    conv: &mut C,
    array: ArrayViewD<'_, T>,
    kernel: ArrayViewD<'_, T>,
    axis: Option<usize>,
    mode: BoundaryMode,
) -> Result<ArrayD<T>, ConvError>
where
    C: RankedConv<T>,
{
    let (ndim, kdim) = (array.ndim(), kernel.ndim());
    if !(1..=3).contains(&ndim) {
        return Err(ConvError::UnsupportedRank(ndim));
    }
    if let Some(axis) = axis {
        if axis >= ndim {
            return Err(ConvError::AxisOutOfRange { axis, ndim });
        }
    }

    match (ndim, kdim, axis) {
        (1, 1, _) => Ok(conv
            .full(
                array.into_dimensionality::<Ix1>()?,
                kernel.into_dimensionality::<Ix1>()?,
                mode,
            )?
            .into_dyn()),
        (2, 2, None) => Ok(conv
            .full(
                array.into_dimensionality::<Ix2>()?,
                kernel.into_dimensionality::<Ix2>()?,
                mode,
            )?
            .into_dyn()),
        (3, 3, None) => Ok(conv
            .full(
                array.into_dimensionality::<Ix3>()?,
                kernel.into_dimensionality::<Ix3>()?,
                mode,
            )?
            .into_dyn()),
        (2, 1, axis) => Ok(conv
            .along_axis(
                array.into_dimensionality::<Ix2>()?,
                kernel.into_dimensionality::<Ix1>()?,
                axis.unwrap_or(0),
                mode,
            )?
            .into_dyn()),
        (3, 1, axis) => Ok(conv
            .along_axis(
                array.into_dimensionality::<Ix3>()?,
                kernel.into_dimensionality::<Ix1>()?,
                axis.unwrap_or(0),
                mode,
            )?
            .into_dyn()),
        _ => Err(ConvError::RankMismatch {
            array: ndim,
            kernel: kdim,
        }),
    }
}
