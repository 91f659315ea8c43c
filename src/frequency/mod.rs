//! Frequency-domain convolution.
//!
//! The input is padded according to the boundary mode, transformed together
//! with the reversed kernel, multiplied pointwise and transformed back; the
//! window that lines up with the input is cropped out. The result equals the
//! direct engine up to rounding, except that in [`BoundaryMode::Zero`] the
//! edge cells hold the true zero-extended sums instead of zero.

use ndarray::{
    Array, ArrayBase, ArrayD, ArrayView, ArrayView1, ArrayViewD, Axis, Data, Dim, Dimension,
    IntoDimension, Ix, Ix1, RemoveAxis,
};
use num::{Complex, Zero};
use rustfft::FftNum;

use crate::{
    direct::check_non_empty,
    dispatch::{self, RankedConv},
    kernel::KernelGeometry,
    padding::PaddingExt,
    BoundaryMode, ConvError,
};

pub mod good_size;
mod processor;

pub use processor::{FftElem, Processor};


pub trait FreqConvExt<T: FftElem, const N: usize> {
    /// Same-size convolution through the FFT, with a fresh [`Processor`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndarray::array;
    /// use ndarray_conv_tune::{BoundaryMode, FreqConvExt};
    ///
    /// let res = array![1., 2., 3., 4., 5.]
    ///     .conv_fft(&array![1., -2., 1.], BoundaryMode::Periodic)
    ///     .unwrap();
    /// let expected = [5f64, 0., 0., 0., -5.];
    /// assert!(res.iter().zip(expected).all(|(a, b)| (a - b).abs() < 1e-9));
    /// ```
    fn conv_fft<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;

    /// Like [`FreqConvExt::conv_fft`], reusing the plans cached in `processor`.
    fn conv_fft_with_processor<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
        processor: &mut Processor<T::Real>,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;

    /// Convolves every lane along `axis` with a 1D kernel.
    fn conv_fft_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;
}

impl<T, S, const N: usize> FreqConvExt<T, N> for ArrayBase<S, Dim<[Ix; N]>>
where
    T: FftElem,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    fn conv_fft<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        self.conv_fft_with_processor(kernel, mode, &mut Processor::default())
    }

    fn conv_fft_with_processor<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Dim<[Ix; N]>>,
        mode: BoundaryMode,
        processor: &mut Processor<T::Real>,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        check_non_empty(self.shape())?;
        check_non_empty(kernel.shape())?;

        let geometry = KernelGeometry::of(kernel);
        let padded = self.padding(
            mode,
            std::array::from_fn(|a| [geometry.lo[a], geometry.hi[a]]),
        )?;
        let padded_shape: [usize; N] = std::array::from_fn(|a| padded.len_of(Axis(a)));
        let fft_size = good_size::compute(&padded_shape);

        let data = Array::from_shape_fn(fft_size, |ix| {
            padded
                .get(ix.into_dimension())
                .map_or_else(Complex::zero, |&v| v.to_complex())
        });

        let mut reversed = kernel.view();
        for a in 0..N {
            reversed.invert_axis(Axis(a));
        }
        let kernel_data = Array::from_shape_fn(fft_size, |ix| {
            reversed
                .get(ix.into_dimension())
                .map_or_else(Complex::zero, |&v| v.to_complex())
        });

        let mut spectrum = processor.forward(data)?;
        let kernel_spectrum = processor.forward(kernel_data)?;
        spectrum.zip_mut_with(&kernel_spectrum, |s, &k| *s = *s * k);
        let correlated = processor.backward(spectrum)?;

        // output cell x lines up with x + extent - 1 of the circular result
        let len = correlated.len();
        let output_shape: [usize; N] = std::array::from_fn(|a| self.len_of(Axis(a)));
        Ok(Array::from_shape_fn(output_shape, |ix| {
            let ix = ix.into_dimension();
            let src: [usize; N] = std::array::from_fn(|a| ix[a] + geometry.extent[a] - 1);
            T::from_complex(correlated[src.into_dimension()], len)
        }))
    }

    fn conv_fft_axis<SK: Data<Elem = T>>(
        &self,
        kernel: &ArrayBase<SK, Ix1>,
        axis: usize,
        mode: BoundaryMode,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        self.conv_fft(&axis_kernel(kernel, axis)?, mode)
    }
}

/// Lays a 1D kernel along `axis` of an otherwise degenerate N-D kernel.
fn axis_kernel<T, SK, const N: usize>(
    kernel: &ArrayBase<SK, Ix1>,
    axis: usize,
) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>
where
    T: Copy,
    SK: Data<Elem = T>,
    Dim<[Ix; N]>: Dimension,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    if axis >= N {
        return Err(ConvError::AxisOutOfRange { axis, ndim: N });
    }

    let shape: [usize; N] = std::array::from_fn(|a| if a == axis { kernel.len() } else { 1 });
    Ok(kernel.to_owned().into_shape_with_order(shape)?)
}

/// Dynamic-rank front end of the frequency engine, holding a [`Processor`]
/// so FFT plans survive between calls.
#[derive(Debug, Default)]
pub struct FrequencyConvolver<F: FftNum> {
    processor: Processor<F>,
}

impl<F: FftNum> FrequencyConvolver<F> {
    pub fn new() -> Self {
        Self {
            processor: Processor::default(),
        }
    }

    /// Same contract as [`crate::DirectConvolver::convolve_dyn`].
    pub fn convolve_dyn<T: FftElem<Real = F>>(
        &mut self,
        array: ArrayViewD<'_, T>,
        kernel: ArrayViewD<'_, T>,
        axis: Option<usize>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<T>, ConvError> {
        dispatch::convolve_dyn(&mut WithProcessor(&mut self.processor), array, kernel, axis, mode)
    }
}

struct WithProcessor<'p, F: FftNum>(&'p mut Processor<F>);

impl<T: FftElem<Real = F>, F: FftNum> RankedConv<T> for WithProcessor<'_, F> {
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
        array.conv_fft_with_processor(&kernel, mode, self.0)
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
        array.conv_fft_with_processor(&axis_kernel(&kernel, axis)?, mode, self.0)
    }
}
