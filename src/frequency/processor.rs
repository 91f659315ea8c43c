//! N-dimensional complex FFTs over `ndarray` buffers.

use ndarray::{Array, Dim, IntoDimension, Ix, RemoveAxis};
use num::{Complex, Zero};
use rustfft::{FftNum, FftPlanner};

use crate::{reshape::shift_dim, ConvError};

/// Element types the frequency engine accepts.
///
/// Real inputs are lifted to complex values with a zero imaginary part and
/// come back as the real part of the inverse transform.
pub trait FftElem: num::traits::NumAssign + Copy + Send + Sync + 'static {
    type Real: FftNum;

    fn to_complex(self) -> Complex<Self::Real>;

    /// Converts an unnormalised inverse transform value back, dividing by the
    /// transform length `len`.
    fn from_complex(value: Complex<Self::Real>, len: usize) -> Self;
}

macro_rules! impl_fft_elem {
    ($($t:ty),*) => {
        $(
            impl FftElem for $t {
                type Real = $t;

                #[inline]
                fn to_complex(self) -> Complex<$t> {
                    Complex::new(self, 0.)
                }

                #[inline]
                fn from_complex(value: Complex<$t>, len: usize) -> Self {
                    value.re / len as $t
                }
            }

            impl FftElem for Complex<$t> {
                type Real = $t;

                #[inline]
                fn to_complex(self) -> Complex<$t> {
                    self
                }

                #[inline]
                fn from_complex(value: Complex<$t>, len: usize) -> Self {
                    value / len as $t
                }
            }
        )*
    };
}

impl_fft_elem!(f32, f64);

/// Caches FFT plans and scratch space across calls.
///
/// Reuse one processor when running many convolutions of similar sizes.
pub struct Processor<T: FftNum> {
    planner: FftPlanner<T>,
    scratch: Vec<Complex<T>>,
}

impl<T: FftNum> Default for Processor<T> {
    fn default() -> Self {
        Self {
            planner: FftPlanner::new(),
            scratch: Vec::new(),
        }
    }
}

impl<T: FftNum> std::fmt::Debug for Processor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("scratch_len", &self.scratch.len())
            .finish_non_exhaustive()
    }
}

impl<T: FftNum> Processor<T> {
    /// Forward transform over every axis.
    pub fn forward<const N: usize>(
        &mut self,
        input: Array<Complex<T>, Dim<[Ix; N]>>,
    ) -> Result<Array<Complex<T>, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
    {
        self.transform(input, false)
    }

    /// Inverse transform over every axis. The result is not normalised.
    pub fn backward<const N: usize>(
        &mut self,
        input: Array<Complex<T>, Dim<[Ix; N]>>,
    ) -> Result<Array<Complex<T>, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
    {
        self.transform(input, true)
    }

    fn transform<const N: usize>(
        &mut self,
        mut buffer: Array<Complex<T>, Dim<[Ix; N]>>,
        inverse: bool,
    ) -> Result<Array<Complex<T>, Dim<[Ix; N]>>, ConvError>
    where
        Dim<[Ix; N]>: RemoveAxis,
        [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
    {
        // always run along the contiguous last axis, then rotate the next
        // axis into its place; after N rotations the layout is back
        for _ in 0..N {
            let shape: [usize; N] = std::array::from_fn(|i| buffer.len_of(ndarray::Axis(i)));
            let len = shape[N - 1];

            let fft = if inverse {
                self.planner.plan_fft_inverse(len)
            } else {
                self.planner.plan_fft_forward(len)
            };

            let scratch_len = fft.get_inplace_scratch_len();
            if self.scratch.len() < scratch_len {
                self.scratch.resize(scratch_len, Complex::zero());
            }

            let data = if buffer.is_standard_layout() {
                buffer
            } else {
                buffer.as_standard_layout().into_owned()
            };
            let (mut raw, _) = data.into_raw_vec_and_offset();

            // processes every row of length `len` in one call
            fft.process_with_scratch(&mut raw, &mut self.scratch[..scratch_len]);

            let data = Array::from_shape_vec(shape, raw)?;
            buffer = if N > 1 { shift_dim(&data, N - 1) } else { data };
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn forward_backward_1d() {
        let mut proc = Processor::<f32>::default();
        let arr = array![
            Complex::new(1.0f32, 0.0),
            Complex::new(2.0, 0.0),
            Complex::new(3.0, 0.0),
            Complex::new(4.0, 0.0)
        ];
        let freq = proc.forward(arr.clone()).unwrap();
        assert!((freq[0].re - 10.).abs() < 1e-5);

        let recon = proc.backward(freq).unwrap();
        for (a, b) in arr.iter().zip(recon.iter()) {
            let b = Complex::<f32>::from_complex(*b, 4);
            assert!((a.re - b.re).abs() < 1e-4 && (a.im - b.im).abs() < 1e-4);
        }
    }

    #[test]
    fn forward_backward_3d() {
        let mut proc = Processor::<f64>::default();
        let arr = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| {
            Complex::new((i * 20 + j * 5 + k) as f64, (i + j) as f64)
        });
        let freq = proc.forward(arr.clone()).unwrap();
        assert_eq!(freq.shape(), arr.shape());
        // dc term is the plain sum
        assert!((freq[[0, 0, 0]] - arr.sum()).norm() < 1e-9);

        let recon = proc.backward(freq).unwrap();
        for (a, b) in arr.iter().zip(recon.iter()) {
            assert!((*a - *b / 60.).norm() < 1e-9);
        }
    }

    #[test]
    fn separable_axes() {
        // a delta at the origin transforms to all ones
        let mut proc = Processor::<f64>::default();
        let mut arr = Array2::<Complex<f64>>::zeros((4, 6));
        arr[[0, 0]] = Complex::new(1., 0.);
        let freq = proc.forward(arr).unwrap();
        assert!(freq.iter().all(|v| (v - Complex::new(1., 0.)).norm() < 1e-12));
    }

    #[test]
    fn real_elements() {
        assert_eq!(2.5f64.to_complex(), Complex::new(2.5, 0.));
        assert_eq!(f64::from_complex(Complex::new(8., 3.), 4), 2.);
        assert_eq!(
            Complex::<f32>::from_complex(Complex::new(8., 4.), 4),
            Complex::new(2., 1.)
        );
    }
}
