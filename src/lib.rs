//! Same-size N-dimensional convolution for `ndarray`, with an autotuner that
//! picks the fastest strategy per input size.
//!
//! Three engines compute the same correlation `out[i] = Σ_j a[i + j - lo] · k[j]`
//! over arrays of rank 1 to 3:
//!
//! * [`DirectConvExt`]: offset-list loop, any kernel shape.
//! * [`UnrolledConvExt`]: the same loop with the kernel taps spelled out, for
//!   isotropic 3 and 5 kernels.
//! * [`FreqConvExt`]: FFT based, built on `rustfft`.
//!
//! Out-of-range reads follow a [`BoundaryMode`]. Every engine also has an
//! `_axis` form that applies a 1D kernel along one axis. [`upfirdn`] builds
//! upsample, filter, downsample resampling on top of the direct engine.
//!
//! The [`autotune`] module times the engines (and GPU strategies when a
//! [`GpuBackend`] is available) over a grid of sizes and writes CSV reports
//! and a [`StrategyTable`] that [`AutoConvolver`] consults.

mod dispatch;
mod error;
mod kernel;

pub mod autotune;
pub mod boundary;
mod direct;
pub mod frequency;
pub mod padding;
pub mod reshape;
pub mod strategy;
mod unrolled;
pub mod upfirdn;

pub use autotune::{AutoConvolver, Autotuner, StrategyTable, TuneConfig, TuneReport};
pub use boundary::BoundaryMode;
pub use direct::{DirectConvExt, DirectConvolver};
pub use error::ConvError;
pub use frequency::{FftElem, FreqConvExt, FrequencyConvolver, Processor};
pub use padding::{ExplicitPadding, PaddingExt};
pub use strategy::{
    ConvolutionStrategy, DirectCpu, FrequencyCpu, GpuBackend, StrategyKind, StrategySet,
    UnrolledCpu,
};
pub use unrolled::{UnrolledConvExt, UnrolledConvolver, UNROLLED_EXTENTS};
