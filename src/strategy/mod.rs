//! Interchangeable convolution strategies timed by the autotuner.
//!
//! Every strategy shares the same contract: a dynamic-rank `f64` array and a
//! full-rank kernel in, a same-shape array out. GPU strategies exist only when
//! a [`GpuBackend`] was supplied and its one-time probe succeeded.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::{
    kernel::clear_edge_frame,
    BoundaryMode, ConvError, DirectConvolver, FrequencyConvolver, UnrolledConvolver,
    UNROLLED_EXTENTS,
};

/// Strategy identifiers, in report column order. Ties between equal timings
/// go to the earlier variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DirectCpu,
    UnrolledCpu,
    FrequencyCpu,
    DirectGpu,
    FrequencyGpu,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::DirectCpu,
        StrategyKind::UnrolledCpu,
        StrategyKind::FrequencyCpu,
        StrategyKind::DirectGpu,
        StrategyKind::FrequencyGpu,
    ];

    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used in reports.
    pub fn column(self) -> &'static str {
        match self {
            StrategyKind::DirectCpu => "direct_cpu",
            StrategyKind::UnrolledCpu => "unrolled_cpu",
            StrategyKind::FrequencyCpu => "frequency_cpu",
            StrategyKind::DirectGpu => "direct_gpu",
            StrategyKind::FrequencyGpu => "frequency_gpu",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::DirectCpu => "direct on CPU",
            StrategyKind::UnrolledCpu => "unrolled direct on CPU",
            StrategyKind::FrequencyCpu => "frequency domain on CPU",
            StrategyKind::DirectGpu => "direct on GPU",
            StrategyKind::FrequencyGpu => "frequency domain on GPU",
        }
    }

    pub fn is_gpu(self) -> bool {
        matches!(self, StrategyKind::DirectGpu | StrategyKind::FrequencyGpu)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One way of computing a same-size convolution.
pub trait ConvolutionStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Whether an isotropic kernel of this extent can be handled at all.
    fn supports(&self, _kernel_extent: usize) -> bool {
        true
    }

    fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCpu;

impl ConvolutionStrategy for DirectCpu {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectCpu
    }

    fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError> {
        DirectConvolver.convolve_dyn(array, kernel, None, mode)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnrolledCpu;

impl ConvolutionStrategy for UnrolledCpu {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UnrolledCpu
    }

    fn supports(&self, kernel_extent: usize) -> bool {
        UNROLLED_EXTENTS.contains(&kernel_extent)
    }

    fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError> {
        UnrolledConvolver.convolve_dyn(array, kernel, None, mode)
    }
}

/// Frequency-domain strategy. Plans are made per call, so planning is part
/// of the measured time.
///
/// Under [`BoundaryMode::Zero`] the edge cells are cleared afterwards, so the
/// result matches the direct strategies cell for cell.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrequencyCpu;

impl ConvolutionStrategy for FrequencyCpu {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FrequencyCpu
    }

    fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError> {
        let kernel_shape = kernel.shape().to_vec();
        let mut output = FrequencyConvolver::<f64>::new().convolve_dyn(array, kernel, None, mode)?;
        if mode.skips_edges() {
            clear_edge_frame(&mut output, &kernel_shape);
        }
        Ok(output)
    }
}

/// A GPU device able to run direct and frequency-domain convolutions.
///
/// Device management lives outside this crate; implementors wrap it.
pub trait GpuBackend: Send {
    fn name(&self) -> &str;

    /// Creates the device context. Called exactly once, when a
    /// [`StrategySet`] is built; an error disables every GPU strategy for the
    /// lifetime of that set.
    fn probe(&mut self) -> Result<(), ConvError>;

    fn convolve_direct(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError>;

    fn convolve_frequency(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError>;
}

type SharedBackend = Arc<Mutex<Box<dyn GpuBackend>>>;

/// Direct or frequency-domain GPU strategy over a shared backend.
struct GpuStrategy {
    kind: StrategyKind,
    backend: SharedBackend,
}

impl ConvolutionStrategy for GpuStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError> {
        let mut backend = self.backend.lock().map_err(|_| ConvError::StrategyFailed {
            strategy: self.kind.column(),
            reason: "GPU backend lock poisoned".to_string(),
        })?;

        match self.kind {
            StrategyKind::FrequencyGpu => backend.convolve_frequency(array, kernel, mode),
            _ => backend.convolve_direct(array, kernel, mode),
        }
    }
}

/// The strategies available for one tuning run, ordered by [`StrategyKind`].
pub struct StrategySet {
    strategies: Vec<Box<dyn ConvolutionStrategy>>,
    gpu_available: bool,
}

impl fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySet")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .field("gpu_available", &self.gpu_available)
            .finish()
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::cpu()
    }
}

impl StrategySet {
    /// The CPU strategies only.
    pub fn cpu() -> Self {
        Self {
            strategies: vec![Box::new(DirectCpu), Box::new(UnrolledCpu), Box::new(FrequencyCpu)],
            gpu_available: false,
        }
    }

    /// CPU strategies plus, if `gpu` probes successfully, the GPU ones.
    pub fn detect(gpu: Option<Box<dyn GpuBackend>>) -> Self {
        let mut set = Self::cpu();

        let Some(mut backend) = gpu else {
            tracing::info!("no GPU backend configured, GPU strategies disabled");
            return set;
        };

        match backend.probe() {
            Ok(()) => {
                tracing::info!(device = backend.name(), "GPU capability detected");
                let backend: SharedBackend = Arc::new(Mutex::new(backend));
                for kind in [StrategyKind::DirectGpu, StrategyKind::FrequencyGpu] {
                    set.strategies.push(Box::new(GpuStrategy {
                        kind,
                        backend: backend.clone(),
                    }));
                }
                set.gpu_available = true;
            }
            Err(err) => {
                tracing::warn!(device = backend.name(), %err, "GPU probe failed, GPU strategies disabled");
            }
        }

        set
    }

    /// Builds a set from explicit strategies, e.g. instrumented ones.
    ///
    /// Strategies are sorted by kind; a later duplicate of a kind is dropped.
    pub fn from_strategies(mut strategies: Vec<Box<dyn ConvolutionStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.kind());
        strategies.dedup_by_key(|s| s.kind());
        let gpu_available = strategies.iter().any(|s| s.kind().is_gpu());

        Self {
            strategies,
            gpu_available,
        }
    }

    pub fn gpu_available(&self) -> bool {
        self.gpu_available
    }

    pub fn kinds(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.strategies.iter().map(|s| s.kind())
    }

    pub fn get_mut(&mut self, kind: StrategyKind) -> Option<&mut (dyn ConvolutionStrategy + 'static)> {
        self.strategies
            .iter_mut()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_mut())
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut (dyn ConvolutionStrategy + 'static)> + '_ {
        self.strategies.iter_mut().map(|s| s.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGpu {
        probes: Arc<AtomicUsize>,
        healthy: bool,
    }

    impl GpuBackend for FakeGpu {
        fn name(&self) -> &str {
            "fake"
        }

        fn probe(&mut self) -> Result<(), ConvError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(ConvError::DeviceUnavailable("no device".to_string()))
            }
        }

        fn convolve_direct(
            &mut self,
            array: ArrayViewD<'_, f64>,
            kernel: ArrayViewD<'_, f64>,
            mode: BoundaryMode,
        ) -> Result<ArrayD<f64>, ConvError> {
            DirectConvolver.convolve_dyn(array, kernel, None, mode)
        }

        fn convolve_frequency(
            &mut self,
            array: ArrayViewD<'_, f64>,
            _kernel: ArrayViewD<'_, f64>,
            _mode: BoundaryMode,
        ) -> Result<ArrayD<f64>, ConvError> {
            Ok(ArrayD::zeros(array.raw_dim()))
        }
    }

    #[test]
    fn kind_order_and_names() {
        for (i, kind) in StrategyKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert!(StrategyKind::DirectCpu < StrategyKind::FrequencyGpu);
        assert_eq!(StrategyKind::UnrolledCpu.to_string(), "unrolled_cpu");
        assert_eq!(
            serde_json::to_string(&StrategyKind::FrequencyCpu).unwrap(),
            "\"frequency_cpu\""
        );
        assert!(StrategyKind::DirectGpu.is_gpu());
        assert!(!StrategyKind::FrequencyCpu.is_gpu());
    }

    #[test]
    fn cpu_set() {
        let set = StrategySet::detect(None);
        assert!(!set.gpu_available());
        assert_eq!(
            set.kinds().collect::<Vec<_>>(),
            vec![
                StrategyKind::DirectCpu,
                StrategyKind::UnrolledCpu,
                StrategyKind::FrequencyCpu
            ]
        );
    }

    #[test]
    fn gpu_probe_once() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut set = StrategySet::detect(Some(Box::new(FakeGpu {
            probes: probes.clone(),
            healthy: true,
        })));
        assert!(set.gpu_available());
        assert_eq!(set.kinds().count(), 5);

        let a = Array2::<f64>::ones((6, 6)).into_dyn();
        let k = Array2::<f64>::ones((3, 3)).into_dyn();
        for kind in [StrategyKind::DirectGpu, StrategyKind::FrequencyGpu] {
            let strategy = set.get_mut(kind).unwrap();
            strategy
                .convolve(a.view(), k.view(), BoundaryMode::Zero)
                .unwrap();
        }
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn gpu_probe_failure_disables_gpu() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut set = StrategySet::detect(Some(Box::new(FakeGpu {
            probes: probes.clone(),
            healthy: false,
        })));
        assert!(!set.gpu_available());
        assert!(set.get_mut(StrategyKind::DirectGpu).is_none());
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cpu_strategies_agree() {
        let a = Array3::from_shape_fn((6, 7, 8), |(i, j, k)| ((i * 7 + j * 3 + k) % 5) as f64).into_dyn();
        let k = Array3::from_elem((3, 3, 3), 0.5).into_dyn();

        let mut set = StrategySet::cpu();
        let reference = DirectCpu
            .convolve(a.view(), k.view(), BoundaryMode::Periodic)
            .unwrap();
        for strategy in set.iter_mut() {
            assert!(strategy.supports(3));
            let res = strategy
                .convolve(a.view(), k.view(), BoundaryMode::Periodic)
                .unwrap();
            reference
                .iter()
                .zip(res.iter())
                .for_each(|(x, y)| assert!((x - y).abs() < 1e-9));
        }

        assert!(!UnrolledCpu.supports(7));
        assert!(FrequencyCpu.supports(7));
    }

    #[test]
    fn cpu_strategies_agree_on_zero_edges() {
        let a = Array2::from_shape_fn((9, 7), |(i, j)| (i * 7 + j) as f64 + 0.5).into_dyn();
        let k = Array2::from_shape_fn((5, 5), |(i, j)| 1. + (i + 2 * j) as f64).into_dyn();

        let reference = DirectCpu
            .convolve(a.view(), k.view(), BoundaryMode::Zero)
            .unwrap();
        assert_eq!(reference[[0, 3]], 0.);
        assert_eq!(reference[[4, 6]], 0.);

        let mut set = StrategySet::cpu();
        for strategy in set.iter_mut() {
            let res = strategy
                .convolve(a.view(), k.view(), BoundaryMode::Zero)
                .unwrap();
            reference
                .iter()
                .zip(res.iter())
                .for_each(|(x, y)| assert!((x - y).abs() < 1e-9));
        }

        // kernel wider than the array leaves no interior
        let small = ArrayD::from_elem(vec![2, 2], 1.);
        let res = FrequencyCpu
            .convolve(small.view(), k.view(), BoundaryMode::Zero)
            .unwrap();
        assert!(res.iter().all(|&v| v == 0.));
    }

    #[test]
    fn from_strategies_sorts() {
        let set = StrategySet::from_strategies(vec![
            Box::new(FrequencyCpu),
            Box::new(DirectCpu),
            Box::new(DirectCpu),
        ]);
        assert_eq!(
            set.kinds().collect::<Vec<_>>(),
            vec![StrategyKind::DirectCpu, StrategyKind::FrequencyCpu]
        );
        assert!(!set.gpu_available());
    }
}
