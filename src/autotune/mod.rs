//! Timing-based strategy selection.
//!
//! The [`Autotuner`] walks a grid of (array size, kernel size) cells for each
//! requested dimensionality, times every available strategy on random inputs
//! and records the fastest one per cell. Strategies run one at a time, to
//! completion, so timings never overlap.

use std::{
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use ndarray_rand::{
    rand::{rngs::StdRng, SeedableRng},
    rand_distr::Uniform,
    RandomExt,
};
use serde::{Deserialize, Serialize};

use crate::{BoundaryMode, ConvError, ConvolutionStrategy, StrategyKind, StrategySet};

mod driver;
mod report;
mod table;

pub use driver::{spawn, TunerEvent, TunerHandle};
pub use report::{format_timing, write_csv, write_reports, CSV_HEADER};
pub use table::{AutoConvolver, StrategyTable, TableEntry};


/// Grid and run parameters. Every field has a default, so a JSON file only
/// needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuneConfig {
    pub array_sizes: Vec<usize>,
    pub kernel_sizes: Vec<usize>,
    /// Timed calls per strategy and cell.
    pub repetitions: usize,
    pub dims: Vec<usize>,
    pub boundary: BoundaryMode,
    /// Seed for the random inputs; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Leave the largest array size out of the 3D grid.
    pub skip_largest_3d: bool,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            array_sizes: vec![64, 128, 256, 512, 1024],
            kernel_sizes: vec![3, 5, 7, 9, 11, 13, 15],
            repetitions: 10,
            dims: vec![1, 2, 3],
            boundary: BoundaryMode::Zero,
            seed: None,
            skip_largest_3d: true,
        }
    }
}

impl TuneConfig {
    /// Loads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConvError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConvError> {
        let invalid = |msg: &str| Err(ConvError::InvalidConfig(msg.to_string()));

        if self.array_sizes.is_empty() {
            return invalid("array_sizes is empty");
        }
        if self.kernel_sizes.is_empty() {
            return invalid("kernel_sizes is empty");
        }
        if self.array_sizes.contains(&0) || self.kernel_sizes.contains(&0) {
            return invalid("sizes must be non-zero");
        }
        if self.repetitions == 0 {
            return invalid("repetitions must be non-zero");
        }
        if self.dims.is_empty() {
            return invalid("dims is empty");
        }
        if let Some(d) = self.dims.iter().find(|d| !(1..=3).contains(*d)) {
            return Err(ConvError::InvalidConfig(format!(
                "dimensionality {d} is not one of 1, 2, 3"
            )));
        }

        Ok(())
    }

    /// The (array size, kernel size) cells run for `dims`, array size major.
    pub fn grid(&self, dims: usize) -> Vec<(usize, usize)> {
        let mut array_sizes = self.array_sizes.clone();
        if dims == 3 && self.skip_largest_3d && array_sizes.len() > 1 {
            let largest = array_sizes.iter().copied().max();
            if let Some(pos) = array_sizes.iter().position(|&s| Some(s) == largest) {
                array_sizes.remove(pos);
            }
        }

        array_sizes
            .into_iter()
            .flat_map(|a| self.kernel_sizes.iter().map(move |&k| (a, k)))
            .collect()
    }

    /// Cells across every requested dimensionality.
    pub fn total_cells(&self) -> usize {
        self.dims.iter().map(|&d| self.grid(d).len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunerState {
    #[default]
    Idle,
    Running,
    Done,
}

/// Total elapsed time per strategy, indexed by [`StrategyKind::index`].
/// `None` marks a strategy that was absent, unsupported or failed.
pub type Timings = [Option<Duration>; StrategyKind::COUNT];

/// Measurements for one grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellResult {
    pub dims: usize,
    pub array_size: usize,
    pub kernel_size: usize,
    pub timings: Timings,
    pub best: Option<StrategyKind>,
}

impl CellResult {
    pub fn timing(&self, kind: StrategyKind) -> Option<Duration> {
        self.timings[kind.index()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuneReport {
    pub cells: Vec<CellResult>,
    pub stopped_early: bool,
    pub gpu_available: bool,
}

impl TuneReport {
    pub fn cells_for(&self, dims: usize) -> impl Iterator<Item = &CellResult> + '_ {
        self.cells.iter().filter(move |c| c.dims == dims)
    }

    /// Best strategy per measured cell.
    pub fn table(&self) -> StrategyTable {
        StrategyTable::from_report(self)
    }
}

/// Picks the strategy with the smallest time.
///
/// Strategies are scanned in enumeration order with a strict comparison, so
/// the earliest one wins an exact tie. Excluded strategies never win; the
/// result is `None` only if every strategy was excluded.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ndarray_conv_tune::{autotune::select_best, StrategyKind};
///
/// let ms = |v| Some(Duration::from_millis(v));
/// let timings = [ms(50), ms(10), ms(30), None, None];
/// assert_eq!(select_best(&timings), Some(StrategyKind::UnrolledCpu));
/// ```
pub fn select_best(timings: &Timings) -> Option<StrategyKind> {
    let mut best: Option<(StrategyKind, Duration)> = None;

    for kind in StrategyKind::ALL {
        if let Some(elapsed) = timings[kind.index()] {
            if best.map_or(true, |(_, fastest)| elapsed < fastest) {
                best = Some((kind, elapsed));
            }
        }
    }

    best.map(|(kind, _)| kind)
}

/// Receives progress from a running tuner.
pub trait ProgressSink {
    /// Percentage of grid cells completed, `0.0..=100.0`.
    fn on_progress(&mut self, percent: f32);

    fn on_log(&mut self, message: &str);

    fn on_cell(&mut self, _cell: &CellResult) {}
}

/// Forwards progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&mut self, percent: f32) {
        tracing::info!("progress {percent:.1}%");
    }

    fn on_log(&mut self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Runs the tuning grid. A tuner runs once: `Idle -> Running -> Done`.
#[derive(Debug)]
pub struct Autotuner {
    config: TuneConfig,
    strategies: StrategySet,
    state: TunerState,
    stop: Arc<AtomicBool>,
}

impl Autotuner {
    pub fn new(config: TuneConfig, strategies: StrategySet) -> Result<Self, ConvError> {
        config.validate()?;

        Ok(Self {
            config,
            strategies,
            state: TunerState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &TuneConfig {
        &self.config
    }

    pub fn state(&self) -> TunerState {
        self.state
    }

    pub fn gpu_available(&self) -> bool {
        self.strategies.gpu_available()
    }

    /// Setting the flag stops the run before the next grid cell.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn run(&mut self, sink: &mut dyn ProgressSink) -> Result<TuneReport, ConvError> {
        if self.state != TunerState::Idle {
            return Err(ConvError::InvalidState(format!(
                "tuner can only run once, current state is {:?}",
                self.state
            )));
        }
        self.state = TunerState::Running;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let total = self.config.total_cells();
        let mut report = TuneReport {
            gpu_available: self.strategies.gpu_available(),
            ..Default::default()
        };

        if !report.gpu_available {
            sink.on_log("no GPU capability, GPU strategies skipped");
        }
        tracing::info!(total, boundary = %self.config.boundary, "autotuning started");

        let dims = self.config.dims.clone();
        'run: for dims in dims {
            for (array_size, kernel_size) in self.config.grid(dims) {
                if self.stop.load(Ordering::Relaxed) {
                    report.stopped_early = true;
                    sink.on_log("stop requested, ending run");
                    break 'run;
                }

                let cell = self.run_cell(dims, array_size, kernel_size, &mut rng, sink);
                sink.on_cell(&cell);
                report.cells.push(cell);

                sink.on_progress(100. * report.cells.len() as f32 / total as f32);
            }
        }

        self.state = TunerState::Done;
        tracing::info!(
            cells = report.cells.len(),
            stopped_early = report.stopped_early,
            "autotuning finished"
        );

        Ok(report)
    }

    fn run_cell(
        &mut self,
        dims: usize,
        array_size: usize,
        kernel_size: usize,
        rng: &mut StdRng,
        sink: &mut dyn ProgressSink,
    ) -> CellResult {
        sink.on_log(&format!(
            "{dims}D array size {array_size} kernel size {kernel_size}"
        ));

        let unit = Uniform::new(0f64, 1.);
        let array = ArrayD::random_using(IxDyn(&vec![array_size; dims]), unit, rng);
        let kernel = ArrayD::random_using(IxDyn(&vec![kernel_size; dims]), unit, rng);

        let mode = self.config.boundary;
        let repetitions = self.config.repetitions;
        let mut timings: Timings = [None; StrategyKind::COUNT];

        for strategy in self.strategies.iter_mut() {
            let kind = strategy.kind();
            if !strategy.supports(kernel_size) {
                continue;
            }

            match time_strategy(strategy, array.view(), kernel.view(), mode, repetitions) {
                Ok(elapsed) => {
                    tracing::debug!(%kind, dims, array_size, kernel_size, ?elapsed, "timed");
                    sink.on_log(&format!(
                        "{dims}D {}: {:.3} sec",
                        kind.label(),
                        elapsed.as_secs_f64()
                    ));
                    timings[kind.index()] = Some(elapsed);
                }
                Err(err) => {
                    tracing::warn!(%kind, dims, array_size, kernel_size, %err, "strategy excluded");
                    sink.on_log(&format!("{dims}D {} excluded: {err}", kind.label()));
                }
            }
        }

        let best = select_best(&timings);
        match best {
            Some(kind) => tracing::info!(dims, array_size, kernel_size, best = %kind, "cell done"),
            None => tracing::warn!(dims, array_size, kernel_size, "every strategy was excluded"),
        }

        CellResult {
            dims,
            array_size,
            kernel_size,
            timings,
            best,
        }
    }
}

/// Total wall time of `repetitions` calls. A returned error or a panic in any
/// call excludes the strategy for this cell.
fn time_strategy(
    strategy: &mut dyn ConvolutionStrategy,
    array: ArrayViewD<'_, f64>,
    kernel: ArrayViewD<'_, f64>,
    mode: BoundaryMode,
    repetitions: usize,
) -> Result<Duration, ConvError> {
    let kind = strategy.kind();
    let start = Instant::now();

    for _ in 0..repetitions {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            strategy.convolve(array.view(), kernel.view(), mode)
        }));

        match outcome {
            Ok(result) => {
                std::hint::black_box(result?);
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panicked".to_string());
                return Err(ConvError::StrategyFailed {
                    strategy: kind.column(),
                    reason,
                });
            }
        }
    }

    Ok(start.elapsed())
}
