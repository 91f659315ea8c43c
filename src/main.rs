//! # conv-tune
//!
//! Times every convolution strategy over a grid of array and kernel sizes,
//! writes one CSV report per dimensionality and saves the best strategy per
//! cell as a JSON table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray_conv_tune::{
    autotune::{self, TunerEvent},
    Autotuner, BoundaryMode, StrategySet, TuneConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Autotuner for direct, unrolled and FFT convolution
#[derive(Parser, Debug)]
#[command(name = "conv-tune")]
#[command(version)]
struct Cli {
    /// Dimensionalities to run (1, 2, 3)
    #[arg(short, long, value_delimiter = ',')]
    dims: Option<Vec<usize>>,

    /// Array extents per axis
    #[arg(long, value_delimiter = ',')]
    array_sizes: Option<Vec<usize>>,

    /// Kernel extents per axis
    #[arg(long, value_delimiter = ',')]
    kernel_sizes: Option<Vec<usize>>,

    /// Timed calls per strategy and cell
    #[arg(short, long)]
    repetitions: Option<usize>,

    /// Boundary mode (zero, mirror, periodic)
    #[arg(short, long)]
    boundary: Option<BoundaryMode>,

    /// Seed for the random inputs
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report prefix, reports are written to `<prefix>_<N>d.csv`
    #[arg(short, long, default_value = "autotune")]
    output: String,

    /// Where to save the strategy table
    #[arg(short, long, default_value = "strategy_table.json")]
    table: PathBuf,
}

impl Cli {
    fn tune_config(&self) -> Result<TuneConfig> {
        let mut config = match &self.config {
            Some(path) => TuneConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => TuneConfig::default(),
        };

        if let Some(dims) = &self.dims {
            config.dims = dims.clone();
        }
        if let Some(sizes) = &self.array_sizes {
            config.array_sizes = sizes.clone();
        }
        if let Some(sizes) = &self.kernel_sizes {
            config.kernel_sizes = sizes.clone();
        }
        if let Some(repetitions) = self.repetitions {
            config.repetitions = repetitions;
        }
        if let Some(boundary) = self.boundary {
            config.boundary = boundary;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate().context("invalid tuning configuration")?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.tune_config()?;

    tracing::info!(
        dims = ?config.dims,
        array_sizes = ?config.array_sizes,
        kernel_sizes = ?config.kernel_sizes,
        repetitions = config.repetitions,
        boundary = %config.boundary,
        "starting autotune"
    );

    let strategies = StrategySet::detect(None);
    let tuner = Autotuner::new(config, strategies).context("failed to create autotuner")?;
    let mut handle = autotune::spawn(tuner).context("failed to spawn autotuner thread")?;
    handle.start().context("failed to start autotuner")?;

    for event in handle.events().iter() {
        match event {
            TunerEvent::Progress(percent) => tracing::info!("{percent:.1}% done"),
            TunerEvent::Log(message) => tracing::debug!("{message}"),
            TunerEvent::Cell(cell) => tracing::debug!(
                dims = cell.dims,
                array_size = cell.array_size,
                kernel_size = cell.kernel_size,
                best = ?cell.best,
                "cell measured"
            ),
        }
    }

    let report = handle.join().context("autotune run failed")?;
    if report.stopped_early {
        tracing::warn!("run stopped before the grid was complete");
    }

    let written = autotune::write_reports(&report, &cli.output)
        .with_context(|| format!("failed to write reports with prefix {}", cli.output))?;
    for path in &written {
        println!("{}", path.display());
    }

    report
        .table()
        .save(&cli.table)
        .with_context(|| format!("failed to save strategy table {}", cli.table.display()))?;
    println!("{}", cli.table.display());

    Ok(())
}
