//! CSV result report: one row per grid cell, one column per strategy.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use super::{CellResult, TuneReport};
use crate::{ConvError, StrategyKind};

pub const CSV_HEADER: &str =
    "array_size,kernel_size,direct_cpu,unrolled_cpu,frequency_cpu,direct_gpu,frequency_gpu";

/// Milliseconds with three decimals, `-1` for an excluded strategy.
pub fn format_timing(timing: Option<Duration>) -> String {
    match timing {
        Some(elapsed) => format!("{:.3}", elapsed.as_secs_f64() * 1e3),
        None => "-1".to_string(),
    }
}

pub fn write_csv<'a, W: Write>(
    mut writer: W,
    cells: impl IntoIterator<Item = &'a CellResult>,
) -> Result<(), ConvError> {
    writeln!(writer, "{CSV_HEADER}")?;

    for cell in cells {
        write!(writer, "{},{}", cell.array_size, cell.kernel_size)?;
        for kind in StrategyKind::ALL {
            write!(writer, ",{}", format_timing(cell.timing(kind)))?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes `<prefix>_<N>d.csv` for every dimensionality present in `report`
/// and returns the paths written.
pub fn write_reports(report: &TuneReport, prefix: &str) -> Result<Vec<PathBuf>, ConvError> {
    let mut dims: Vec<usize> = report.cells.iter().map(|c| c.dims).collect();
    dims.sort_unstable();
    dims.dedup();

    let mut written = Vec::with_capacity(dims.len());
    for d in dims {
        let path = PathBuf::from(format!("{prefix}_{d}d.csv"));
        write_csv(BufWriter::new(File::create(&path)?), report.cells_for(d))?;
        tracing::info!(path = %path.display(), "wrote report");
        written.push(path);
    }

    Ok(written)
}
