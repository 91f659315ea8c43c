//! Persisted strategy preferences and the convolver that consults them.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use super::TuneReport;
use crate::{
    kernel::clear_edge_frame, BoundaryMode, ConvError, DirectConvolver, FftElem,
    FrequencyConvolver, StrategyKind, StrategySet, UnrolledConvolver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub dims: usize,
    pub array_size: usize,
    pub kernel_size: usize,
    pub best: StrategyKind,
}

/// Best strategy per (dimensionality, array size, kernel size).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyTable {
    pub entries: Vec<TableEntry>,
}

impl StrategyTable {
    pub fn from_report(report: &TuneReport) -> Self {
        let mut table = Self::default();
        for cell in &report.cells {
            if let Some(best) = cell.best {
                table.insert(TableEntry {
                    dims: cell.dims,
                    array_size: cell.array_size,
                    kernel_size: cell.kernel_size,
                    best,
                });
            }
        }
        table
    }

    /// Adds `entry`, replacing any entry for the same cell.
    pub fn insert(&mut self, entry: TableEntry) {
        match self.entries.iter_mut().find(|e| {
            e.dims == entry.dims
                && e.array_size == entry.array_size
                && e.kernel_size == entry.kernel_size
        }) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Preferred strategy for an input of the given sizes.
    ///
    /// Each size is bucketed to the smallest measured size at least as large,
    /// or to the largest measured size when it exceeds all of them.
    pub fn lookup(&self, dims: usize, array_size: usize, kernel_size: usize) -> Option<StrategyKind> {
        let candidates: Vec<&TableEntry> = self.entries.iter().filter(|e| e.dims == dims).collect();

        let array_bucket = bucket(candidates.iter().map(|e| e.array_size), array_size)?;
        let candidates: Vec<&TableEntry> = candidates
            .into_iter()
            .filter(|e| e.array_size == array_bucket)
            .collect();

        let kernel_bucket = bucket(candidates.iter().map(|e| e.kernel_size), kernel_size)?;
        candidates
            .into_iter()
            .find(|e| e.kernel_size == kernel_bucket)
            .map(|e| e.best)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConvError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConvError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn bucket(sizes: impl Iterator<Item = usize> + Clone, size: usize) -> Option<usize> {
    sizes
        .clone()
        .filter(|&s| s >= size)
        .min()
        .or_else(|| sizes.max())
}

/// Convolution front end that runs the strategy a [`StrategyTable`] prefers.
///
/// Falls back to the direct CPU strategy when the table has no answer, or its
/// answer is unavailable in the strategy set or cannot handle the kernel.
#[derive(Debug)]
pub struct AutoConvolver {
    table: StrategyTable,
    strategies: StrategySet,
}

impl AutoConvolver {
    pub fn new(table: StrategyTable, strategies: StrategySet) -> Self {
        Self { table, strategies }
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    /// The strategy [`AutoConvolver::convolve`] would use.
    pub fn choose(&mut self, array_shape: &[usize], kernel_shape: &[usize]) -> StrategyKind {
        let array_size = array_shape.iter().copied().max().unwrap_or(0);
        let kernel_size = kernel_shape.iter().copied().max().unwrap_or(0);

        let Some(kind) = self.table.lookup(array_shape.len(), array_size, kernel_size) else {
            return StrategyKind::DirectCpu;
        };

        let usable = match self.strategies.get_mut(kind) {
            Some(strategy) => {
                strategy.supports(kernel_size)
                    && (kind != StrategyKind::UnrolledCpu || UnrolledConvolver::supports(kernel_shape))
            }
            None => false,
        };

        if usable {
            kind
        } else {
            tracing::debug!(preferred = %kind, "preferred strategy unusable, using direct");
            StrategyKind::DirectCpu
        }
    }

    pub fn convolve(
        &mut self,
        array: ArrayViewD<'_, f64>,
        kernel: ArrayViewD<'_, f64>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<f64>, ConvError> {
        let kind = self.choose(array.shape(), kernel.shape());
        tracing::debug!(strategy = %kind, shape = ?array.shape(), "auto convolution");

        match self.strategies.get_mut(kind) {
            Some(strategy) => strategy.convolve(array, kernel, mode),
            None => DirectConvolver.convolve_dyn(array, kernel, None, mode),
        }
    }

    /// Like [`AutoConvolver::convolve`] for any element type, on the CPU
    /// engines only. A GPU preference runs its CPU counterpart.
    pub fn convolve_cpu<T: FftElem>(
        &mut self,
        array: ArrayViewD<'_, T>,
        kernel: ArrayViewD<'_, T>,
        mode: BoundaryMode,
    ) -> Result<ArrayD<T>, ConvError> {
        let kind = self.choose(array.shape(), kernel.shape());

        match kind {
            StrategyKind::DirectCpu | StrategyKind::DirectGpu => {
                DirectConvolver.convolve_dyn(array, kernel, None, mode)
            }
            StrategyKind::UnrolledCpu => UnrolledConvolver.convolve_dyn(array, kernel, None, mode),
            StrategyKind::FrequencyCpu | StrategyKind::FrequencyGpu => {
                let kernel_shape = kernel.shape().to_vec();
                let mut output =
                    FrequencyConvolver::<T::Real>::new().convolve_dyn(array, kernel, None, mode)?;
                if mode.skips_edges() {
                    clear_edge_frame(&mut output, &kernel_shape);
                }
                Ok(output)
            }
        }
    }
}
