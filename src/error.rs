//! Error type shared by every convolution engine and the autotuner.

use crate::BoundaryMode;

/// Errors returned by the convolution engines, the strategy layer and the
/// autotuner.
///
/// Configuration errors (`RankMismatch`, `AxisOutOfRange`, `UnsupportedRank`,
/// `UnrolledExtent`, `UnknownBoundaryMode`, `InvalidFactor`, `InvalidConfig`) are
/// caller bugs and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConvError {
    #[error("kernel rank {kernel} cannot be applied to a rank {array} array (expected rank {array}, or rank 1 along an axis)")]
    RankMismatch { array: usize, kernel: usize },

    #[error("axis {axis} is out of range for a {ndim}-dimensional array")]
    AxisOutOfRange { axis: usize, ndim: usize },

    #[error("unsupported array rank {0}, only 1, 2 and 3 dimensions are handled")]
    UnsupportedRank(usize),

    #[error("unrolled convolution needs an isotropic kernel of extent 3 or 5, got shape {0:?}")]
    UnrolledExtent(Vec<usize>),

    #[error("unknown boundary mode `{0}` (expected zero, mirror or periodic)")]
    UnknownBoundaryMode(String),

    #[error("{mode} boundary resolved index {index} outside 0..{extent}; the kernel is too wide for this array")]
    BoundaryIndex {
        mode: BoundaryMode,
        index: isize,
        extent: usize,
    },

    #[error("empty input, shape {0:?}")]
    EmptyInput(Vec<usize>),

    #[error("resampling factor must be at least 1, got {0}")]
    InvalidFactor(usize),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("invalid tuner configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid tuner state: {0}")]
    InvalidState(String),

    #[error("no GPU device available: {0}")]
    DeviceUnavailable(String),

    #[error("strategy {strategy} failed: {reason}")]
    StrategyFailed {
        strategy: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
