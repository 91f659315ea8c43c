//! Boundary extension policies.
//!
//! A convolution tap that falls outside the array is either dropped (`Zero`),
//! reflected back inside (`Mirror`) or wrapped around (`Periodic`).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ConvError;

/// How an array is conceptually extended past its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// Out-of-range taps contribute nothing. The direct engines skip edge
    /// cells entirely, leaving them at zero.
    #[default]
    Zero,
    /// `-i` below the low edge, `2 * extent - i - 1` past the high edge.
    Mirror,
    /// Wraps by one extent in either direction.
    Periodic,
}

impl BoundaryMode {
    pub const ALL: [BoundaryMode; 3] = [
        BoundaryMode::Zero,
        BoundaryMode::Mirror,
        BoundaryMode::Periodic,
    ];

    /// Maps `index` onto `0..extent`.
    ///
    /// In-range indices come back unchanged. Out of range, `Zero` yields
    /// `Ok(None)`, meaning the tap is skipped. `Mirror` and `Periodic` apply a
    /// single reflection or wrap; if the result is still out of range (kernel
    /// half-width larger than the array) a [`ConvError::BoundaryIndex`] is
    /// returned instead of reading out of bounds.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndarray_conv_tune::BoundaryMode;
    ///
    /// assert_eq!(BoundaryMode::Zero.resolve(-1, 5).unwrap(), None);
    /// assert_eq!(BoundaryMode::Mirror.resolve(-2, 5).unwrap(), Some(2));
    /// assert_eq!(BoundaryMode::Mirror.resolve(5, 5).unwrap(), Some(4));
    /// assert_eq!(BoundaryMode::Periodic.resolve(-1, 5).unwrap(), Some(4));
    /// ```
    #[inline]
    pub fn resolve(self, index: isize, extent: usize) -> Result<Option<usize>, ConvError> {
        let n = extent as isize;
        if (0..n).contains(&index) {
            return Ok(Some(index as usize));
        }

        let resolved = match self {
            BoundaryMode::Zero => return Ok(None),
            BoundaryMode::Mirror => {
                if index < 0 {
                    index.abs()
                } else {
                    2 * n - index - 1
                }
            }
            BoundaryMode::Periodic => {
                if index < 0 {
                    n + index
                } else {
                    index - n
                }
            }
        };

        if (0..n).contains(&resolved) {
            Ok(Some(resolved as usize))
        } else {
            Err(ConvError::BoundaryIndex {
                mode: self,
                index,
                extent,
            })
        }
    }

    /// `true` when edge cells are left untouched by the direct engines.
    #[inline]
    pub(crate) fn skips_edges(self) -> bool {
        matches!(self, BoundaryMode::Zero)
    }
}

impl fmt::Display for BoundaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryMode::Zero => "zero",
            BoundaryMode::Mirror => "mirror",
            BoundaryMode::Periodic => "periodic",
        };
        f.write_str(name)
    }
}

impl FromStr for BoundaryMode {
    type Err = ConvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "zeros" => Ok(BoundaryMode::Zero),
            "mirror" | "reflect" => Ok(BoundaryMode::Mirror),
            "periodic" | "circular" | "wrap" => Ok(BoundaryMode::Periodic),
            _ => Err(ConvError::UnknownBoundaryMode(s.to_string())),
        }
    }
}
