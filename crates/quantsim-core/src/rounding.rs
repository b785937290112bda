//! Rounding policies for snapping a real-valued level to an integer level.
//!
//! Deterministic modes resolve to a plain function pointer once per call, so the
//! per-element loop never branches on the mode. Stochastic rounding needs a
//! random source and is driven by the tensor kernels instead.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Pre-resolved deterministic rounding function.
pub type RoundFn = fn(f64) -> f64;

/// How a real quantized value is snapped to an integer level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round to nearest, ties away from zero.
    #[default]
    Nearest,
    /// Round to nearest, ties to even.
    NearestEven,
    /// `floor(x + u)` with `u` uniform in `[0, 1)`.
    Stochastic,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round toward zero.
    Truncate,
}

impl RoundingMode {
    /// All supported modes.
    pub const ALL: [RoundingMode; 6] = [
        RoundingMode::Nearest,
        RoundingMode::NearestEven,
        RoundingMode::Stochastic,
        RoundingMode::Floor,
        RoundingMode::Ceil,
        RoundingMode::Truncate,
    ];

    /// Whether identical inputs always produce identical levels.
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, RoundingMode::Stochastic)
    }

    /// Resolve the rounding function for a deterministic mode.
    ///
    /// Returns `None` for [`RoundingMode::Stochastic`].
    pub fn resolve(&self) -> Option<RoundFn> {
        match self {
            RoundingMode::Nearest => Some(f64::round),
            RoundingMode::NearestEven => Some(f64::round_ties_even),
            RoundingMode::Floor => Some(f64::floor),
            RoundingMode::Ceil => Some(f64::ceil),
            RoundingMode::Truncate => Some(f64::trunc),
            RoundingMode::Stochastic => None,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::Nearest => "nearest",
            RoundingMode::NearestEven => "nearest_even",
            RoundingMode::Stochastic => "stochastic",
            RoundingMode::Floor => "floor",
            RoundingMode::Ceil => "ceil",
            RoundingMode::Truncate => "truncate",
        }
    }
}

/// Stochastic rounding of `x` given a uniform sample `u` in `[0, 1)`.
///
/// Rounds up with probability equal to the fractional part of `x`.
#[inline]
pub fn round_stochastic(x: f64, u: f64) -> f64 {
    (x + u).floor()
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "nearest" | "round_nearest" => Ok(Self::Nearest),
            "nearest_even" | "round_nearest_even" | "banker" => Ok(Self::NearestEven),
            "stochastic" | "round_stochastic" => Ok(Self::Stochastic),
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            "truncate" | "trunc" => Ok(Self::Truncate),
            other => Err(Error::config(format!("unknown rounding mode '{other}'"))),
        }
    }
}
