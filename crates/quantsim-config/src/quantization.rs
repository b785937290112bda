//! Quantization and runtime configuration.

use quantsim_core::RoundingMode;
use quantsim_tensor::DEFAULT_PARALLEL_THRESHOLD;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Quantization parameters applied to every tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuantizationConfig {
    /// Target bit-width.
    #[serde(default = "default_bitwidth")]
    #[validate(range(min = 1, max = 32, message = "must be between 1 and 32"))]
    pub bitwidth: u8,

    /// Rounding policy for the forward step.
    #[serde(default)]
    pub rounding: RoundingMode,

    /// Mirror the range around zero.
    #[serde(default)]
    pub use_symmetric: bool,

    /// Use the full unsigned grid for non-negative symmetric ranges.
    #[serde(default)]
    pub unsigned_symmetric: bool,

    /// Seed for stochastic rounding.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            bitwidth: 8,
            rounding: RoundingMode::Nearest,
            use_symmetric: false,
            unsigned_symmetric: false,
            seed: None,
        }
    }
}

fn default_bitwidth() -> u8 {
    8
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RuntimeConfig {
    /// Tensor length at which chunks run on rayon.
    #[serde(default = "default_parallel_threshold")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub parallel_threshold: usize,

    /// Dedicated worker threads (0 = rayon global pool).
    #[serde(default)]
    #[validate(range(max = 1024, message = "must be at most 1024"))]
    pub num_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            num_threads: 0,
        }
    }
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

impl QuantizationConfig {
    /// Set the bit-width.
    pub fn with_bitwidth(mut self, bitwidth: u8) -> Self {
        self.bitwidth = bitwidth;
        self
    }

    /// Set the rounding mode.
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Enable symmetric encodings.
    pub fn symmetric(mut self) -> Self {
        self.use_symmetric = true;
        self
    }
}
