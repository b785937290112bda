//! Affine encodings: scale and offset derivation plus the per-element
//! forward and inverse transforms.
//!
//! An [`Encoding`] maps a real value `x` to the integer level
//!
//! ```text
//! q = clamp(round(x / delta) - offset, 0, 2^bitwidth - 1)
//! ```
//!
//! and back via `x' = (q + offset) * delta`. The encoding's `min` is always
//! `offset * delta`, so real zero sits exactly on level `-offset`.

use quantsim_core::{validate_bitwidth, Error, Result, MAX_BITWIDTH};
use serde::{Deserialize, Serialize};

use crate::range::QuantRange;

/// How a resolved range is laid onto the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingScheme {
    /// Range used as observed, nudged so zero is on the grid.
    #[default]
    Asymmetric,
    /// Range mirrored around zero using `max(|min|, |max|)`.
    Symmetric,
    /// Symmetric for signed ranges; full unsigned grid when `min == 0`.
    UnsignedSymmetric,
}

impl EncodingScheme {
    /// Pick a scheme from the caller's symmetry flags.
    pub fn from_flags(use_symmetric: bool, unsigned_symmetric: bool) -> Self {
        match (use_symmetric, unsigned_symmetric) {
            (false, _) => Self::Asymmetric,
            (true, false) => Self::Symmetric,
            (true, true) => Self::UnsignedSymmetric,
        }
    }
}

/// Number of steps between the lowest and highest level: `2^bitwidth - 1`.
///
/// Saturates at `u64::MAX` for bit-widths of 64 and above; callers reject
/// anything past [`MAX_BITWIDTH`] before using the result.
#[inline]
pub fn num_steps(bitwidth: u8) -> f64 {
    1u64.checked_shl(u32::from(bitwidth))
        .map_or(u64::MAX, |levels| levels - 1) as f64
}

/// Derive `(scale, offset)` from an already resolved range.
///
/// `scale = (max - min) / (2^bitwidth - 1)` and `offset = round(min / scale)`,
/// rounding half away from zero.
pub fn compute_scale_offset(min: f64, max: f64, bitwidth: u8) -> Result<(f64, f64)> {
    validate_bitwidth(bitwidth, MAX_BITWIDTH)?;

    let delta = (max - min) / num_steps(bitwidth);
    if !(delta.is_finite() && delta > 0.0) {
        return Err(Error::InvalidRange { min, max });
    }

    let offset = (min / delta).round();
    Ok((delta, offset))
}

/// Resolved quantization parameters for one tensor (or one channel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    /// Real value of level 0.
    pub min: f64,
    /// Real value of the top level.
    pub max: f64,
    /// Step between adjacent levels (the scale).
    pub delta: f64,
    /// Integer shift; level `-offset` represents real zero.
    pub offset: f64,
    /// Bit-width the encoding was computed for.
    pub bitwidth: u8,
}

impl Encoding {
    /// Compute the encoding for a raw range.
    ///
    /// The range is gated and epsilon-expanded first, so degenerate input
    /// never fails. Only a bad bit-width or non-finite bounds are errors.
    pub fn compute(range: QuantRange, bitwidth: u8, scheme: EncodingScheme) -> Result<Self> {
        validate_bitwidth(bitwidth, MAX_BITWIDTH)?;
        let range = QuantRange::new(range.min, range.max)?.resolve();

        match scheme {
            EncodingScheme::Asymmetric => Self::asymmetric(range, bitwidth),
            EncodingScheme::UnsignedSymmetric if range.min >= 0.0 => {
                Self::asymmetric(range, bitwidth)
            }
            EncodingScheme::Symmetric | EncodingScheme::UnsignedSymmetric => {
                Self::symmetric(range, bitwidth)
            }
        }
    }

    fn asymmetric(range: QuantRange, bitwidth: u8) -> Result<Self> {
        let (delta, offset) = compute_scale_offset(range.min, range.max, bitwidth)?;
        let min = offset * delta;
        let max = min + num_steps(bitwidth) * delta;

        Ok(Self {
            min,
            max,
            delta,
            offset,
            bitwidth,
        })
    }

    fn symmetric(range: QuantRange, bitwidth: u8) -> Result<Self> {
        if bitwidth < 2 {
            return Err(Error::unsupported(
                "symmetric encoding needs at least 2 bits",
            ));
        }

        let steps = num_steps(bitwidth);
        let positive_steps = (steps / 2.0).floor();
        let delta = range.abs_max() / positive_steps;
        let offset = -(steps / 2.0).ceil();

        Ok(Self {
            min: offset * delta,
            max: positive_steps * delta,
            delta,
            offset,
            bitwidth,
        })
    }

    /// Highest integer level, `2^bitwidth - 1`.
    #[inline]
    pub fn levels(&self) -> f64 {
        num_steps(self.bitwidth)
    }

    /// Integer level that represents real zero.
    pub fn zero_point(&self) -> i64 {
        -self.offset as i64
    }

    /// Forward step: real value to a saturated integer level.
    #[inline]
    pub fn quantize_with<R>(&self, x: f64, mut round: R) -> f64
    where
        R: FnMut(f64) -> f64,
    {
        (round(x / self.delta) - self.offset).clamp(0.0, self.levels())
    }

    /// Inverse step: integer level back to a real value.
    #[inline]
    pub fn dequantize(&self, q: f64) -> f64 {
        (q + self.offset) * self.delta
    }

    /// Forward then inverse step.
    #[inline]
    pub fn quantize_dequantize_with<R>(&self, x: f64, round: R) -> f64
    where
        R: FnMut(f64) -> f64,
    {
        self.dequantize(self.quantize_with(x, round))
    }
}
