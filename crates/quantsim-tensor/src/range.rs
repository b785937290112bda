//! Range resolution.
//!
//! Turns a raw `[min, max]` pair into a range that contains zero and has a
//! strictly positive width. Resolution never fails on degenerate input; it only
//! rejects bounds that are not finite numbers.

use quantsim_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Width added to the upper bound when the gated range collapses.
pub const ENCODING_EPSILON: f64 = 1e-5;

/// Gate a raw range so it contains zero and has non-zero width.
///
/// - a positive `min` is gated to `0`
/// - a negative `max` is gated to `0`
/// - if the gated bounds are closer than [`ENCODING_EPSILON`], `max` is
///   pushed up by [`ENCODING_EPSILON`] and `min` is kept as is
pub fn gate_min_max(min: f64, max: f64) -> (f64, f64) {
    let min = min.min(0.0);
    let mut max = max.max(0.0);

    if max - min < ENCODING_EPSILON {
        max += ENCODING_EPSILON;
    }

    (min, max)
}

/// A dynamic range to be mapped onto the integer span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl QuantRange {
    /// Create a range, rejecting NaN and infinite bounds.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Gated, non-degenerate version of this range.
    pub fn resolve(&self) -> Self {
        let (min, max) = gate_min_max(self.min, self.max);
        Self { min, max }
    }

    /// Width of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Largest absolute bound.
    pub fn abs_max(&self) -> f64 {
        self.min.abs().max(self.max.abs())
    }
}

impl From<(f64, f64)> for QuantRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_spanning_zero_is_untouched() {
        assert_eq!(gate_min_max(-0.46, 0.72), (-0.46, 0.72));
    }

    #[test]
    fn test_positive_min_gated() {
        assert_eq!(gate_min_max(0.5, 1.0), (0.0, 1.0));
    }

    #[test]
    fn test_negative_max_gated() {
        assert_eq!(gate_min_max(-0.5, -0.1), (-0.5, 0.0));
    }

    #[test]
    fn test_equal_positive_bounds() {
        // Gating alone restores a usable width here
        assert_eq!(gate_min_max(0.5, 0.5), (0.0, 0.5));
    }

    #[test]
    fn test_zero_width_expanded() {
        let (min, max) = gate_min_max(0.0, 0.0);
        assert_eq!(min, 0.0);
        assert_eq!(max, ENCODING_EPSILON);
        assert!(max - min > 0.0);
    }

    #[test]
    fn test_tiny_width_expanded() {
        let (min, max) = gate_min_max(-1e-7, 1e-7);
        assert_eq!(min, -1e-7);
        assert!(max - min >= ENCODING_EPSILON);
    }

    #[test]
    fn test_inverted_bounds_still_resolve() {
        let (min, max) = gate_min_max(0.3, -0.3);
        assert_eq!(min, 0.0);
        assert!(max > min);
    }

    #[test]
    fn test_quant_range_validation() {
        assert!(QuantRange::new(-1.0, 1.0).is_ok());
        assert!(matches!(
            QuantRange::new(f64::NAN, 1.0),
            Err(Error::InvalidRange { .. })
        ));
        assert!(QuantRange::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_quant_range_resolve() {
        let range = QuantRange::new(0.25, 2.0).unwrap().resolve();
        assert_eq!(range, QuantRange { min: 0.0, max: 2.0 });
        assert_eq!(range.span(), 2.0);
        assert_eq!(QuantRange::from((-3.0, 2.0)).abs_max(), 3.0);
    }
}
