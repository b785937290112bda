//! Error types for the quantization simulator.
//!
//! Degenerate ranges and out-of-range values are handled numerically and never
//! reach this module. What remains are caller-input violations, reported before
//! any element of the output buffer is written.

use thiserror::Error;

/// Specialized Result type for quantsim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Largest bit-width the `f64` accumulator represents exactly.
pub const MAX_BITWIDTH: u8 = 32;

/// The main error type for quantsim operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bit-width is zero or wider than the target can hold.
    #[error("Invalid bitwidth {bitwidth}: must be between 1 and {max}")]
    InvalidBitwidth {
        /// Requested bit-width
        bitwidth: u8,
        /// Largest accepted bit-width for this call
        max: u8,
    },

    /// Output buffer cannot hold every input element.
    #[error("Output buffer too small: need {expected} elements, got {actual}")]
    BufferTooSmall {
        /// Number of input elements
        expected: usize,
        /// Length of the output buffer
        actual: usize,
    },

    /// Range bound is NaN or infinite, or the span `max - min` overflows to
    /// a non-finite step.
    #[error("Invalid quantization range [{min}, {max}]")]
    InvalidRange {
        /// Lower bound as given
        min: f64,
        /// Upper bound as given
        max: f64,
    },

    /// Per-channel layout does not divide the buffer.
    #[error("Invalid channel layout: {channels} channels over {len} elements ({message})")]
    InvalidChannels {
        /// Requested channel count
        channels: usize,
        /// Flat tensor length
        len: usize,
        /// What went wrong
        message: String,
    },

    /// Unsupported operation or feature
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Feature that is not supported
        feature: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unsupported feature error
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Create a channel layout error
    pub fn invalid_channels(channels: usize, len: usize, message: impl Into<String>) -> Self {
        Self::InvalidChannels {
            channels,
            len,
            message: message.into(),
        }
    }

    /// Get the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidBitwidth { .. } => "INVALID_BITWIDTH",
            Error::BufferTooSmall { .. } => "BUFFER_TOO_SMALL",
            Error::InvalidRange { .. } => "INVALID_RANGE",
            Error::InvalidChannels { .. } => "INVALID_CHANNELS",
            Error::Unsupported { .. } => "UNSUPPORTED",
            Error::Config { .. } => "CONFIG_ERROR",
        }
    }
}

/// Check that `bitwidth` lies in `1..=max`.
pub fn validate_bitwidth(bitwidth: u8, max: u8) -> Result<()> {
    if bitwidth == 0 || bitwidth > max {
        return Err(Error::InvalidBitwidth { bitwidth, max });
    }
    Ok(())
}
