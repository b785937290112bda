//! # Quantsim Core
//!
//! Core types shared by the quantsim fixed-point quantization simulator.
//!
//! This crate provides the vocabulary used throughout quantsim:
//!
//! - **Error handling**: A single error type for caller-input violations
//! - **Elements**: The floating-point element types a tensor may hold
//! - **Rounding**: Rounding policies that snap real levels to integers
//!
//! ## Example
//!
//! ```rust
//! use quantsim_core::{validate_bitwidth, RoundingMode, MAX_BITWIDTH};
//!
//! assert!(validate_bitwidth(8, MAX_BITWIDTH).is_ok());
//! assert!(validate_bitwidth(0, MAX_BITWIDTH).is_err());
//! assert_eq!(RoundingMode::default(), RoundingMode::Nearest);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod element;
pub mod error;
pub mod rounding;

pub use element::{DType, Element};
pub use error::{validate_bitwidth, Error, Result, MAX_BITWIDTH};
pub use rounding::{round_stochastic, RoundFn, RoundingMode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::element::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::rounding::RoundingMode;

    pub use half::{bf16, f16};
}
