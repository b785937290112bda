//! # Quantsim Tensor
//!
//! Per-tensor fixed-point quantization simulation.
//!
//! This crate provides:
//!
//! - **Range resolution**: Gating a raw `[min, max]` so zero is representable
//! - **Encodings**: Scale/offset derivation for a target bit-width
//! - **Kernels**: Chunked, optionally rayon-parallel element transforms
//! - **Simulator**: [`TensorQuantizationSim`], quantize-only and fake-quant entry points
//!
//! ## Example
//!
//! ```rust
//! use quantsim_tensor::{RoundingMode, TensorQuantizationSim};
//!
//! let sim = TensorQuantizationSim::<f32>::new();
//! let input = [-0.5f32, -0.25, 0.0, 0.25, 0.5, 0.75];
//! let mut levels = [0.0f32; 6];
//!
//! sim.quantize_tensor(&input, &mut levels, -0.46, 0.72, 8, RoundingMode::Nearest, false)?;
//! assert_eq!(levels, [0.0, 45.0, 99.0, 153.0, 207.0, 255.0]);
//! # Ok::<(), quantsim_tensor::Error>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod encoding;
pub mod kernel;
pub mod range;
pub mod sim;

pub use encoding::{compute_scale_offset, num_steps, Encoding, EncodingScheme};
pub use kernel::{
    dequantize_slice, quantize_dequantize_slice, quantize_slice, KernelOptions, CHUNK_SIZE,
    DEFAULT_PARALLEL_THRESHOLD,
};
pub use range::{gate_min_max, QuantRange, ENCODING_EPSILON};
pub use sim::{SimOptions, TensorQuantizationSim};

pub use quantsim_core::{DType, Element, Error, Result, RoundingMode};

/// Prelude for common imports
pub mod prelude {
    pub use super::encoding::*;
    pub use super::range::*;
    pub use super::sim::*;
    pub use quantsim_core::prelude::*;
}
