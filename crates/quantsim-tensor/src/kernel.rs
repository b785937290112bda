//! Element kernels.
//!
//! Buffers are processed in fixed [`CHUNK_SIZE`] chunks, serially or with rayon
//! once the tensor reaches the parallel threshold. Every element depends only
//! on its own input and the shared encoding, and stochastic rounding seeds a
//! fresh RNG per chunk from `(seed, chunk_index)`, so the output is identical on
//! both paths and for any thread count.

use quantsim_core::{
    round_stochastic, validate_bitwidth, Element, Error, Result, RoundFn, RoundingMode,
    MAX_BITWIDTH,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::encoding::Encoding;

/// Elements per work unit.
pub const CHUNK_SIZE: usize = 4096;

/// Tensor length at which chunks are dispatched to rayon by default.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Which transform a kernel applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// Real value to integer level.
    Quantize,
    /// Integer level to real value.
    Dequantize,
    /// Quantize then dequantize.
    QuantizeDequantize,
}

/// Rounding resolved once per call.
#[derive(Debug, Clone, Copy)]
enum Rounder {
    Fixed(RoundFn),
    Stochastic { seed: u64 },
}

/// Execution settings shared by all kernels.
#[derive(Debug, Clone, Copy)]
pub struct KernelOptions {
    /// Minimum tensor length that triggers rayon parallelism.
    pub parallel_threshold: usize,
    /// Seed for stochastic rounding; drawn from the thread RNG when `None`.
    pub seed: Option<u64>,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            seed: None,
        }
    }
}

/// A fully resolved element transform.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElementOp {
    encoding: Encoding,
    stage: Stage,
    rounder: Rounder,
}

impl ElementOp {
    /// Resolve the rounding policy and bind it to an encoding.
    pub fn new(encoding: Encoding, stage: Stage, rounding: RoundingMode, seed: Option<u64>) -> Self {
        let rounder = match rounding.resolve() {
            Some(round) => Rounder::Fixed(round),
            None => Rounder::Stochastic {
                seed: seed.unwrap_or_else(|| rand::thread_rng().gen()),
            },
        };

        Self {
            encoding,
            stage,
            rounder,
        }
    }

    /// Copy of this op with its stochastic seed mixed with `salt`.
    pub(crate) fn salted(&self, salt: u64) -> Self {
        let mut op = *self;
        if let Rounder::Stochastic { seed } = op.rounder {
            op.rounder = Rounder::Stochastic {
                seed: mix_seed(seed, salt),
            };
        }
        op
    }

    /// Copy of this op applied to a different encoding.
    pub(crate) fn with_encoding(&self, encoding: Encoding) -> Self {
        Self { encoding, ..*self }
    }

    #[inline]
    fn apply<R: FnMut(f64) -> f64>(&self, x: f64, round: R) -> f64 {
        match self.stage {
            Stage::Quantize => self.encoding.quantize_with(x, round),
            Stage::Dequantize => self.encoding.dequantize(x),
            Stage::QuantizeDequantize => self.encoding.quantize_dequantize_with(x, round),
        }
    }

    /// Transform one chunk. `src` of `None` means `dst` holds the input.
    fn run_chunk<T: Element>(&self, chunk_index: usize, src: Option<&[T]>, dst: &mut [T]) {
        match self.rounder {
            Rounder::Fixed(round) => map_elements(src, dst, |x| self.apply(x, round)),
            Rounder::Stochastic { seed } => {
                let mut rng = StdRng::seed_from_u64(mix_seed(seed, chunk_index as u64));
                map_elements(src, dst, |x| {
                    self.apply(x, |v| round_stochastic(v, rng.gen::<f64>()))
                })
            }
        }
    }
}

#[inline]
fn map_elements<T: Element, F: FnMut(f64) -> f64>(src: Option<&[T]>, dst: &mut [T], mut f: F) {
    match src {
        Some(src) => {
            for (out, &x) in dst.iter_mut().zip(src) {
                *out = T::from_f64(f(x.to_f64()));
            }
        }
        None => {
            for v in dst.iter_mut() {
                *v = T::from_f64(f(v.to_f64()));
            }
        }
    }
}

/// SplitMix64 finaliser over `seed ^ salt`.
fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub(crate) fn check_buffers(input_len: usize, output_len: usize) -> Result<()> {
    if output_len < input_len {
        return Err(Error::BufferTooSmall {
            expected: input_len,
            actual: output_len,
        });
    }
    Ok(())
}

/// Reject encodings whose bit-width the kernels cannot represent.
fn check_encoding(encoding: &Encoding) -> Result<()> {
    validate_bitwidth(encoding.bitwidth, MAX_BITWIDTH)
}

/// Apply `op` from `src` into the first `src.len()` elements of `dst`.
///
/// `dst` must be at least as long as `src`; callers check with [`check_buffers`].
pub(crate) fn run<T: Element>(op: &ElementOp, src: &[T], dst: &mut [T], parallel_threshold: usize) {
    let dst = &mut dst[..src.len()];

    if src.len() >= parallel_threshold {
        dst.par_chunks_mut(CHUNK_SIZE)
            .zip(src.par_chunks(CHUNK_SIZE))
            .enumerate()
            .for_each(|(i, (out, inp))| op.run_chunk(i, Some(inp), out));
    } else {
        dst.chunks_mut(CHUNK_SIZE)
            .zip(src.chunks(CHUNK_SIZE))
            .enumerate()
            .for_each(|(i, (out, inp))| op.run_chunk(i, Some(inp), out));
    }
}

/// Apply `op` to `buf` in place.
pub(crate) fn run_in_place<T: Element>(op: &ElementOp, buf: &mut [T], parallel_threshold: usize) {
    if buf.len() >= parallel_threshold {
        buf.par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| op.run_chunk(i, None, chunk));
    } else {
        buf.chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| op.run_chunk(i, None, chunk));
    }
}

/// Quantize `src` into `dst` with a pre-computed encoding.
///
/// Fails with [`Error::InvalidBitwidth`] for an encoding outside `1..=32`
/// bits and with [`Error::BufferTooSmall`] when `dst` is shorter than `src`.
pub fn quantize_slice<T: Element>(
    src: &[T],
    dst: &mut [T],
    encoding: &Encoding,
    rounding: RoundingMode,
    options: &KernelOptions,
) -> Result<()> {
    check_encoding(encoding)?;
    check_buffers(src.len(), dst.len())?;

    let op = ElementOp::new(*encoding, Stage::Quantize, rounding, options.seed);
    run(&op, src, dst, options.parallel_threshold);
    Ok(())
}

/// Dequantize integer levels in `src` into `dst`.
pub fn dequantize_slice<T: Element>(
    src: &[T],
    dst: &mut [T],
    encoding: &Encoding,
    options: &KernelOptions,
) -> Result<()> {
    check_encoding(encoding)?;
    check_buffers(src.len(), dst.len())?;

    let op = ElementOp::new(
        *encoding,
        Stage::Dequantize,
        RoundingMode::Nearest,
        options.seed,
    );
    run(&op, src, dst, options.parallel_threshold);
    Ok(())
}

/// Fake-quantize `src` into `dst` with a pre-computed encoding.
pub fn quantize_dequantize_slice<T: Element>(
    src: &[T],
    dst: &mut [T],
    encoding: &Encoding,
    rounding: RoundingMode,
    options: &KernelOptions,
) -> Result<()> {
    check_encoding(encoding)?;
    check_buffers(src.len(), dst.len())?;

    let op = ElementOp::new(*encoding, Stage::QuantizeDequantize, rounding, options.seed);
    run(&op, src, dst, options.parallel_threshold);
    Ok(())
}
