//! Tensor quantization simulator.
//!
//! [`TensorQuantizationSim`] is the entry point callers use: it resolves the
//! range, computes the encoding once, and runs the element kernels over a
//! caller-owned buffer. It holds configuration only, so one instance may be
//! shared freely across threads and across tensors with different ranges.

use std::marker::PhantomData;
use std::sync::Arc;

use quantsim_core::{validate_bitwidth, Element, Error, Result, RoundingMode, MAX_BITWIDTH};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace_span};

use crate::encoding::{Encoding, EncodingScheme};
use crate::kernel::{self, check_buffers, ElementOp, Stage, DEFAULT_PARALLEL_THRESHOLD};
use crate::range::QuantRange;

/// Options for a [`TensorQuantizationSim`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Minimum tensor length that triggers rayon parallelism.
    pub parallel_threshold: usize,
    /// Worker threads for a dedicated pool (0 = rayon global pool).
    pub num_threads: usize,
    /// Seed for stochastic rounding.
    pub seed: Option<u64>,
    /// Use the full unsigned grid for symmetric encodings of non-negative ranges.
    pub unsigned_symmetric: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            num_threads: 0,
            seed: None,
            unsigned_symmetric: false,
        }
    }
}

/// Per-tensor quantization simulator for element type `T`.
#[derive(Debug, Clone)]
pub struct TensorQuantizationSim<T: Element> {
    options: SimOptions,
    pool: Option<Arc<rayon::ThreadPool>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> Default for TensorQuantizationSim<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> TensorQuantizationSim<T> {
    /// Create a simulator with default options.
    pub fn new() -> Self {
        Self {
            options: SimOptions::default(),
            pool: None,
            _marker: PhantomData,
        }
    }

    /// Create a simulator with explicit options.
    pub fn with_options(options: SimOptions) -> Result<Self> {
        let pool = if options.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.num_threads)
                .thread_name(|i| format!("quantsim-{i}"))
                .build()
                .map_err(|e| Error::config(format!("failed to build thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            options,
            pool,
            _marker: PhantomData,
        })
    }

    /// Options this simulator was built with.
    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Resolve `[min, max]` and compute its encoding.
    pub fn compute_encoding(
        &self,
        min: f64,
        max: f64,
        bitwidth: u8,
        use_symmetric: bool,
    ) -> Result<Encoding> {
        let scheme = EncodingScheme::from_flags(use_symmetric, self.options.unsigned_symmetric);
        let encoding = Encoding::compute(QuantRange::new(min, max)?, bitwidth, scheme)?;

        debug!(
            raw_min = min,
            raw_max = max,
            min = encoding.min,
            max = encoding.max,
            delta = encoding.delta,
            offset = encoding.offset,
            bitwidth,
            ?scheme,
            "Computed encoding"
        );

        Ok(encoding)
    }

    /// Quantize `input` into integer levels written to `output`.
    ///
    /// Levels lie in `[0, 2^bitwidth - 1]` and are stored as `T`, so the
    /// bit-width may not exceed the mantissa width of `T`.
    #[allow(clippy::too_many_arguments)]
    pub fn quantize_tensor(
        &self,
        input: &[T],
        output: &mut [T],
        min: f64,
        max: f64,
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Encoding> {
        let _span = trace_span!("quantize_tensor", len = input.len(), bitwidth).entered();
        validate_bitwidth(bitwidth, Self::max_level_bits())?;
        check_buffers(input.len(), output.len())?;

        let encoding = self.compute_encoding(min, max, bitwidth, use_symmetric)?;
        let op = self.element_op(encoding, Stage::Quantize, rounding);
        self.run(&op, input, output);
        Ok(encoding)
    }

    /// Quantize then dequantize `input` into `output` ("fake quantization").
    ///
    /// `output` keeps the element type of `input` but carries the error of
    /// the integer grid, within one step of the input for in-range values.
    #[allow(clippy::too_many_arguments)]
    pub fn quantize_dequantize_tensor(
        &self,
        input: &[T],
        output: &mut [T],
        min: f64,
        max: f64,
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Encoding> {
        let _span =
            trace_span!("quantize_dequantize_tensor", len = input.len(), bitwidth).entered();
        check_buffers(input.len(), output.len())?;

        let encoding = self.compute_encoding(min, max, bitwidth, use_symmetric)?;
        let op = self.element_op(encoding, Stage::QuantizeDequantize, rounding);
        self.run(&op, input, output);
        Ok(encoding)
    }

    /// Map integer levels in `input` back to real values.
    pub fn dequantize_tensor(&self, input: &[T], output: &mut [T], encoding: &Encoding) -> Result<()> {
        let _span = trace_span!("dequantize_tensor", len = input.len()).entered();
        validate_bitwidth(encoding.bitwidth, MAX_BITWIDTH)?;
        check_buffers(input.len(), output.len())?;

        let op = self.element_op(*encoding, Stage::Dequantize, RoundingMode::Nearest);
        self.run(&op, input, output);
        Ok(())
    }

    /// In-place [`quantize_tensor`](Self::quantize_tensor).
    pub fn quantize_tensor_in_place(
        &self,
        buf: &mut [T],
        min: f64,
        max: f64,
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Encoding> {
        validate_bitwidth(bitwidth, Self::max_level_bits())?;

        let encoding = self.compute_encoding(min, max, bitwidth, use_symmetric)?;
        let op = self.element_op(encoding, Stage::Quantize, rounding);
        self.run_in_place(&op, buf);
        Ok(encoding)
    }

    /// In-place [`quantize_dequantize_tensor`](Self::quantize_dequantize_tensor).
    pub fn quantize_dequantize_tensor_in_place(
        &self,
        buf: &mut [T],
        min: f64,
        max: f64,
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Encoding> {
        let encoding = self.compute_encoding(min, max, bitwidth, use_symmetric)?;
        let op = self.element_op(encoding, Stage::QuantizeDequantize, rounding);
        self.run_in_place(&op, buf);
        Ok(encoding)
    }

    /// Quantize a flat buffer whose leading axis holds `ranges.len()` channels.
    pub fn quantize_per_channel(
        &self,
        input: &[T],
        output: &mut [T],
        ranges: &[(f64, f64)],
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Vec<Encoding>> {
        validate_bitwidth(bitwidth, Self::max_level_bits())?;
        self.per_channel(input, output, ranges, bitwidth, rounding, use_symmetric, Stage::Quantize)
    }

    /// Fake-quantize a flat buffer with one range per channel.
    ///
    /// The buffer is split into `ranges.len()` equal contiguous slices; each
    /// slice gets its own encoding.
    pub fn quantize_dequantize_per_channel(
        &self,
        input: &[T],
        output: &mut [T],
        ranges: &[(f64, f64)],
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
    ) -> Result<Vec<Encoding>> {
        self.per_channel(
            input,
            output,
            ranges,
            bitwidth,
            rounding,
            use_symmetric,
            Stage::QuantizeDequantize,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn per_channel(
        &self,
        input: &[T],
        output: &mut [T],
        ranges: &[(f64, f64)],
        bitwidth: u8,
        rounding: RoundingMode,
        use_symmetric: bool,
        stage: Stage,
    ) -> Result<Vec<Encoding>> {
        let _span = trace_span!(
            "per_channel",
            len = input.len(),
            channels = ranges.len(),
            bitwidth
        )
        .entered();
        check_buffers(input.len(), output.len())?;

        let channels = ranges.len();
        if channels == 0 {
            return Err(Error::invalid_channels(0, input.len(), "no channel ranges"));
        }
        if input.len() % channels != 0 {
            return Err(Error::invalid_channels(
                channels,
                input.len(),
                "length is not a multiple of the channel count",
            ));
        }

        // Resolve every encoding before any output element is written.
        let encodings = ranges
            .iter()
            .map(|&(min, max)| self.compute_encoding(min, max, bitwidth, use_symmetric))
            .collect::<Result<Vec<_>>>()?;

        let channel_len = input.len() / channels;
        if channel_len == 0 {
            return Ok(encodings);
        }

        // One seed for the call, salted per channel
        let base = self.element_op(encodings[0], stage, rounding);

        for (c, ((src, dst), encoding)) in input
            .chunks(channel_len)
            .zip(output.chunks_mut(channel_len))
            .zip(&encodings)
            .enumerate()
        {
            let op = base.with_encoding(*encoding).salted(c as u64);
            self.run(&op, src, dst);
        }

        Ok(encodings)
    }

    /// Bit-width limit for outputs that store integer levels as `T`.
    fn max_level_bits() -> u8 {
        T::DTYPE.mantissa_digits().min(MAX_BITWIDTH as u32) as u8
    }

    fn element_op(&self, encoding: Encoding, stage: Stage, rounding: RoundingMode) -> ElementOp {
        ElementOp::new(encoding, stage, rounding, self.options.seed)
    }

    fn run(&self, op: &ElementOp, input: &[T], output: &mut [T]) {
        let threshold = self.options.parallel_threshold;
        match &self.pool {
            Some(pool) => pool.install(|| kernel::run(op, input, output, threshold)),
            None => kernel::run(op, input, output, threshold),
        }
    }

    fn run_in_place(&self, op: &ElementOp, buf: &mut [T]) {
        let threshold = self.options.parallel_threshold;
        match &self.pool {
            Some(pool) => pool.install(|| kernel::run_in_place(op, buf, threshold)),
            None => kernel::run_in_place(op, buf, threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::{bf16, f16};

    const TENSOR: [f32; 6] = [-0.5, -0.25, 0.0, 0.25, 0.5, 0.75];

    #[test]
    fn test_quantize_only_levels() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 6];
        sim.quantize_tensor(&TENSOR, &mut out, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(out, [0.0, 45.0, 99.0, 153.0, 207.0, 255.0]);
    }

    #[test]
    fn test_in_place_matches_out_of_place() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 6];
        sim.quantize_dequantize_tensor(&TENSOR, &mut out, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();

        let mut buf = TENSOR;
        sim.quantize_dequantize_tensor_in_place(&mut buf, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(out, buf);

        let mut levels = TENSOR;
        sim.quantize_tensor_in_place(&mut levels, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(levels, [0.0, 45.0, 99.0, 153.0, 207.0, 255.0]);
    }

    #[test]
    fn test_dequantize_inverts_quantize() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut levels = [0.0f32; 6];
        let enc = sim
            .quantize_tensor(&TENSOR, &mut levels, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();

        let mut restored = [0.0f32; 6];
        sim.dequantize_tensor(&levels, &mut restored, &enc).unwrap();

        let mut fake = [0.0f32; 6];
        sim.quantize_dequantize_tensor(&TENSOR, &mut fake, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(restored, fake);
    }

    #[test]
    fn test_invalid_bitwidth_rejected_before_writing() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [7.0f32; 6];
        for bw in [0u8, 33] {
            let err = sim
                .quantize_dequantize_tensor(&TENSOR, &mut out, -1.0, 1.0, bw, RoundingMode::Nearest, false)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidBitwidth { .. }));
        }
        assert_eq!(out, [7.0; 6]);
    }

    #[test]
    fn test_quantize_only_bitwidth_bounded_by_element() {
        let sim = TensorQuantizationSim::<f16>::new();
        let input = [f16::from_f32(0.5); 4];
        let mut out = [f16::ZERO; 4];

        assert!(sim
            .quantize_tensor(&input, &mut out, -1.0, 1.0, 11, RoundingMode::Nearest, false)
            .is_ok());
        assert_eq!(
            sim.quantize_tensor(&input, &mut out, -1.0, 1.0, 12, RoundingMode::Nearest, false),
            Err(Error::InvalidBitwidth { bitwidth: 12, max: 11 })
        );

        // Fake quantization keeps values in range, so the element width does not matter
        assert!(sim
            .quantize_dequantize_tensor(&input, &mut out, -1.0, 1.0, 16, RoundingMode::Nearest, false)
            .is_ok());
    }

    #[test]
    fn test_buffer_too_small() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 4];
        let err = sim
            .quantize_tensor(&TENSOR, &mut out, -1.0, 1.0, 8, RoundingMode::Nearest, false)
            .unwrap_err();
        assert_eq!(err, Error::BufferTooSmall { expected: 6, actual: 4 });
    }

    #[test]
    fn test_longer_output_tail_untouched() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [-1.0f32; 8];
        sim.quantize_tensor(&TENSOR, &mut out, -0.46, 0.72, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(&out[6..], &[-1.0, -1.0]);
    }

    #[test]
    fn test_empty_tensor() {
        let sim = TensorQuantizationSim::<f64>::new();
        let mut out: [f64; 0] = [];
        let enc = sim
            .quantize_dequantize_tensor(&[], &mut out, -1.0, 1.0, 8, RoundingMode::Nearest, false)
            .unwrap();
        assert_eq!(enc.bitwidth, 8);
    }

    #[test]
    fn test_non_finite_range_rejected() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 6];
        let err = sim
            .quantize_tensor(&TENSOR, &mut out, f64::NAN, 1.0, 8, RoundingMode::Nearest, false)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RANGE");
    }

    #[test]
    fn test_symmetric_mode() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 6];
        let enc = sim
            .quantize_tensor(&TENSOR, &mut out, -0.5, 0.75, 8, RoundingMode::Nearest, true)
            .unwrap();
        assert_eq!(enc.offset, -128.0);
        // Zero lands on the middle level
        assert_eq!(out[2], 128.0);
        // 0.75 is the range's abs max, so it lands on the top level
        assert_eq!(out[5], 255.0);
    }

    #[test]
    fn test_dedicated_pool() {
        let sim = TensorQuantizationSim::<f32>::with_options(SimOptions {
            parallel_threshold: 0,
            num_threads: 2,
            ..SimOptions::default()
        })
        .unwrap();
        let reference = TensorQuantizationSim::<f32>::new();

        let input: Vec<f32> = (0..20_000).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut a = vec![0.0f32; input.len()];
        let mut b = vec![0.0f32; input.len()];
        sim.quantize_dequantize_tensor(&input, &mut a, -1.0, 1.0, 6, RoundingMode::NearestEven, false)
            .unwrap();
        reference
            .quantize_dequantize_tensor(&input, &mut b, -1.0, 1.0, 6, RoundingMode::NearestEven, false)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_per_channel() {
        let sim = TensorQuantizationSim::<f32>::new();
        let input = [-0.5f32, 0.0, 0.5, -5.0, 0.0, 5.0];
        let mut out = [0.0f32; 6];
        let encs = sim
            .quantize_per_channel(
                &input,
                &mut out,
                &[(-1.0, 1.0), (-10.0, 10.0)],
                8,
                RoundingMode::Nearest,
                false,
            )
            .unwrap();

        assert_eq!(encs.len(), 2);
        assert!(encs[1].delta > encs[0].delta);
        // Same relative position in each channel maps to the same level
        assert_eq!(out, [64.0, 128.0, 192.0, 64.0, 128.0, 192.0]);
    }

    #[test]
    fn test_per_channel_fake_quant_matches_per_tensor() {
        let sim = TensorQuantizationSim::<f32>::new();
        let input: Vec<f32> = (0..12).map(|i| i as f32 / 4.0 - 1.5).collect();
        let ranges = [(-1.5, 0.0), (0.0, 1.25)];

        let mut per_channel = vec![0.0f32; 12];
        sim.quantize_dequantize_per_channel(&input, &mut per_channel, &ranges, 4, RoundingMode::Nearest, false)
            .unwrap();

        for (c, &(min, max)) in ranges.iter().enumerate() {
            let mut expected = [0.0f32; 6];
            sim.quantize_dequantize_tensor(&input[c * 6..(c + 1) * 6], &mut expected, min, max, 4, RoundingMode::Nearest, false)
                .unwrap();
            assert_eq!(&per_channel[c * 6..(c + 1) * 6], &expected);
        }
    }

    #[test]
    fn test_per_channel_layout_errors() {
        let sim = TensorQuantizationSim::<f32>::new();
        let mut out = [0.0f32; 6];
        let err = sim
            .quantize_dequantize_per_channel(&TENSOR, &mut out, &[(-1.0, 1.0); 4], 8, RoundingMode::Nearest, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChannels { channels: 4, len: 6, .. }));

        let err = sim
            .quantize_dequantize_per_channel(&TENSOR, &mut out, &[], 8, RoundingMode::Nearest, false)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CHANNELS");
    }

    #[test]
    fn test_bf16_fake_quant() {
        let sim = TensorQuantizationSim::<bf16>::new();
        let input: Vec<bf16> = TENSOR.iter().map(|&v| bf16::from_f32(v)).collect();
        let mut out = vec![bf16::ZERO; input.len()];
        sim.quantize_dequantize_tensor(&input, &mut out, 0.5, 1.0, 8, RoundingMode::Nearest, false)
            .unwrap();

        assert_eq!(out[0], bf16::ZERO);
        assert!((out[3].to_f32() - 0.2510).abs() < 4e-3);
    }
}
