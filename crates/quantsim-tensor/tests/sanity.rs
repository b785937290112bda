//! End-to-end behaviour of the simulator on a small fixed tensor.

use approx::assert_abs_diff_eq;
use quantsim_tensor::{RoundingMode, TensorQuantizationSim};

const TENSOR: [f32; 6] = [-0.5, -0.25, 0.0, 0.25, 0.5, 0.75];

fn fake_quant(min: f64, max: f64) -> [f32; 6] {
    let sim = TensorQuantizationSim::<f32>::new();
    let mut out = [0.0f32; 6];
    sim.quantize_dequantize_tensor(&TENSOR, &mut out, min, max, 8, RoundingMode::Nearest, false)
        .unwrap();
    out
}

fn assert_all_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= 1e-6, "index {i}: got {a}, expected {e}");
    }
}

#[test]
fn sanity() {
    let out = fake_quant(-0.46, 0.72);
    assert_all_close(
        &out,
        &[-0.45811754, -0.2498823, 0.0, 0.2498823, 0.49976459, 0.72188222],
    );
}

#[test]
fn gated_min() {
    // min is gated to 0, range becomes [0, 1]
    let out = fake_quant(0.5, 1.0);
    assert_all_close(&out, &[0.0, 0.0, 0.0, 0.25098041, 0.50196081, 0.74901962]);
}

#[test]
fn gated_min_max_equal() {
    let out = fake_quant(0.5, 0.5);
    assert_all_close(&out, &[0.0, 0.0, 0.0, 0.25098041, 0.5, 0.5]);
}

#[test]
fn gated_max() {
    // max is gated to 0, range becomes [-0.5, 0]
    let out = fake_quant(-0.5, -0.1);
    assert_all_close(&out, &[-0.5, -0.25098041, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn quantize_only() {
    let sim = TensorQuantizationSim::<f32>::new();
    let mut out = [0.0f32; 6];
    sim.quantize_tensor(&TENSOR, &mut out, -0.46, 0.72, 8, RoundingMode::Nearest, false)
        .unwrap();
    assert_eq!(out, [0.0, 45.0, 99.0, 153.0, 207.0, 255.0]);
}

#[test]
fn zero_range_is_not_an_error() {
    let sim = TensorQuantizationSim::<f32>::new();
    let mut out = [1.0f32; 6];
    let enc = sim
        .quantize_dequantize_tensor(&TENSOR, &mut out, 0.0, 0.0, 8, RoundingMode::Nearest, false)
        .unwrap();

    assert!(enc.max - enc.min > 0.0);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[2], 0.0);
    assert_abs_diff_eq!(out[5] as f64, enc.max, epsilon = 1e-6);
}

#[test]
fn same_results_across_precisions() {
    let sim32 = TensorQuantizationSim::<f32>::new();
    let sim64 = TensorQuantizationSim::<f64>::new();
    let input64: Vec<f64> = TENSOR.iter().map(|&v| v as f64).collect();

    let mut out32 = [0.0f32; 6];
    let mut out64 = [0.0f64; 6];
    sim32
        .quantize_tensor(&TENSOR, &mut out32, -0.46, 0.72, 8, RoundingMode::Nearest, false)
        .unwrap();
    sim64
        .quantize_tensor(&input64, &mut out64, -0.46, 0.72, 8, RoundingMode::Nearest, false)
        .unwrap();

    for (a, b) in out32.iter().zip(&out64) {
        assert_eq!(*a as f64, *b);
    }
}
