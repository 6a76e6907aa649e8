//! Windowed-sinc low-pass FIR synthesis.
//!
//! A filter is designed in three passes: an ideal sinc low-pass of the requested length, a Kaiser
//! window that tapers it to finite support, and a normalization so the pass-band gain after
//! decimation is unity.

use crate::math::{bessel_i0, sinc};

use std::f64::consts::TAU;

/// Taps each polyphase branch convolves per output sample.
pub const TAPS_PER_PHASE: usize = 8;

/// Kaiser window shape parameter.
pub const KAISER_BETA: f64 = 8.0;

/// Ideal low-pass impulse response of `window_size` taps centred on the window.
///
/// `cutoff` is relative to the sampling frequency, so `0.5` is Nyquist.
pub fn sinc_low_pass(window_size: usize, cutoff: f64) -> Vec<f64> {
    let center = (window_size as f64 - 1.0) / 2.0;
    (0..window_size)
        .map(|n| sinc(TAU * cutoff * (n as f64 - center)) * 2.0 * cutoff)
        .collect()
}

/// Multiplies `taps` by a Kaiser window of shape `beta`.
pub fn apply_kaiser_window(taps: &mut [f64], beta: f64) {
    let center = (taps.len() as f64 - 1.0) / 2.0;
    if center <= 0.0 {
        return;
    }
    let denominator = bessel_i0(beta);
    for (n, tap) in taps.iter_mut().enumerate() {
        let x = (n as f64 - center) / center;
        let arg = (1.0 - x * x).max(0.0).sqrt();
        *tap *= bessel_i0(beta * arg) / denominator;
    }
}

/// Scales `taps` so they sum to `gain`.
pub fn normalize(taps: &mut [f64], gain: f64) {
    let sum: f64 = taps.iter().sum();
    for tap in taps.iter_mut() {
        *tap = *tap / sum * gain;
    }
}

/// Designs the anti-aliasing filter for upsampling by `up_factor`.
///
/// The result has `TAPS_PER_PHASE * up_factor` taps summing to `up_factor`, which compensates for
/// the zero-stuffing implied by upsampling.
///
/// # Panics
///
/// Panics if `up_factor` is zero or `cutoff` is not in `(0, 0.5]`.
pub fn design(up_factor: u32, cutoff: f64) -> Vec<f64> {
    assert!(up_factor != 0, "up factor must not be zero");
    assert!(
        cutoff > 0.0 && cutoff <= 0.5,
        "cutoff must be in (0, 0.5], got {cutoff}"
    );
    let mut taps = sinc_low_pass(TAPS_PER_PHASE * up_factor as usize, cutoff);
    apply_kaiser_window(&mut taps, KAISER_BETA);
    normalize(&mut taps, up_factor as f64);
    taps
}
