//! Numeric helpers shared by the filter stages.

use dasp_sample::Sample as _;
use num_rational::Ratio;

use crate::common::{Float, Sample, SampleRate};

/// Scale between the fixed-point sample domain and `[-1.0, 1.0)`.
const FIXED_SCALE: Float = 32768.0;

/// Linear interpolation between two samples.
///
/// The result is `first * (1 - t) + second * t`.
#[inline]
pub fn lerp(first: Float, second: Float, t: Float) -> Float {
    first + (second - first) * t
}

/// Converts a fixed-point sample to the floating point domain `[-1.0, 1.0)`.
#[inline]
pub fn to_float(sample: Sample) -> Float {
    sample.to_sample::<Float>()
}

/// Converts a floating point value back to a fixed-point sample.
///
/// Rounds to nearest and saturates at the representable range, so overshoot never wraps around.
#[inline]
pub fn to_fixed(value: Float) -> Sample {
    (value * FIXED_SCALE)
        .round()
        .clamp(Sample::MIN as Float, Sample::MAX as Float) as Sample
}

/// Reduces the conversion ratio `to / from` to lowest terms.
///
/// Returns `(up_factor, down_factor)`.
///
/// # Panics
///
/// Panics if either rate is zero.
pub fn reduce_ratio(from: SampleRate, to: SampleRate) -> (u32, u32) {
    assert!(from != 0, "source sample rate must not be zero");
    assert!(to != 0, "target sample rate must not be zero");
    Ratio::new(to, from).into_raw()
}

/// Unnormalized sinc, `sin(x) / x` with `sinc(0) = 1`.
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Modified Bessel function of the first kind, order zero.
///
/// Polynomial approximation below `3.75`, asymptotic expansion above it (Abramowitz & Stegun
/// 9.8.1 and 9.8.2). Relative error stays below `2e-7` over the whole domain.
pub fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        1.0 + y
            * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))))
    } else {
        let y = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + y * (0.01328592
                    + y * (0.00225319
                        + y * (-0.00157565
                            + y * (0.00916281
                                + y * (-0.02057706
                                    + y * (0.02635537
                                        + y * (-0.01647633 + y * 0.00392377))))))))
    }
}
