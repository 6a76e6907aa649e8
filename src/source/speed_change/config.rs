//! Configuration types and builders for speed change.

use std::time::Duration;

use crate::common::{Float, SampleRate};

const DEFAULT_WINDOW: Duration = Duration::from_millis(30);
const DEFAULT_TOLERANCE: Float = 1.0;
const DEFAULT_PATTERN: Float = 0.25;

/// Smallest processing window in frames, whatever the duration and sample rate.
const MIN_WINDOW_FRAMES: usize = 4;

/// Window settings of a [`SpeedChange`](super::SpeedChange).
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sincstretch::source::SpeedConfig;
///
/// let config = SpeedConfig::default();
/// assert_eq!(config.window(), Duration::from_millis(30));
///
/// let config = SpeedConfig::builder()
///     .window(Duration::from_millis(20))
///     .tolerance(0.5)
///     .build();
/// assert_eq!(config.tolerance(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    window: Duration,
    tolerance: Float,
    pattern: Float,
}

impl SpeedConfig {
    /// Create a speed change configuration builder.
    pub fn builder() -> SpeedConfigBuilder {
        SpeedConfigBuilder::default()
    }

    /// Duration of one processing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Width of the splice search as a fraction of the window.
    pub fn tolerance(&self) -> Float {
        self.tolerance
    }

    /// Length of the compared pattern as a fraction of the window.
    pub fn pattern(&self) -> Float {
        self.pattern
    }

    /// Converts the configuration to frame counts at `sample_rate`.
    pub(crate) fn frames(&self, sample_rate: SampleRate) -> WindowFrames {
        let window = ((self.window.as_secs_f64() * sample_rate as f64).round() as usize)
            .max(MIN_WINDOW_FRAMES);
        let fraction = |part: Float| ((window as Float * part).round() as usize).clamp(1, window);
        WindowFrames {
            window,
            tolerance: ((window as Float * self.tolerance).round() as usize).max(1),
            pattern: fraction(self.pattern),
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        SpeedConfigBuilder::default().build()
    }
}

/// Frame counts derived from a [`SpeedConfig`] for one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowFrames {
    /// Output frames per window.
    pub(crate) window: usize,
    /// Candidate splice offsets searched per window.
    pub(crate) tolerance: usize,
    /// Frames compared per candidate.
    pub(crate) pattern: usize,
}

/// Builder for [`SpeedConfig`].
#[derive(Debug, Clone)]
pub struct SpeedConfigBuilder {
    window: Duration,
    tolerance: Float,
    pattern: Float,
}

impl Default for SpeedConfigBuilder {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            tolerance: DEFAULT_TOLERANCE,
            pattern: DEFAULT_PATTERN,
        }
    }
}

impl SpeedConfigBuilder {
    /// Set the duration of one processing window (typical range: 10-60ms).
    ///
    /// Each window of output is a cross-fade between two stretches of input. Longer windows
    /// smear transients, shorter ones make low frequencies warble. Default is 30ms.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero.
    pub fn window(mut self, window: Duration) -> Self {
        assert!(!window.is_zero(), "window must not be zero");
        self.window = window;
        self
    }

    /// Set how far past the ideal position a splice may be placed, as a fraction of the window.
    ///
    /// Wider searches find better matches at the cost of CPU and timing accuracy.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance` is not in range 0.0-4.0 or is zero.
    pub fn tolerance(mut self, tolerance: Float) -> Self {
        assert!(
            tolerance > 0.0 && tolerance <= 4.0,
            "tolerance must be in (0.0, 4.0]"
        );
        self.tolerance = tolerance;
        self
    }

    /// Set how much audio is compared per candidate splice, as a fraction of the window.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not in range 0.0-1.0 or is zero.
    pub fn pattern(mut self, pattern: Float) -> Self {
        assert!(
            pattern > 0.0 && pattern <= 1.0,
            "pattern must be in (0.0, 1.0]"
        );
        self.pattern = pattern;
        self
    }

    /// Build the final [`SpeedConfig`].
    pub fn build(self) -> SpeedConfig {
        SpeedConfig {
            window: self.window,
            tolerance: self.tolerance,
            pattern: self.pattern,
        }
    }
}

impl From<SpeedConfigBuilder> for SpeedConfig {
    fn from(builder: SpeedConfigBuilder) -> Self {
        builder.build()
    }
}
