//! Pitch-preserving speed change by waveform-similarity overlap-add.
//!
//! # Quick Start
//!
//! ```rust
//! use sincstretch::source::SineWave;
//! use sincstretch::Source;
//!
//! let tone = SineWave::new(44100, 440.0).with_channels(2);
//! let mut faster = tone.speed_change(1.5);
//! let mut buf = [0i16; 1024];
//! assert_eq!(faster.read(&mut buf)?, 1024);
//! # Ok::<(), sincstretch::source::ReadError>(())
//! ```
//!
//! # How it works
//!
//! Output is produced one window at a time. Every window emits `window` frames while the input
//! position advances by `window * ratio` frames, so playback runs `ratio` times faster.
//!
//! Rather than jumping to the new input position, each window cross-fades from the audio that
//! continues the previous window to a stretch of input near the new position. That stretch is
//! chosen by comparing a short pattern of the continuation against every candidate offset within
//! the search tolerance, which keeps the splice in phase and avoids clicks. Pitch is untouched
//! because no sample is ever played at a different rate.
//!
//! At a ratio of exactly 1.0 the filter forwards reads unchanged.

use std::time::Duration;

use crate::common::{ChannelCount, Float, Sample, SampleRate};
use crate::control::{self, Property, PropertyError};
use crate::math::{lerp, to_fixed, to_float};
use crate::source::{FrameReader, ReadError, SeekError};
use crate::Source;

mod config;
mod history;

pub use config::{SpeedConfig, SpeedConfigBuilder};

use config::WindowFrames;
use history::History;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Nothing buffered yet.
    Filling,
    /// Splices are placed by correlation.
    Correlating,
    /// The source has ended. Windows keep their pacing but splice without searching.
    Flushing,
    /// The ratio returned to 1.0. The continuation of the last window plays out, then the filter
    /// goes back to forwarding reads.
    Draining,
    /// Everything has been played.
    Finished,
}

/// Changes playback speed without changing pitch.
#[derive(Debug)]
pub struct SpeedChange<S> {
    input: S,
    config: SpeedConfig,
    frames: WindowFrames,
    /// Sample rate `frames` was computed for.
    frames_rate: SampleRate,
    history: Vec<History>,
    scratch: Vec<Sample>,
    state: State,
    ratio: Float,
    trailing_ratio: Float,
    /// Input frames per window at the trailing ratio.
    delta: usize,
    /// Where the input would be at exactly the requested speed.
    uncorrelated: usize,
    /// Frames of the current window already emitted.
    pos: usize,
    window_len: usize,
    reader: FrameReader,
}

impl<S> SpeedChange<S>
where
    S: Source,
{
    /// Wraps `input` at a speed ratio of 1.0.
    ///
    /// # Panics
    ///
    /// Panics if the source reports zero channels or a zero sample rate.
    pub fn new(input: S, config: SpeedConfig) -> Self {
        assert!(input.channels() != 0, "source must have at least one channel");
        assert!(input.sample_rate() != 0, "source sample rate must not be zero");
        let frames_rate = input.sample_rate();
        let frames = config.frames(frames_rate);
        let channels = input.channels() as usize;
        SpeedChange {
            history: (0..channels)
                .map(|_| History::with_capacity(history_capacity(&frames)))
                .collect(),
            scratch: Vec::new(),
            input,
            config,
            frames,
            frames_rate,
            state: State::Filling,
            ratio: 1.0,
            trailing_ratio: 1.0,
            delta: frames.window,
            uncorrelated: 0,
            pos: 0,
            window_len: 0,
            reader: FrameReader::new(),
        }
    }

    /// Sets the playback speed. `2.0` plays twice as fast.
    ///
    /// Before anything has been read the ratio applies immediately, afterwards it takes effect
    /// at the next window boundary.
    ///
    /// # Panics
    ///
    /// Panics if `ratio` is not a positive finite number.
    pub fn set_speed_ratio(&mut self, ratio: Float) {
        assert!(
            ratio.is_finite() && ratio > 0.0,
            "speed ratio must be positive and finite, got {ratio}"
        );
        self.ratio = ratio;
        if self.state == State::Filling {
            self.apply_ratio();
        }
    }

    /// The most recently requested speed ratio.
    pub fn speed_ratio(&self) -> Float {
        self.ratio
    }

    /// The ratio of the window currently being played.
    ///
    /// Differs from [`speed_ratio`](Self::speed_ratio) until a requested change reaches the
    /// next window boundary.
    pub fn trailing_speed_ratio(&self) -> Float {
        self.trailing_ratio
    }

    /// Whether the next read starts a new window, at which point a pending ratio takes effect.
    pub fn next_read_will_step(&self) -> bool {
        !self.bypassed() && self.pos == self.window_len && self.state != State::Finished
    }

    /// Length of a processing window in frames.
    pub fn window_frames(&self) -> usize {
        self.frames.window
    }

    /// The window settings.
    pub fn config(&self) -> &SpeedConfig {
        &self.config
    }

    /// Returns a reference to the inner source.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.input
    }

    /// Returns a mutable reference to the inner source.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.input
    }

    /// Returns the inner source.
    #[inline]
    pub fn into_inner(self) -> S {
        self.input
    }

    #[inline]
    fn bypassed(&self) -> bool {
        self.state == State::Filling && self.ratio == 1.0
    }

    fn apply_ratio(&mut self) {
        self.trailing_ratio = self.ratio;
        self.delta = ((self.frames.window as Float * self.ratio).round() as usize).max(1);
    }

    fn buffered(&self) -> usize {
        self.history[0].data.len()
    }

    /// Forgets all buffered input and returns to `Filling`.
    fn clear(&mut self) {
        for history in &mut self.history {
            history.clear();
        }
        self.state = State::Filling;
        self.uncorrelated = 0;
        self.pos = 0;
        self.window_len = 0;
        self.apply_ratio();
    }

    /// Recomputes the window sizes after the source rate changed.
    fn refresh_frames(&mut self) {
        let rate = self.input.sample_rate();
        if rate == self.frames_rate {
            return;
        }
        self.frames_rate = rate;
        self.frames = self.config.frames(rate);
        self.reader.reset();
        self.clear();
    }

    /// Reads upstream until `frames` frames are buffered or the source ends.
    ///
    /// Frames delivered before an upstream failure stay buffered.
    fn fill(&mut self, frames: usize) -> Result<(), ReadError> {
        let buffered = self.buffered();
        if self.reader.ended() || buffered >= frames {
            return Ok(());
        }
        let channels = self.history.len();
        let missing = frames - buffered;
        self.scratch.resize(missing * channels, 0);
        let got = self.reader.read(&mut self.input, &mut self.scratch)?;
        for (channel, history) in self.history.iter_mut().enumerate() {
            history.data.extend(
                self.scratch[..got * channels]
                    .iter()
                    .skip(channel)
                    .step_by(channels)
                    .map(|&s| to_float(s)),
            );
        }
        match self.reader.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Finishes the current window and sets up the next one.
    ///
    /// Returns `false` once everything has been played. Upstream is read before any cursor
    /// moves and what it delivered stays buffered, so a failed step can be retried.
    fn step(&mut self) -> Result<bool, ReadError> {
        match self.state {
            State::Finished => return Ok(false),
            State::Draining => {
                self.clear();
                if self.bypassed() {
                    return Ok(true);
                }
            }
            _ => {}
        }

        let WindowFrames {
            window,
            tolerance,
            pattern,
        } = self.frames;
        let restart = self.state == State::Filling;
        let (uncorrelated, furthest) = if restart {
            (0, 0)
        } else {
            let furthest = self
                .history
                .iter()
                .map(|h| h.correlated + self.pos)
                .max()
                .unwrap_or(0);
            (self.uncorrelated + self.delta, furthest)
        };
        let needed = (furthest + window).max(uncorrelated + tolerance - 1 + window);
        self.fill(needed)?;

        for history in &mut self.history {
            history.last = if restart {
                0
            } else {
                history.correlated + self.pos
            };
        }
        self.uncorrelated = uncorrelated;
        self.apply_ratio();
        self.pos = 0;

        if !restart && self.ratio == 1.0 {
            #[cfg(feature = "tracing")]
            tracing::debug!("speed back to 1.0, draining buffered audio");
            self.state = State::Draining;
            self.window_len = self.drain_len();
            return Ok(true);
        }

        let buffered = self.buffered();
        if self.uncorrelated >= buffered {
            self.state = State::Finished;
            self.window_len = 0;
            return Ok(false);
        }

        // a flushed window may end past the buffered input, `uncorrelated` never does
        let oldest = self.history.iter().map(|h| h.last).min().unwrap_or(0);
        let drop = oldest.min(self.uncorrelated);
        if drop > 0 {
            for history in &mut self.history {
                history.compact(drop);
            }
            self.uncorrelated -= drop;
        }
        let needed = needed - drop;

        let buffered = self.buffered();
        if buffered >= needed {
            self.state = State::Correlating;
            for history in &mut self.history {
                history.correlated = self.uncorrelated
                    + history.best_offset(self.uncorrelated, tolerance, pattern);
            }
            self.window_len = window;
            #[cfg(feature = "tracing")]
            tracing::trace!(
                uncorrelated = self.uncorrelated,
                delta = self.delta,
                offsets = ?self
                    .history
                    .iter()
                    .map(|h| h.correlated - self.uncorrelated)
                    .collect::<Vec<_>>(),
                "speed change window"
            );
            return Ok(true);
        }

        if restart && buffered < window {
            // too short for a single window, play it unmodified
            #[cfg(feature = "tracing")]
            tracing::debug!(buffered, "stream shorter than one window");
            self.state = State::Flushing;
            for history in &mut self.history {
                history.correlated = 0;
            }
            self.delta = buffered;
            self.window_len = buffered;
            return Ok(true);
        }

        if self.state != State::Flushing {
            #[cfg(feature = "tracing")]
            tracing::debug!(buffered, "source ended, flushing speed change");
        }
        self.state = State::Flushing;
        for history in &mut self.history {
            history.correlated = self.uncorrelated;
        }
        // the last window only covers the input that is left
        let remaining = (buffered - self.uncorrelated) * window;
        self.window_len = remaining.div_ceil(self.delta).min(window);
        Ok(true)
    }

    /// Reads upstream unchanged, after anything kept from an interrupted read.
    fn forward(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        match self.reader.take_carry(buf) {
            0 => self.input.read(buf),
            carried => Ok(carried),
        }
    }

    /// Frames every channel can play from its continuation.
    fn drain_len(&self) -> usize {
        let buffered = self.buffered();
        self.history
            .iter()
            .map(|h| buffered.saturating_sub(h.last))
            .min()
            .unwrap_or(0)
    }

    /// Renders the next `out.len() / channels` frames of the current window.
    fn render(&mut self, out: &mut [Sample]) {
        let channels = self.history.len();
        let window = self.frames.window as Float;
        for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
            let f = self.pos + i;
            let t = f as Float / window;
            for (sample, history) in frame.iter_mut().zip(&self.history) {
                let value = match self.state {
                    State::Draining => history.at(history.last + f),
                    _ => lerp(
                        history.at(history.last + f),
                        history.at(history.correlated + f),
                        t,
                    ),
                };
                *sample = to_fixed(value);
            }
        }
        self.pos += out.len() / channels;
    }
}

/// Input reserved per channel up front, enough for ratios up to 2.0 without reallocating.
fn history_capacity(frames: &WindowFrames) -> usize {
    3 * frames.window + frames.tolerance
}

impl<S> Clone for SpeedChange<S>
where
    S: Source + Clone,
{
    /// Duplicates the source. The clone starts with empty history at the requested ratio.
    fn clone(&self) -> Self {
        let mut copy = SpeedChange::new(self.input.clone(), self.config);
        copy.set_speed_ratio(self.ratio);
        copy
    }
}

impl<S> Source for SpeedChange<S>
where
    S: Source,
{
    #[inline]
    fn channels(&self) -> ChannelCount {
        self.input.channels()
    }

    #[inline]
    fn sample_rate(&self) -> SampleRate {
        self.input.sample_rate()
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        if let Some(err) = self.reader.take_error() {
            return Err(err);
        }
        if self.bypassed() {
            return self.forward(buf);
        }
        let channels = self.history.len();
        assert!(
            buf.is_empty() || buf.len() >= channels,
            "read buffer must hold at least one frame"
        );
        let frames = buf.len() / channels;
        let mut written = 0;
        while written < frames {
            if self.bypassed() {
                if written > 0 {
                    break;
                }
                return self.forward(buf);
            }
            if self.pos == self.window_len {
                match self.step() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) if written > 0 => {
                        self.reader.defer(err);
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
            let count = (frames - written).min(self.window_len - self.pos);
            self.render(&mut buf[written * channels..(written + count) * channels]);
            written += count;
        }
        Ok(written * channels)
    }

    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        self.reader.reset();
        self.clear();
        self.input.try_seek(pos)
    }

    fn set_property(&mut self, property: Property, value: Float) -> Result<(), PropertyError> {
        match property {
            Property::Rate => {
                self.set_speed_ratio(control::rate_value(value)?);
                Ok(())
            }
            _ => {
                self.input.set_property(property, value)?;
                self.refresh_frames();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SamplesBuffer;
    use crate::source::SineWave;
    use rstest::rstest;

    fn drain<S: Source>(source: &mut S, chunk_frames: usize) -> Vec<Sample> {
        let mut buf = vec![0; chunk_frames * source.channels() as usize];
        let mut out = Vec::new();
        loop {
            let read = source.read(&mut buf).unwrap();
            if read == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..read]);
        }
    }

    fn tone(frames: usize, channels: ChannelCount) -> SamplesBuffer {
        let mut wave = SineWave::new(8000, 220.0)
            .with_amplitude(0.5)
            .with_channels(channels);
        let mut data = vec![0; frames * channels as usize];
        wave.read(&mut data).unwrap();
        SamplesBuffer::new(channels, 8000, data)
    }

    /// 10ms windows: 80 frames at 8 kHz.
    fn config() -> SpeedConfig {
        SpeedConfig::builder()
            .window(Duration::from_millis(10))
            .build()
    }

    #[test]
    fn unity_ratio_is_bit_exact() {
        let input: Vec<i16> = (0..1000).map(|n| (n * 31 % 5000 - 2500) as i16).collect();
        let mut filter = SamplesBuffer::new(2, 8000, input.clone()).speed_change(1.0);
        assert_eq!(drain(&mut filter, 77), input);
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.75)]
    #[case(1.25)]
    #[case(2.0)]
    #[case(3.0)]
    fn output_length_scales_inversely(#[case] ratio: Float) {
        let frames = 8000;
        let mut filter = tone(frames, 1).speed_change_with(ratio, config());
        let window = filter.window_frames();
        let produced = drain(&mut filter, 256).len();
        let expected = frames as f64 / ratio as f64;
        assert!(
            (produced as f64 - expected).abs() <= window as f64 + 2.0,
            "ratio {ratio}: {produced} frames, expected about {expected}"
        );
    }

    #[test]
    fn first_window_plays_input_unchanged() {
        let source = tone(4000, 1);
        let input = drain(&mut source.clone(), 4000);
        let mut filter = source.speed_change_with(1.5, config());
        let mut out = [0i16; 80];
        assert_eq!(filter.read(&mut out).unwrap(), 80);
        assert_eq!(&out[..], &input[..80]);
    }

    #[test]
    fn short_streams_pass_through() {
        let input: Vec<i16> = (0..50).collect();
        let mut filter = SamplesBuffer::new(1, 8000, input.clone()).speed_change_with(2.0, config());
        assert_eq!(drain(&mut filter, 16), input);
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let mut filter = SamplesBuffer::new(2, 8000, Vec::<i16>::new()).speed_change(0.5);
        let mut buf = [0i16; 64];
        assert_eq!(filter.read(&mut buf).unwrap(), 0);
        assert_eq!(filter.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn pending_ratio_waits_for_window_boundary() {
        let mut filter = tone(8000, 1).speed_change_with(2.0, config());
        assert_eq!(filter.trailing_speed_ratio(), 2.0);
        assert!(filter.next_read_will_step());

        let mut buf = [0i16; 30];
        filter.read(&mut buf).unwrap();
        filter.set_speed_ratio(0.5);
        assert_eq!(filter.speed_ratio(), 0.5);
        assert_eq!(filter.trailing_speed_ratio(), 2.0);
        assert!(!filter.next_read_will_step());

        let mut rest = [0i16; 50];
        filter.read(&mut rest).unwrap();
        assert!(filter.next_read_will_step());
        filter.read(&mut buf[..1]).unwrap();
        assert_eq!(filter.trailing_speed_ratio(), 0.5);
    }

    #[test]
    fn returning_to_unity_resumes_forwarding() {
        let input: Vec<i16> = (0..4000).map(|n| (n % 400) as i16).collect();
        let mut filter = SamplesBuffer::new(1, 8000, input.clone()).speed_change_with(2.0, config());
        let mut buf = [0i16; 80];
        filter.read(&mut buf).unwrap();
        filter.set_speed_ratio(1.0);

        let rest = drain(&mut filter, 100);
        assert_eq!(filter.trailing_speed_ratio(), 1.0);
        assert!(!filter.next_read_will_step());
        // once drained, the tail of the stream is forwarded untouched
        assert_eq!(&rest[rest.len() - 1000..], &input[input.len() - 1000..]);
    }

    #[test]
    fn clones_start_fresh() {
        let filter = tone(3000, 2).speed_change_with(1.3, config());
        let mut copy = filter.clone();
        let mut original = filter;
        assert_eq!(drain(&mut original, 100), drain(&mut copy, 37));
    }

    #[test]
    fn seek_restarts_windows() {
        let mut filter = tone(3000, 1).speed_change_with(0.8, config());
        let fresh = drain(&mut filter.clone(), 128);
        let mut buf = [0i16; 333];
        filter.read(&mut buf).unwrap();
        filter.try_seek(Duration::ZERO).unwrap();
        assert_eq!(drain(&mut filter, 128), fresh);
    }

    #[test]
    fn rate_property_sets_pending_ratio() {
        let mut filter = tone(100, 1).speed_change(1.0);
        filter.set_property(Property::Rate, 1.5).unwrap();
        assert_eq!(filter.trailing_speed_ratio(), 1.5);
        assert!(matches!(
            filter.set_property(Property::Rate, -1.0),
            Err(PropertyError::InvalidValue { .. })
        ));
        assert_eq!(
            filter.set_property(Property::SampleRate, 44100.0),
            Err(PropertyError::Unsupported(Property::SampleRate))
        );
    }

    #[test]
    fn upstream_rate_change_resizes_window() {
        let mut filter = tone(100, 1).resample(8000).speed_change_with(1.5, config());
        assert_eq!(filter.window_frames(), 80);
        filter.set_property(Property::SampleRate, 16000.0).unwrap();
        assert_eq!(filter.sample_rate(), 16000);
        assert_eq!(filter.window_frames(), 160);
    }

    #[test]
    #[should_panic]
    fn non_positive_ratio_is_rejected() {
        tone(10, 1).speed_change(0.0);
    }
}
