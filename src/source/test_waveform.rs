//! Deterministic sine generator for testing other sources.
//!
//! # Example
//!
//! ```
//! use sincstretch::source::SineWave;
//! use sincstretch::Source;
//!
//! let mut tone = SineWave::new(48000, 440.0).with_amplitude(0.5).with_channels(2);
//! let mut buf = [0i16; 64];
//! assert_eq!(tone.read(&mut buf)?, 64);
//! # Ok::<(), sincstretch::source::ReadError>(())
//! ```
use std::f64::consts::TAU;
use std::time::Duration;

use crate::common::{ChannelCount, Float, Sample, SampleRate};
use crate::math::to_fixed;
use crate::source::{ReadError, SeekError};
use crate::Source;

/// An endless sine wave, identical on every channel.
#[derive(Clone, Debug)]
pub struct SineWave {
    sample_rate: SampleRate,
    channels: ChannelCount,
    frequency: f64,
    amplitude: f64,
    frame: u64,
}

impl SineWave {
    /// A full scale mono sine of `frequency` Hz.
    ///
    /// # Panics
    ///
    /// Panics if the sample rate is zero.
    pub fn new(sample_rate: SampleRate, frequency: f64) -> SineWave {
        assert!(sample_rate != 0);
        SineWave {
            sample_rate,
            channels: 1,
            frequency,
            amplitude: 1.0,
            frame: 0,
        }
    }

    /// Sets the peak amplitude, relative to full scale.
    pub fn with_amplitude(mut self, amplitude: f64) -> SineWave {
        self.amplitude = amplitude;
        self
    }

    /// Sets the number of channels.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero.
    pub fn with_channels(mut self, channels: ChannelCount) -> SineWave {
        assert!(channels != 0);
        self.channels = channels;
        self
    }

    fn value_at(&self, frame: u64) -> Sample {
        let t = frame as f64 / self.sample_rate as f64;
        to_fixed((self.amplitude * (TAU * self.frequency * t).sin()) as Float)
    }
}

impl Source for SineWave {
    #[inline]
    fn channels(&self) -> ChannelCount {
        self.channels
    }

    #[inline]
    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        let channels = self.channels as usize;
        let frames = buf.len() / channels;
        for frame in buf[..frames * channels].chunks_exact_mut(channels) {
            frame.fill(self.value_at(self.frame));
            self.frame += 1;
        }
        Ok(frames * channels)
    }

    #[inline]
    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        self.frame = (pos.as_secs_f64() * self.sample_rate as f64) as u64;
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_period() {
        let mut wf = SineWave::new(2000, 500.0).with_amplitude(0.5);
        let mut buf = [0; 4];
        wf.read(&mut buf).unwrap();
        assert_eq!(buf, [0, 16384, 0, -16384]);
    }

    #[test]
    fn channels_carry_the_same_sample() {
        let mut wf = SineWave::new(48000, 1000.0).with_channels(3);
        let mut buf = [0; 30];
        assert_eq!(wf.read(&mut buf).unwrap(), 30);
        for frame in buf.chunks_exact(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[1], frame[2]);
        }
    }

    #[test]
    fn seek_restarts_phase() {
        let mut wf = SineWave::new(8000, 440.0);
        let mut first = [0; 16];
        wf.read(&mut first).unwrap();
        wf.try_seek(Duration::ZERO).unwrap();
        let mut again = [0; 16];
        wf.read(&mut again).unwrap();
        assert_eq!(first, again);
    }
}
