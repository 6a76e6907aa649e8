//! A simple source of samples coming from a buffer.
//!
//! The `SamplesBuffer` struct can be used to treat a list of values as a `Source`.
//!
//! # Example
//!
//! ```
//! use sincstretch::buffer::SamplesBuffer;
//! let _ = SamplesBuffer::new(1, 44100, vec![1i16, 2, 3, 4, 5, 6]);
//! ```
//!

use std::sync::Arc;
use std::time::Duration;

use crate::common::{ChannelCount, Sample, SampleRate};
use crate::source::{ReadError, SeekError};
use crate::Source;

/// A buffer of interleaved samples treated as a source.
///
/// Cloning is cheap: clones share the samples and keep their own read position.
#[derive(Debug, Clone)]
pub struct SamplesBuffer {
    data: Arc<[Sample]>,
    pos: usize,
    channels: ChannelCount,
    sample_rate: SampleRate,
}

impl SamplesBuffer {
    /// Builds a new `SamplesBuffer`.
    ///
    /// # Panic
    ///
    /// - Panics if the number of channels is zero.
    /// - Panics if the sample rate is zero.
    /// - Panics if the length of the buffer is not a whole number of frames.
    pub fn new<D>(channels: ChannelCount, sample_rate: SampleRate, data: D) -> SamplesBuffer
    where
        D: Into<Vec<Sample>>,
    {
        assert!(channels != 0);
        assert!(sample_rate != 0);

        let data: Vec<Sample> = data.into();
        assert!(
            data.len() % channels as usize == 0,
            "buffer must hold whole frames"
        );

        SamplesBuffer {
            data: data.into(),
            pos: 0,
            channels,
            sample_rate,
        }
    }

    /// Number of frames in the buffer.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    /// Total duration of the buffer.
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

impl Source for SamplesBuffer {
    #[inline]
    fn channels(&self) -> ChannelCount {
        self.channels
    }

    #[inline]
    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        let remaining = &self.data[self.pos..];
        let len = buf.len().min(remaining.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.pos += len;
        Ok(len)
    }

    // all the samples are in memory already and due to the constant sample_rate we can jump to
    // the right frame directly
    //
    /// This jumps in memory till the frame for `pos`, saturating at the end of the buffer.
    #[inline]
    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        let frame = (pos.as_secs_f64() * self.sample_rate as f64) as usize;
        let frame = frame.min(self.frames());
        self.pos = frame * self.channels as usize;
        Ok(Duration::from_secs_f64(
            frame as f64 / self.sample_rate as f64,
        ))
    }
}
