//! Sources of PCM audio and the filter stages built on them.
//!
//! # The `Source` contract
//!
//! A source produces interleaved fixed-point PCM. Each *frame* holds one [`Sample`] per channel,
//! in channel order, and the channel count and sample rate of a source stay fixed for its whole
//! lifetime.
//!
//! Sources are pulled: the consumer calls [`Source::read`] with a buffer and gets back how many
//! samples were written. A read of `Ok(0)` marks the end of the stream, an `Err` carries the
//! upstream failure unchanged.
//!
//! The filter stages in this module, [`RateConverter`] and [`SpeedChange`], consume a `Source` and
//! are a `Source` themselves, so they compose in any order:
//!
//! ```
//! use sincstretch::buffer::SamplesBuffer;
//! use sincstretch::Source;
//!
//! let source = SamplesBuffer::new(1, 22050, vec![1000i16; 22050]);
//! let mut chain = source.resample(44100).speed_change(1.5);
//!
//! let mut out = vec![0i16; 512];
//! let read = chain.read(&mut out)?;
//! assert!(read > 0);
//! # Ok::<(), sincstretch::source::ReadError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::common::{assert_error_traits, ChannelCount, Float, Sample, SampleRate};
use crate::control::{Property, PropertyError};

pub use self::resample::RateConverter;
pub use self::speed_change::{SpeedChange, SpeedConfig, SpeedConfigBuilder};
pub use self::test_waveform::SineWave;

pub mod resample;
pub mod speed_change;
mod test_waveform;

/// A source of interleaved fixed-point PCM frames.
pub trait Source {
    /// Returns the number of channels. Channels are always interleaved.
    fn channels(&self) -> ChannelCount;

    /// Returns the rate at which the source should be played, in frames per second.
    fn sample_rate(&self) -> SampleRate;

    /// Reads interleaved samples into `buf`, returning the number of samples written.
    ///
    /// `Ok(0)` means the stream has ended. A read may return fewer samples than requested
    /// without the stream having ended; use a [`FrameReader`] to fill a buffer completely.
    ///
    /// Filter stages only produce whole frames and panic when handed a non-empty buffer
    /// shorter than one frame. An empty buffer returns `Ok(0)` without reading.
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError>;

    /// Attempts to seek to a given position in the current source.
    ///
    /// Returns the position actually reached, which may differ from `pos` when it lies beyond
    /// the end of the stream.
    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError>;

    /// Applies a runtime property.
    ///
    /// Filter stages handle the property they own and forward every other property upstream.
    /// A plain source handles none.
    fn set_property(&mut self, property: Property, value: Float) -> Result<(), PropertyError> {
        let _ = value;
        Err(PropertyError::Unsupported(property))
    }

    /// Reads native-endian 16-bit samples into a byte buffer, returning the number of bytes
    /// written. Trailing bytes that do not make up a whole sample are left untouched.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        const WIDTH: usize = size_of::<Sample>();
        let mut samples = vec![0; buf.len() / WIDTH];
        let read = self.read(&mut samples)?;
        for (bytes, sample) in buf.chunks_exact_mut(WIDTH).zip(&samples[..read]) {
            bytes.copy_from_slice(&sample.to_ne_bytes());
        }
        Ok(read * WIDTH)
    }

    /// Converts the source to another sample rate with a polyphase windowed-sinc filter.
    ///
    /// When `target` equals the source rate samples are forwarded untouched.
    #[inline]
    fn resample(self, target: SampleRate) -> RateConverter<Self>
    where
        Self: Sized,
    {
        let mut converter = RateConverter::new(self);
        converter.set_sample_rate(target);
        converter
    }

    /// Changes the playback speed by `ratio` without changing the pitch.
    ///
    /// A ratio of `2.0` plays twice as fast, producing half as many frames.
    #[inline]
    fn speed_change(self, ratio: Float) -> SpeedChange<Self>
    where
        Self: Sized,
    {
        self.speed_change_with(ratio, SpeedConfig::default())
    }

    /// Like [`speed_change`](Source::speed_change) with explicit window settings.
    #[inline]
    fn speed_change_with(self, ratio: Float, config: SpeedConfig) -> SpeedChange<Self>
    where
        Self: Sized,
    {
        let mut filter = SpeedChange::new(self, config);
        filter.set_speed_ratio(ratio);
        filter
    }
}

impl<S> Source for Box<S>
where
    S: Source + ?Sized,
{
    #[inline]
    fn channels(&self) -> ChannelCount {
        (**self).channels()
    }

    #[inline]
    fn sample_rate(&self) -> SampleRate {
        (**self).sample_rate()
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        (**self).read(buf)
    }

    #[inline]
    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        (**self).try_seek(pos)
    }

    #[inline]
    fn set_property(&mut self, property: Property, value: Float) -> Result<(), PropertyError> {
        (**self).set_property(property, value)
    }
}

/// Pulls whole frames from an upstream source.
///
/// An upstream failure does not lose the samples read before it. The whole frames are returned,
/// the samples of an unfinished frame are kept for the next read and the error is reported by the
/// next call.
#[derive(Clone, Debug, Default)]
pub struct FrameReader {
    /// Start of a frame whose remaining samples were not delivered.
    carry: Vec<Sample>,
    error: Option<ReadError>,
    ended: bool,
}

impl FrameReader {
    /// Creates a reader positioned at the start of a stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the source has reported the end of the stream.
    #[inline]
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Makes the next [`read`](Self::read) report `error` instead of reading. An error that is
    /// already waiting is kept.
    pub fn defer(&mut self, error: ReadError) {
        self.error.get_or_insert(error);
    }

    /// Removes the error waiting to be reported, if any.
    pub fn take_error(&mut self) -> Option<ReadError> {
        self.error.take()
    }

    /// Moves kept samples of an unfinished frame into `buf`, returning how many were moved.
    pub fn take_carry(&mut self, buf: &mut [Sample]) -> usize {
        let count = self.carry.len().min(buf.len());
        buf[..count].copy_from_slice(&self.carry[..count]);
        self.carry.drain(..count);
        count
    }

    /// Forgets kept samples, waiting errors and the end of the stream. Used after a seek.
    pub fn reset(&mut self) {
        self.carry.clear();
        self.error = None;
        self.ended = false;
    }

    /// Reads from `source` until `buf` holds as many whole frames as fit, the stream ends or the
    /// source fails. Returns the number of frames written.
    ///
    /// Fewer frames than fit are returned at the end of the stream, after which
    /// [`ended`](Self::ended) is set, or when the source failed after delivering some frames.
    pub fn read<S>(&mut self, source: &mut S, buf: &mut [Sample]) -> Result<usize, ReadError>
    where
        S: Source + ?Sized,
    {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let channels = source.channels() as usize;
        let wanted = buf.len() - buf.len() % channels;
        let mut filled = self.take_carry(&mut buf[..wanted]);
        while filled < wanted && !self.ended {
            match source.read(&mut buf[filled..wanted]) {
                Ok(0) => self.ended = true,
                Ok(read) => filled += read,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("upstream read failed: {err}");
                    let whole = filled - filled % channels;
                    self.carry.extend_from_slice(&buf[whole..filled]);
                    if whole == 0 {
                        return Err(err);
                    }
                    self.error = Some(err);
                    return Ok(whole / channels);
                }
            }
        }
        Ok(filled / channels)
    }
}

/// Occurs when reading from an upstream source fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ReadError {
    message: String,
}
assert_error_traits!(ReadError);

impl ReadError {
    /// Creates a read error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message describing the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Occurs when `try_seek` fails.
#[derive(Debug, thiserror::Error, Clone)]
pub enum SeekError {
    /// One of the underlying sources does not support seeking.
    #[error("Seeking is not supported by source: {underlying_source}")]
    NotSupported {
        /// The source that did not support seek.
        underlying_source: &'static str,
    },
    /// Any other failure reported by an upstream source.
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}
assert_error_traits!(SeekError);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SamplesBuffer;

    /// Hands out at most `chunk` samples per read.
    struct Trickle {
        inner: SamplesBuffer,
        chunk: usize,
    }

    impl Source for Trickle {
        fn channels(&self) -> ChannelCount {
            self.inner.channels()
        }

        fn sample_rate(&self) -> SampleRate {
            self.inner.sample_rate()
        }

        fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
            let len = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..len])
        }

        fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
            self.inner.try_seek(pos)
        }
    }

    #[test]
    fn frame_reader_fills_across_short_reads() {
        let mut source = Trickle {
            inner: SamplesBuffer::new(2, 8000, (0..20).collect::<Vec<i16>>()),
            chunk: 3,
        };
        let mut reader = FrameReader::new();
        let mut buf = [0; 9];
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(buf[8], 0, "partial frame must not be requested");
        assert!(!reader.ended());
    }

    #[test]
    fn frame_reader_stops_at_end_of_stream() {
        let mut source = SamplesBuffer::new(1, 8000, vec![7i16; 5]);
        let mut reader = FrameReader::new();
        let mut buf = [0; 8];
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 5);
        assert!(reader.ended());
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 0);
    }

    /// Fails once after `fail_at` samples, then continues.
    struct Hiccup {
        inner: SamplesBuffer,
        delivered: usize,
        fail_at: Option<usize>,
    }

    impl Source for Hiccup {
        fn channels(&self) -> ChannelCount {
            self.inner.channels()
        }

        fn sample_rate(&self) -> SampleRate {
            self.inner.sample_rate()
        }

        fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
            let len = match self.fail_at {
                Some(at) if self.delivered == at => {
                    self.fail_at = None;
                    return Err(ReadError::new("hiccup"));
                }
                Some(at) => buf.len().min(at - self.delivered),
                None => buf.len(),
            };
            let read = self.inner.read(&mut buf[..len])?;
            self.delivered += read;
            Ok(read)
        }

        fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
            self.inner.try_seek(pos)
        }
    }

    #[test]
    fn frame_reader_keeps_samples_read_before_a_failure() {
        let mut source = Hiccup {
            inner: SamplesBuffer::new(2, 8000, (0..20).collect::<Vec<i16>>()),
            delivered: 0,
            fail_at: Some(7),
        };
        let mut reader = FrameReader::new();
        let mut buf = [0; 8];
        // three whole frames, the seventh sample is held back
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..6], &[0, 1, 2, 3, 4, 5]);
        assert_eq!(reader.read(&mut source, &mut buf), Err(ReadError::new("hiccup")));
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(&buf, &[6, 7, 8, 9, 10, 11, 12, 13]);
    }

    #[test]
    fn frame_reader_reports_immediate_failures() {
        let mut source = Hiccup {
            inner: SamplesBuffer::new(1, 8000, vec![1i16; 4]),
            delivered: 0,
            fail_at: Some(0),
        };
        let mut reader = FrameReader::new();
        let mut buf = [0; 4];
        assert!(reader.read(&mut source, &mut buf).is_err());
        assert_eq!(reader.read(&mut source, &mut buf).unwrap(), 4);
    }

    #[test]
    fn read_bytes_is_native_endian() {
        let mut source = SamplesBuffer::new(1, 8000, vec![0x0102i16, -2]);
        let mut bytes = [0u8; 5];
        assert_eq!(source.read_bytes(&mut bytes).unwrap(), 4);
        assert_eq!(&bytes[..2], &0x0102i16.to_ne_bytes());
        assert_eq!(&bytes[2..4], &(-2i16).to_ne_bytes());
    }

    #[test]
    fn plain_sources_reject_properties() {
        let mut source = SamplesBuffer::new(1, 8000, vec![0i16; 4]);
        assert_eq!(
            source.set_property(Property::Rate, 2.0),
            Err(PropertyError::Unsupported(Property::Rate))
        );
    }

    #[test]
    fn boxed_sources_forward() {
        let mut source: Box<dyn Source> = Box::new(SamplesBuffer::new(2, 8000, vec![1i16; 8]));
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 8000);
        let mut buf = [0; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 8);
    }
}
