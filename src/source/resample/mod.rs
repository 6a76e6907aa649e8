//! Sample rate conversion with a polyphase windowed-sinc filter.
//!
//! # Quick Start
//!
//! Use the [`Source::resample`] method:
//!
//! ```rust
//! use sincstretch::buffer::SamplesBuffer;
//! use sincstretch::Source;
//!
//! let source = SamplesBuffer::new(2, 44100, vec![0i16; 4410 * 2]);
//! let mut resampled = source.resample(48000);
//! assert_eq!(resampled.sample_rate(), 48000);
//! assert_eq!(resampled.ratio(), (160, 147));
//! ```
//!
//! # How it works
//!
//! Converting from `from` Hz to `to` Hz is done by reducing `to / from` to lowest terms
//! `up / down`, conceptually upsampling by `up` (inserting zeros), low-pass filtering and keeping
//! every `down`-th sample. The low-pass cutoff is the tighter of the two Nyquist limits,
//! `min(1 / 2up, 1 / 2down)` of the upsampled rate, so neither direction aliases.
//!
//! The filter is a Kaiser-windowed sinc of [`TAPS_PER_PHASE`]` * up` taps. Because most of the
//! upsampled signal is zeros, only one of its `up` decimated branches ("phases") contributes to any
//! output sample. The filter is therefore stored as a [`PolyphaseBank`] and each output sample
//! costs one `TAPS_PER_PHASE`-tap dot product.
//!
//! Banks depend only on `(up, cutoff)`. They are built once per process and shared between every
//! converter, see [`PolyphaseBank::shared`].
//!
//! When the source already runs at the target rate samples are forwarded unchanged.

use std::time::Duration;

use crate::common::{ChannelCount, Float, Sample, SampleRate};
use crate::control::{self, Property, PropertyError};
use crate::math::{reduce_ratio, to_fixed, to_float};
use crate::source::{FrameReader, ReadError, SeekError};
use crate::Source;

mod channel;
pub mod filter;
mod polyphase;

use channel::ChannelState;

pub use filter::{KAISER_BETA, TAPS_PER_PHASE};
pub use polyphase::{Phase, PolyphaseBank};

/// Largest number of output frames converted per upstream pull.
const MAX_CHUNK_FRAMES: usize = 1024;

/// Zero frames fed through the filter once the source ends: its group delay in input samples.
const TAIL_FRAMES: usize = TAPS_PER_PHASE / 2;

/// Converts a source to another sample rate.
#[derive(Debug)]
pub struct RateConverter<S> {
    input: S,
    target_rate: SampleRate,
    resampler: Option<Resampler>,
    feed: Feed,
}

impl<S> RateConverter<S>
where
    S: Source,
{
    /// Wraps `input` without converting it yet.
    ///
    /// Until [`set_sample_rate`](Self::set_sample_rate) is called the converter outputs at the
    /// source rate and forwards samples unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the source reports zero channels or a zero sample rate.
    pub fn new(input: S) -> Self {
        assert!(input.channels() != 0, "source must have at least one channel");
        assert!(input.sample_rate() != 0, "source sample rate must not be zero");
        let target_rate = input.sample_rate();
        RateConverter {
            input,
            target_rate,
            resampler: None,
            feed: Feed::new(),
        }
    }

    /// Sets the output rate, discarding all filter state of the previous rate.
    ///
    /// # Panics
    ///
    /// Panics if `target` is zero.
    pub fn set_sample_rate(&mut self, target: SampleRate) {
        let source_rate = self.input.sample_rate();
        let (up_factor, down_factor) = reduce_ratio(source_rate, target);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            source_rate,
            target,
            up_factor,
            down_factor,
            "configuring sample rate conversion"
        );

        self.target_rate = target;
        self.resampler = (up_factor != down_factor)
            .then(|| Resampler::new(up_factor, down_factor, self.input.channels()));
    }

    /// The reduced conversion ratio as `(up_factor, down_factor)`.
    ///
    /// `(1, 1)` when samples are passed through.
    pub fn ratio(&self) -> (u32, u32) {
        self.resampler
            .as_ref()
            .map_or((1, 1), |r| (r.up_factor, r.down_factor))
    }

    /// Discards buffered input and filter history without touching the source position.
    pub fn reset(&mut self) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.feed = Feed::new();
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
}

impl<S> Clone for RateConverter<S>
where
    S: Source + Clone,
{
    /// Duplicates the source and shares the filter bank. The clone starts with empty filter
    /// history, so it is only sample identical to the original if neither has been read from.
    fn clone(&self) -> Self {
        RateConverter {
            input: self.input.clone(),
            target_rate: self.target_rate,
            resampler: self.resampler.as_ref().map(Resampler::fresh),
            feed: Feed::new(),
        }
    }
}

impl<S> Source for RateConverter<S>
where
    S: Source,
{
    #[inline]
    fn channels(&self) -> ChannelCount {
        self.input.channels()
    }

    #[inline]
    fn sample_rate(&self) -> SampleRate {
        self.target_rate
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return self.feed.forward(&mut self.input, buf);
        };
        if let Some(err) = self.feed.reader.take_error() {
            return Err(err);
        }

        let channels = resampler.states.len();
        assert!(
            buf.is_empty() || buf.len() >= channels,
            "read buffer must hold at least one frame"
        );
        let frames = buf.len() / channels;
        let mut produced = 0;
        while produced < frames {
            let chunk = (frames - produced).min(MAX_CHUNK_FRAMES);
            let out = &mut buf[produced * channels..(produced + chunk) * channels];
            match resampler.convert(&mut self.input, &mut self.feed, out) {
                Ok(converted) => {
                    produced += converted;
                    if converted < chunk {
                        break;
                    }
                }
                Err(err) if produced > 0 => {
                    self.feed.reader.defer(err);
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        if produced == 0 {
            if let Some(err) = self.feed.reader.take_error() {
                return Err(err);
            }
        }
        Ok(produced * channels)
    }

    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        self.reset();
        self.input.try_seek(pos)
    }

    fn set_property(&mut self, property: Property, value: Float) -> Result<(), PropertyError> {
        match property {
            Property::SampleRate => {
                self.set_sample_rate(control::sample_rate_value(value)?);
                Ok(())
            }
            _ => self.input.set_property(property, value),
        }
    }
}

/// Upstream bookkeeping that survives rate changes.
#[derive(Clone, Debug)]
struct Feed {
    reader: FrameReader,
    tail_frames: usize,
}

impl Feed {
    fn new() -> Self {
        Feed {
            reader: FrameReader::new(),
            tail_frames: TAIL_FRAMES,
        }
    }

    /// Passes reads through unconverted, after anything kept from an interrupted read.
    fn forward<S>(&mut self, input: &mut S, buf: &mut [Sample]) -> Result<usize, ReadError>
    where
        S: Source + ?Sized,
    {
        if let Some(err) = self.reader.take_error() {
            return Err(err);
        }
        match self.reader.take_carry(buf) {
            0 => input.read(buf),
            carried => Ok(carried),
        }
    }

    /// Fills `buf` with whole frames from `input`, padding with silence once it has ended until
    /// the filter tail is flushed. Returns the number of frames written.
    ///
    /// Returns fewer frames without padding when the source failed partway. The failure is then
    /// waiting in `reader`.
    fn pull<S>(
        &mut self,
        input: &mut S,
        buf: &mut [Sample],
        channels: usize,
    ) -> Result<usize, ReadError>
    where
        S: Source + ?Sized,
    {
        let wanted = buf.len() / channels;
        let mut frames = 0;
        if !self.reader.ended() {
            frames = self.reader.read(input, buf)?;
            if !self.reader.ended() {
                return Ok(frames);
            }
        }

        let pad = (wanted - frames).min(self.tail_frames);
        buf[frames * channels..(frames + pad) * channels].fill(0);
        self.tail_frames -= pad;
        Ok(frames + pad)
    }
}

#[derive(Debug)]
struct Resampler {
    bank: &'static PolyphaseBank,
    up_factor: u32,
    down_factor: u32,
    states: Vec<ChannelState>,
    /// Interleaved input pulled for the current chunk.
    scratch: Vec<Sample>,
    channel_in: Vec<Float>,
    channel_out: Vec<Float>,
}

impl Resampler {
    fn new(up_factor: u32, down_factor: u32, channels: ChannelCount) -> Self {
        let cutoff = f64::min(0.5 / up_factor as f64, 0.5 / down_factor as f64);
        Resampler {
            bank: PolyphaseBank::shared(up_factor, cutoff),
            up_factor,
            down_factor,
            states: vec![ChannelState::new(); channels as usize],
            scratch: Vec::new(),
            channel_in: Vec::with_capacity(MAX_CHUNK_FRAMES),
            channel_out: Vec::with_capacity(MAX_CHUNK_FRAMES),
        }
    }

    fn fresh(&self) -> Self {
        Resampler {
            bank: self.bank,
            up_factor: self.up_factor,
            down_factor: self.down_factor,
            states: vec![ChannelState::new(); self.states.len()],
            scratch: Vec::new(),
            channel_in: Vec::with_capacity(MAX_CHUNK_FRAMES),
            channel_out: Vec::with_capacity(MAX_CHUNK_FRAMES),
        }
    }

    fn reset(&mut self) {
        self.states.fill(ChannelState::new());
    }

    /// Converts one chunk into `out`, returning the frames produced. Fewer than requested at the
    /// end of the stream, or when the source failed partway and the failure waits in `feed`.
    fn convert<S>(
        &mut self,
        input: &mut S,
        feed: &mut Feed,
        out: &mut [Sample],
    ) -> Result<usize, ReadError>
    where
        S: Source + ?Sized,
    {
        let channels = self.states.len();
        let frames = out.len() / channels;
        // every channel advances in lockstep, the first one speaks for all
        let wanted = self.states[0].inputs_for_outputs(self.up_factor, self.down_factor, frames);

        self.scratch.resize(wanted * channels, 0);
        let got = feed.pull(input, &mut self.scratch, channels)?;
        let outputs = if got == wanted {
            frames
        } else {
            self.states[0].outputs_for_inputs(self.up_factor, self.down_factor, got)
        };

        self.channel_in.resize(got, 0.0);
        self.channel_out.resize(outputs, 0.0);
        for (channel, state) in self.states.iter_mut().enumerate() {
            for (value, frame) in self
                .channel_in
                .iter_mut()
                .zip(self.scratch.chunks_exact(channels))
            {
                *value = to_float(frame[channel]);
            }

            state.process(
                self.bank,
                self.down_factor,
                &self.channel_in,
                &mut self.channel_out,
            );

            for (frame, value) in out.chunks_exact_mut(channels).zip(&self.channel_out) {
                frame[channel] = to_fixed(*value);
            }
        }
        Ok(outputs)
    }
}
