//! Streaming sample rate conversion and pitch-preserving speed change for PCM audio.
//!
//! The crate is built around the [`Source`] trait: a pull-based stream of interleaved 16-bit
//! frames. Two filter stages consume a `Source` and are one themselves:
//!
//! - [`RateConverter`](source::RateConverter) converts to another sample rate with a polyphase
//!   Kaiser-windowed sinc filter. Create one with [`Source::resample`].
//! - [`SpeedChange`](source::SpeedChange) plays faster or slower without changing pitch, by
//!   splicing windows of the input where the waveforms line up. Create one with
//!   [`Source::speed_change`].
//!
//! ```
//! use sincstretch::buffer::SamplesBuffer;
//! use sincstretch::source::SineWave;
//! use sincstretch::Source;
//!
//! // one second of a 440 Hz tone at 22.05 kHz
//! let mut tone = SineWave::new(22050, 440.0).with_amplitude(0.25);
//! let mut samples = vec![0i16; 22050];
//! tone.read(&mut samples)?;
//!
//! let source = SamplesBuffer::new(1, 22050, samples);
//! let mut chain = source.resample(48000).speed_change(1.25);
//!
//! let mut out = vec![0i16; 4800];
//! let read = chain.read(&mut out)?;
//! assert_eq!(chain.sample_rate(), 48000);
//! assert_eq!(read, 4800);
//! # Ok::<(), sincstretch::source::ReadError>(())
//! ```
//!
//! Stages can also be configured at runtime by property name through their outermost stage, see
//! [`control`].
//!
//! # Optional Features
//!
//! - `tracing`: emits `tracing` events when filters are built and reconfigured, and when
//!   upstream reads fail.
//! - `wav_output`: adds [`wav_to_file`] and [`wav_to_writer`] for dumping a source to disk.
//! - `64bit`: filters compute in `f64` instead of `f32`.

#![cfg_attr(test, deny(missing_docs))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
#[cfg(feature = "wav_output")]
#[cfg_attr(docsrs, doc(cfg(feature = "wav_output")))]
mod wav_output;

pub mod buffer;
pub mod control;
pub mod math;
pub mod source;

pub use crate::common::{ChannelCount, Float, Sample, SampleRate};
pub use crate::source::Source;
#[cfg(feature = "wav_output")]
#[cfg_attr(docsrs, doc(cfg(feature = "wav_output")))]
pub use crate::wav_output::{wav_to_file, wav_to_writer, ToWavError};
