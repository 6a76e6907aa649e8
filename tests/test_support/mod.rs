#![allow(dead_code)]
/// in separate folder so its not ran as integration test
use std::time::Duration;

use sincstretch::source::{ReadError, SeekError};
use sincstretch::{ChannelCount, Sample, SampleRate, Source};

/// A source replaying a fixed list of samples, with scripted misbehaviour.
#[derive(Debug, Clone)]
pub struct TestSource {
    pub data: Vec<Sample>,
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pos: usize,
    /// Largest number of samples handed out per read.
    max_read: Option<usize>,
    /// Sample position at which reads start failing.
    fail_at: Option<usize>,
    /// Whether the source recovers after failing once.
    fail_once: bool,
    seekable: bool,
}

impl TestSource {
    pub fn new(data: Vec<Sample>) -> Self {
        Self {
            data,
            sample_rate: 1,
            channels: 1,
            pos: 0,
            max_read: None,
            fail_at: None,
            fail_once: false,
            seekable: true,
        }
    }
    pub fn silence(numb_samples: usize) -> Self {
        Self::new(vec![0; numb_samples])
    }
    pub fn ramp(numb_samples: usize) -> Self {
        Self::new((0..numb_samples).map(|n| (n % 20_000) as Sample).collect())
    }
    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }
    pub fn with_channel_count(mut self, channel_count: ChannelCount) -> Self {
        self.channels = channel_count;
        self
    }
    /// Hands out at most `samples` per read, like a decoder emitting small packets.
    pub fn with_max_read(mut self, samples: usize) -> Self {
        self.max_read = Some(samples);
        self
    }
    /// Fails every read once `samples` samples have been delivered.
    pub fn failing_at(mut self, samples: usize) -> Self {
        self.fail_at = Some(samples);
        self
    }
    /// Fails a single read once `samples` samples have been delivered, then carries on.
    pub fn failing_once_at(mut self, samples: usize) -> Self {
        self.fail_at = Some(samples);
        self.fail_once = true;
        self
    }
    pub fn unseekable(mut self) -> Self {
        self.seekable = false;
        self
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }
}

impl Source for TestSource {
    fn channels(&self) -> ChannelCount {
        self.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [Sample]) -> Result<usize, ReadError> {
        if self.fail_at.is_some_and(|at| self.pos >= at) {
            if self.fail_once {
                self.fail_at = None;
            }
            return Err(ReadError::new("scripted failure"));
        }
        let mut end = self.data.len().min(self.pos + buf.len());
        if let Some(max) = self.max_read {
            end = end.min(self.pos + max);
        }
        if let Some(at) = self.fail_at {
            end = end.min(at);
        }
        let read = end - self.pos;
        buf[..read].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(read)
    }

    fn try_seek(&mut self, pos: Duration) -> Result<Duration, SeekError> {
        if !self.seekable {
            return Err(SeekError::NotSupported {
                underlying_source: std::any::type_name::<Self>(),
            });
        }
        let frame = (pos.as_secs_f64() * self.sample_rate as f64) as usize;
        self.pos = (frame * self.channels as usize).min(self.data.len());
        Ok(pos)
    }
}

/// Reads `source` to the end, `chunk` samples at a time.
pub fn collect<S: Source>(source: &mut S, chunk: usize) -> Result<Vec<Sample>, ReadError> {
    let mut buf = vec![0; chunk];
    let mut out = Vec::new();
    loop {
        let read = source.read(&mut buf)?;
        if read == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..read]);
    }
}

/// Like [`collect`], but retries after every error. Returns the samples and the number of errors.
pub fn collect_retrying<S: Source>(source: &mut S, chunk: usize) -> (Vec<Sample>, usize) {
    let mut buf = vec![0; chunk];
    let mut out = Vec::new();
    let mut errors = 0;
    loop {
        match source.read(&mut buf) {
            Ok(0) => return (out, errors),
            Ok(read) => out.extend_from_slice(&buf[..read]),
            Err(_) => errors += 1,
        }
    }
}
