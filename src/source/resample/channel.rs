use super::filter::TAPS_PER_PHASE;
use super::polyphase::PolyphaseBank;
use crate::common::Float;

const L: usize = TAPS_PER_PHASE;

/// Resampling state of one channel of one stream.
///
/// The input history is stored twice, at `i` and `i + L`, so the `L` most recent samples are
/// always contiguous starting at the write cursor, oldest first.
#[derive(Clone, Debug)]
pub(crate) struct ChannelState {
    buf: [Float; 2 * L],
    /// Buffered samples still needed by the filter. Negative while input must be skipped, which
    /// happens when decimating by more than `L` input samples per output sample.
    filled: isize,
    /// Write cursor, also the start of the contiguous window.
    buf_next: usize,
    /// Interpolation phase of the next output sample, `0..up_factor`.
    poly_index: u32,
}

impl ChannelState {
    pub(crate) fn new() -> Self {
        ChannelState {
            buf: [0.0; 2 * L],
            filled: 0,
            buf_next: 0,
            poly_index: 0,
        }
    }

    #[inline]
    fn push(&mut self, sample: Float) {
        self.buf[self.buf_next] = sample;
        self.buf[self.buf_next + L] = sample;
        self.buf_next = (self.buf_next + 1) % L;
        self.filled += 1;
    }

    #[inline]
    fn convolve(&self, phase: &[Float; L]) -> Float {
        let window = &self.buf[self.buf_next..self.buf_next + L];
        window.iter().zip(phase).map(|(s, t)| s * t).sum()
    }

    #[inline]
    fn advance(state: (isize, u32), up_factor: u32, down_factor: u32) -> (isize, u32) {
        let (filled, poly_index) = state;
        let poly_index = poly_index + down_factor;
        (
            filled - (poly_index / up_factor) as isize,
            poly_index % up_factor,
        )
    }

    /// Input samples that must be pushed before `outputs` samples can be produced.
    pub(crate) fn inputs_for_outputs(
        &self,
        up_factor: u32,
        down_factor: u32,
        outputs: usize,
    ) -> usize {
        let mut state = (self.filled, self.poly_index);
        let mut inputs = 0;
        for _ in 0..outputs {
            inputs += (L as isize - state.0) as usize;
            state = Self::advance((L as isize, state.1), up_factor, down_factor);
        }
        inputs
    }

    /// Output samples that `inputs` more input samples are enough for.
    pub(crate) fn outputs_for_inputs(
        &self,
        up_factor: u32,
        down_factor: u32,
        inputs: usize,
    ) -> usize {
        let mut state = (self.filled, self.poly_index);
        let mut left = inputs;
        let mut outputs = 0;
        loop {
            let needed = (L as isize - state.0) as usize;
            if needed > left {
                return outputs;
            }
            left -= needed;
            outputs += 1;
            state = Self::advance((L as isize, state.1), up_factor, down_factor);
        }
    }

    /// Runs the polyphase filter until `output` is full, then buffers the rest of `input`.
    ///
    /// `input` must hold at least `inputs_for_outputs(.., output.len())` samples, and fewer
    /// than one more output needs. All of it is consumed and the count is returned.
    pub(crate) fn process(
        &mut self,
        bank: &PolyphaseBank,
        down_factor: u32,
        input: &[Float],
        output: &mut [Float],
    ) -> usize {
        let up_factor = bank.up_factor();
        let mut consumed = 0;
        for out in output.iter_mut() {
            while self.filled < L as isize {
                self.push(input[consumed]);
                consumed += 1;
            }
            *out = self.convolve(bank.phase(self.poly_index));
            (self.filled, self.poly_index) =
                Self::advance((self.filled, self.poly_index), up_factor, down_factor);
        }
        for &sample in &input[consumed..] {
            self.push(sample);
        }
        input.len()
    }
}
