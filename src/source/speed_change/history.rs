use crate::common::Float;

/// Buffered input of one channel and the two splice cursors reading from it.
///
/// `last` is where the audio played so far continues, `correlated` is where the current window
/// fades to. Both index into `data`, which only holds input that may still be referenced.
#[derive(Clone, Debug, Default)]
pub(crate) struct History {
    pub(crate) data: Vec<Float>,
    pub(crate) correlated: usize,
    pub(crate) last: usize,
}

impl History {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        History {
            data: Vec::with_capacity(capacity),
            correlated: 0,
            last: 0,
        }
    }

    /// Sample at `index`, silence past the end of the buffered input.
    #[inline]
    pub(crate) fn at(&self, index: usize) -> Float {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.correlated = 0;
        self.last = 0;
    }

    /// Drops the oldest `frames` samples, at most all of them, shifting both cursors.
    pub(crate) fn compact(&mut self, frames: usize) {
        let frames = frames.min(self.data.len());
        self.data.drain(..frames);
        self.correlated = self.correlated.saturating_sub(frames);
        self.last = self.last.saturating_sub(frames);
    }

    /// Searches `candidates` offsets from `start` for the stretch of `pattern` samples closest to
    /// the audio continuing at `last`, by sum of absolute differences. Ties go to the smallest
    /// offset.
    ///
    /// Both ranges must be buffered.
    pub(crate) fn best_offset(&self, start: usize, candidates: usize, pattern: usize) -> usize {
        let target = &self.data[self.last..self.last + pattern];
        let mut best = (0, Float::INFINITY);
        for offset in 0..candidates {
            let candidate = &self.data[start + offset..start + offset + pattern];
            let distance: Float = candidate
                .iter()
                .zip(target)
                .map(|(a, b)| (a - b).abs())
                .sum();
            if distance < best.1 {
                best = (offset, distance);
            }
        }
        best.0
    }
}
