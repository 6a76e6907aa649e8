//! Polyphase decomposition of the anti-aliasing filter and the process-wide filter cache.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::filter::{self, TAPS_PER_PHASE};
use crate::common::Float;

/// One branch of a polyphase filter.
pub type Phase = [Float; TAPS_PER_PHASE];

/// A FIR filter of `TAPS_PER_PHASE * up_factor` taps split into `up_factor` branches.
///
/// Branch `r` holds the taps `up_factor - r - 1`, `+ up_factor`, `+ 2 * up_factor`, ... so that
/// convolving it with the last `TAPS_PER_PHASE` input samples yields exactly the output of the
/// full filter at interpolation phase `r`, without ever touching the zero-stuffed samples.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyphaseBank {
    up_factor: u32,
    phases: Box<[Phase]>,
}

impl PolyphaseBank {
    /// Splits `taps` into `up_factor` branches.
    ///
    /// # Panics
    ///
    /// Panics if `taps.len()` is not `TAPS_PER_PHASE * up_factor`.
    pub fn new(taps: &[f64], up_factor: u32) -> PolyphaseBank {
        let up = up_factor as usize;
        assert!(up != 0, "up factor must not be zero");
        assert_eq!(
            taps.len(),
            TAPS_PER_PHASE * up,
            "filter length must be TAPS_PER_PHASE * up_factor"
        );

        let phases = (0..up)
            .map(|row| {
                let start = up - row - 1;
                std::array::from_fn(|col| taps[(start + col * up) % taps.len()] as Float)
            })
            .collect();

        PolyphaseBank { up_factor, phases }
    }

    /// Designs the filter for `(up_factor, cutoff)` and decomposes it.
    pub fn design(up_factor: u32, cutoff: f64) -> PolyphaseBank {
        PolyphaseBank::new(&filter::design(up_factor, cutoff), up_factor)
    }

    /// Returns the bank for `(up_factor, cutoff)`, building it on first use.
    ///
    /// Banks are kept for the lifetime of the process and shared by every stream, so the returned
    /// reference is `'static`. The cache lock is held only while looking up or building.
    pub fn shared(up_factor: u32, cutoff: f64) -> &'static PolyphaseBank {
        static CACHE: Mutex<BTreeMap<(u32, u64), &'static PolyphaseBank>> =
            Mutex::new(BTreeMap::new());

        // entries are only ever inserted whole, a panic while building leaves the map consistent
        let mut cache = CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        *cache
            .entry((up_factor, cutoff.to_bits()))
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                tracing::debug!(up_factor, cutoff, "building polyphase filter bank");
                let bank: &'static PolyphaseBank =
                    Box::leak(Box::new(PolyphaseBank::design(up_factor, cutoff)));
                bank
            })
    }

    /// Number of branches.
    #[inline]
    pub fn up_factor(&self) -> u32 {
        self.up_factor
    }

    /// The branch for interpolation phase `index`.
    #[inline]
    pub fn phase(&self, index: u32) -> &Phase {
        &self.phases[index as usize]
    }
}
