//! # Dual-Tap Crossfade Scheduler
//!
//! Jumping the read position of a delay line from one length to another
//! produces a discontinuity in the output: a click. Instead of moving the
//! one read head, we keep two:
//!
//! - the **active** tap, which is what you hear in steady state, and
//! - the **next** tap, which is parked on the new delay length when a
//!   parameter changes.
//!
//! For one block both are read and blended, fading the old one out and
//! the new one in. At the end of that block the roles swap and the new
//! tap becomes the active one.
//!
//! ```text
//!            block k (change flagged)          block k+1
//!   active ████████▇▇▆▆▅▅▄▄▃▃▂▂▁▁             (now idle)
//!   next   ▁▁▂▂▃▃▄▄▅▅▆▆▇▇████████  ──swap──►  ████████████ (active)
//! ```
//!
//! ## The ramp
//!
//! Over an `n`-sample block the weight of the next tap at sample `i` is
//! `(i + 1) / n`, so it hits exactly 1.0 on the last sample of the block.
//! Computing it from the index (rather than summing `1/n` each sample)
//! keeps rounding error from leaving the last weight at 0.9999.
//!
//! ## One crossfade at a time
//!
//! A change that arrives while a ramp is still in flight is dropped; the
//! in-flight ramp completes and swaps first. Since a ramp always spans
//! exactly one block and the engine ends every block it begins, this only
//! matters if a block is started without the previous one being ended.

use super::ring_buffer::RingBuffer;

/// What the scheduler is doing during the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapState {
    /// Only the active tap is read.
    Steady,
    /// Both taps are read and blended over `block_len` samples.
    Crossfading { block_len: usize },
}

/// Two delay taps and the crossfade between them.
pub struct TapScheduler {
    /// Tap lengths in samples, indexed by role: `taps[active]` is live,
    /// `taps[active ^ 1]` is the next one.
    taps: [usize; 2],

    /// Index of the active tap. The next tap is always the other one.
    active: usize,

    state: TapState,
}

impl TapScheduler {
    pub fn new() -> Self {
        Self {
            taps: [0, 0],
            active: 0,
            state: TapState::Steady,
        }
    }

    /// Both taps back to length 0, no crossfade in flight.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn active_tap(&self) -> usize {
        self.taps[self.active]
    }

    pub fn next_tap(&self) -> usize {
        self.taps[self.active ^ 1]
    }

    /// Decide what this block does.
    ///
    /// `change` carries the freshly computed tap length when any
    /// change-flagged parameter moved since the previous block. When the
    /// scheduler is steady and the block is non-empty, the length is
    /// parked on the next tap and a ramp over `block_len` samples starts
    /// at sample 0. Returns `true` if this block crossfades.
    pub fn begin_block(&mut self, change: Option<usize>, block_len: usize) -> bool {
        if let (TapState::Steady, Some(length), true) = (self.state, change, block_len > 0) {
            self.taps[self.active ^ 1] = length;
            self.state = TapState::Crossfading { block_len };
        }

        matches!(self.state, TapState::Crossfading { .. })
    }

    /// Weight of the next tap at sample `index` of the current block, or
    /// `None` when steady.
    #[inline]
    pub fn crossfade_weight(&self, index: usize) -> Option<f32> {
        match self.state {
            TapState::Steady => None,
            TapState::Crossfading { block_len } => {
                Some(((index + 1) as f32 / block_len as f32).min(1.0))
            }
        }
    }

    /// Read the delayed sample for sample `index` of the current block:
    /// the active tap alone, or both taps blended by the ramp.
    #[inline]
    pub fn read(&self, ring: &RingBuffer, index: usize) -> f32 {
        let active = ring.read_at(self.active_tap());

        match self.crossfade_weight(index) {
            None => active,
            Some(xfade) => active * (1.0 - xfade) + ring.read_at(self.next_tap()) * xfade,
        }
    }

    /// Close the block. A completed ramp swaps the roles and returns the
    /// scheduler to steady.
    pub fn end_block(&mut self) {
        if let TapState::Crossfading { .. } = self.state {
            self.active ^= 1;
            self.state = TapState::Steady;
        }
    }
}

impl Default for TapScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
