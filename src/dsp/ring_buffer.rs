//! # Ring Buffer
//!
//! The storage behind the delay: a fixed-size circular array of samples
//! with a single write cursor. Everything else (which offsets to read,
//! how to blend them) lives in the tap scheduler and the engine.
//!
//! ## Write, Read, Advance
//!
//! Each sample the engine:
//!
//! 1. Writes the dry input at the cursor.
//! 2. Reads one or two taps at `(pos - offset) mod capacity`.
//! 3. Advances the cursor, wrapping to 0 at the end.
//!
//! Because the read happens *after* the write, offset 0 returns the
//! sample that was just written and offset `L` returns the sample written
//! exactly `L` samples earlier. A tap of `L` samples is therefore a delay
//! of exactly `L` samples.
//!
//! Offsets are whole samples. Delay time changes are handled by
//! crossfading between two taps rather than by fractional reads, so no
//! interpolation is needed here.

use std::num::NonZeroUsize;

/// A pre-allocated circular sample store.
///
/// The buffer is allocated once, at engine construction, sized for the
/// longest supported delay. It never grows or shrinks while audio runs.
pub struct RingBuffer {
    /// The sample storage. Starts (and is reset to) silence.
    buffer: Vec<f32>,

    /// The next slot to be written. Always in `[0, capacity)`.
    pos: usize,
}

impl RingBuffer {
    /// Create a silent ring buffer holding `capacity` samples.
    ///
    /// `NonZeroUsize` rules out the zero-length buffer, which would make
    /// every modulo in this file a division by zero.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: vec![0.0; capacity.get()],
            pos: 0,
        }
    }

    /// Number of samples the buffer holds. The largest valid read offset
    /// is `capacity() - 1`.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Store a sample at the cursor. Does not move the cursor; call
    /// [`advance()`](Self::advance) once the sample's reads are done.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.pos] = sample;
    }

    /// Return the sample written `offset` steps before the cursor.
    ///
    /// ```text
    /// index = (pos + capacity - offset) % capacity
    /// ```
    ///
    /// Adding `capacity` before subtracting keeps the `usize` arithmetic
    /// from underflowing when `offset > pos`.
    ///
    /// Callers clamp tap lengths to `[0, capacity - 1]`; anything larger
    /// is a bug in the caller, not a runtime condition.
    #[inline]
    pub fn read_at(&self, offset: usize) -> f32 {
        let capacity = self.buffer.len();
        debug_assert!(
            offset < capacity,
            "ring buffer offset {offset} out of range (capacity {capacity})"
        );

        let index = (self.pos + capacity - offset) % capacity;
        self.buffer[index]
    }

    /// Move the cursor to the next slot, wrapping at the end.
    #[inline]
    pub fn advance(&mut self) {
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            self.pos = 0;
        }
    }

    /// Fill the buffer with silence and rewind the cursor.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
