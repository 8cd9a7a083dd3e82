//! # Delay Engine
//!
//! Ties the DSP primitives together into one block-processing call.
//! Per block, in this order:
//!
//! 1. Take the block's control snapshot (read once, used for the whole
//!    block).
//! 2. Work out the delay time: tempo-synced when sync is on and the host
//!    has given us a usable tempo, the literal time otherwise.
//! 3. Recompute the lowpass coefficients if the cutoff moved.
//! 4. Let the tap scheduler decide between steady and crossfading.
//! 5. Run the samples: write dry → read taps → filter → polarity →
//!    wet/dry mix → gain.
//! 6. Fold the block's tempo events into the tracker. They only affect
//!    the *next* block's delay time.
//! 7. Remember this block's controls for change detection.
//!
//! Nothing in [`DelayEngine::process_in_place`] allocates, locks or logs.

use std::num::NonZeroUsize;

use nih_plug::util;
use thiserror::Error;

#[cfg(test)]
use crate::dsp::taps::TapState;
use crate::dsp::{
    filter::BiquadLowpass,
    ring_buffer::RingBuffer,
    taps::TapScheduler,
    tempo::{TempoEvent, TempoTracker},
};

/// Longest delay the plugin supports: 8 seconds. The time parameter's
/// range must stay within this.
pub const MAX_DELAY_MS: f32 = 8000.0;

/// Why an engine could not be built.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("sample rate must be a positive, finite number of Hz (got {0})")]
    InvalidSampleRate(f32),

    #[error("maximum delay must be a positive, finite number of milliseconds (got {0})")]
    InvalidMaxDelay(f32),
}

/// The control values for one block.
///
/// The host adapter fills this in once per block from the plugin
/// parameters; the engine never looks at the parameters directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayControls {
    /// Literal delay time in milliseconds.
    pub time_ms: f32,
    /// Follow the host tempo instead of `time_ms` (when a tempo is known).
    pub sync: bool,
    /// Tempo-sync divisor exponent: 1 = one bar, 2 = half a bar, ...
    pub divisor: i32,
    /// Wet/dry balance in percent. 0 = dry only, 100 = delayed only.
    pub wet_dry: f32,
    /// Lowpass cutoff for the delayed signal in Hz.
    pub lpf_hz: f32,
    /// Output gain in dB.
    pub gain_db: f32,
    /// Flip the polarity of the delayed signal.
    pub invert: bool,
}

impl Default for DelayControls {
    fn default() -> Self {
        Self {
            time_ms: 160.0,
            sync: false,
            divisor: 3,
            wet_dry: 50.0,
            lpf_hz: 16_000.0,
            gain_db: 0.0,
            invert: false,
        }
    }
}

/// Everything that, when it changes between blocks, starts a crossfade.
///
/// Wet/dry and cutoff are deliberately absent: neither moves the read
/// position. Gain and invert are present even though they don't either,
/// so their changes also ride the one-block ramp.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ChangeKey {
    time_ms: f32,
    sync: bool,
    divisor: i32,
    gain_db: f32,
    invert: bool,
    tap_len: usize,
}

/// One channel of tempo-synced, click-free delay.
pub struct DelayEngine {
    sample_rate: f32,
    ring: RingBuffer,
    filter: BiquadLowpass,
    taps: TapScheduler,
    tempo: TempoTracker,

    /// Controls used by the previous block. `None` after activation, so
    /// the first block always counts as a change.
    previous: Option<ChangeKey>,

    /// Cutoff the filter coefficients were last computed for.
    previous_cutoff: Option<f32>,

    /// What the scheduler did during the most recent block.
    #[cfg(test)]
    last_block: TapState,
}

impl DelayEngine {
    /// Allocate an engine able to delay up to `max_delay_ms` at
    /// `sample_rate`. This is the only allocation the engine ever makes.
    pub fn new(sample_rate: f32, max_delay_ms: f32) -> Result<Self, EngineError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if !(max_delay_ms.is_finite() && max_delay_ms > 0.0) {
            return Err(EngineError::InvalidMaxDelay(max_delay_ms));
        }

        // One extra slot so that the longest delay, `floor(max * sr)`,
        // is still a valid offset (offsets must be < capacity).
        let max_samples = (max_delay_ms * sample_rate / 1000.0).floor() as usize;
        let capacity = NonZeroUsize::MIN.saturating_add(max_samples);

        Ok(Self {
            sample_rate,
            ring: RingBuffer::new(capacity),
            filter: BiquadLowpass::new(),
            taps: TapScheduler::new(),
            tempo: TempoTracker::new(),
            previous: None,
            previous_cutoff: None,
            #[cfg(test)]
            last_block: TapState::Steady,
        })
    }

    /// Return to the just-built state: silent buffer, both taps at 0,
    /// clean filter, no remembered controls. The known tempo is kept;
    /// it describes the host, not this engine's audio.
    pub fn activate(&mut self) {
        self.ring.clear();
        self.filter.reset();
        self.taps.reset();
        self.previous = None;
        self.previous_cutoff = None;
        #[cfg(test)]
        {
            self.last_block = TapState::Steady;
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Ring buffer size in samples. The longest reachable tap is one less.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Length in samples of the tap currently heard in steady state.
    pub fn active_tap(&self) -> usize {
        self.taps.active_tap()
    }

    /// Whether the most recent block was steady or crossfading.
    #[cfg(test)]
    fn last_block_state(&self) -> TapState {
        self.last_block
    }

    /// The delay time, in milliseconds, these controls produce right now.
    ///
    /// Tempo-synced when `sync` is on and the tracker holds a usable
    /// tempo; otherwise the literal time. This is also the value reported
    /// back to the host for display.
    pub fn delay_time_ms(&self, controls: &DelayControls) -> f32 {
        if controls.sync {
            if let Some(ms) = self.tempo.snapshot().synced_delay_ms(controls.divisor) {
                return ms;
            }
        }

        controls.time_ms
    }

    /// Convert a delay time to a tap length, clamped to what the ring can
    /// hold. Negative and NaN times become 0 through the saturating cast.
    fn tap_length(&self, delay_ms: f32) -> usize {
        let samples = (delay_ms * self.sample_rate / 1000.0).floor() as usize;
        samples.min(self.ring.capacity() - 1)
    }

    /// Process one block from `input` into `output`.
    ///
    /// Both slices should have the same length; if they don't, only the
    /// common prefix is processed. Returns the effective delay time.
    pub fn process<I>(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        controls: &DelayControls,
        events: I,
    ) -> f32
    where
        I: IntoIterator<Item = TempoEvent>,
    {
        debug_assert_eq!(input.len(), output.len());

        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.process_in_place(&mut output[..n], controls, events)
    }

    /// Process one block in place. Each sample's dry value is read before
    /// its output is written, so one buffer serves as input and output.
    /// Returns the effective delay time.
    pub fn process_in_place<I>(
        &mut self,
        samples: &mut [f32],
        controls: &DelayControls,
        events: I,
    ) -> f32
    where
        I: IntoIterator<Item = TempoEvent>,
    {
        let delay_ms = self.delay_time_ms(controls);

        // An empty block has no samples to ramp over. Leave the caches
        // alone so a pending change is picked up by the next real block.
        if samples.is_empty() {
            self.tempo.ingest(events);
            return delay_ms;
        }

        let tap_len = self.tap_length(delay_ms);

        if self.previous_cutoff != Some(controls.lpf_hz) {
            self.filter.set_cutoff(controls.lpf_hz, self.sample_rate);
        }

        let key = ChangeKey {
            time_ms: controls.time_ms,
            sync: controls.sync,
            divisor: controls.divisor,
            gain_db: controls.gain_db,
            invert: controls.invert,
            tap_len,
        };
        let change = (self.previous != Some(key)).then_some(tap_len);
        self.taps.begin_block(change, samples.len());
        #[cfg(test)]
        {
            self.last_block = self.taps.state();
        }

        let polarity = if controls.invert { -1.0 } else { 1.0 };
        let wet = (controls.wet_dry / 100.0).clamp(0.0, 1.0);
        let dry = 1.0 - wet;
        let gain = util::db_to_gain(controls.gain_db);

        for (i, sample) in samples.iter_mut().enumerate() {
            let input = *sample;

            self.ring.write(input);
            let delayed = self.taps.read(&self.ring, i);
            let wet_sample = polarity * self.filter.process(delayed);

            *sample = gain * (dry * input + wet * wet_sample);

            self.ring.advance();
        }

        self.taps.end_block();
        self.tempo.ingest(events);

        self.previous = Some(key);
        self.previous_cutoff = Some(controls.lpf_hz);

        delay_ms
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
