//! # Plugin Parameters
//!
//! The knobs and switches the host shows for the delay. Each parameter
//! has a **unique string ID** (`#[id = "..."]`) that the host uses to
//! save and recall presets; once published, these IDs never change.
//!
//! ## No smoothers
//!
//! Unlike most nih-plug plugins, none of these parameters carry a
//! smoother. The engine reads every value once per block and keeps it for
//! the whole block; delay time, gain and invert changes are de-clicked by
//! the engine's one-block tap crossfade instead. Smoothing on top of that
//! would make the per-block snapshot disagree with itself.

use nih_plug::prelude::*;

use crate::engine::{DelayControls, MAX_DELAY_MS};

#[derive(Params)]
pub struct DelayParams {
    /// **Time**: the literal delay time, used whenever sync is off or the
    /// host hasn't reported a tempo.
    ///
    /// Range: 1 ms to 8 s (the engine's maximum). Skewed so the short,
    /// slapback end of the range gets most of the knob travel.
    #[id = "time"]
    pub time: FloatParam,

    /// **BPM Sync**: derive the delay time from the host tempo.
    #[id = "sync"]
    pub sync: BoolParam,

    /// **Divisor**: with sync on, the delay is one bar divided by
    /// `2^(divisor - 1)`. 1 = a bar, 2 = half a bar, 3 = a quarter bar...
    #[id = "div"]
    pub divisor: IntParam,

    /// **Wet/Dry**: 0% = only the input, 100% = only the delayed signal.
    #[id = "wet"]
    pub wet_dry: FloatParam,

    /// **Low Pass**: cutoff of the filter on the delayed signal.
    #[id = "lpf"]
    pub lpf: FloatParam,

    /// **Gain**: output level in dB.
    #[id = "gain"]
    pub gain: FloatParam,

    /// **Invert**: flip the polarity of the delayed signal.
    #[id = "inv"]
    pub invert: BoolParam,
}

impl DelayParams {
    /// Take the once-per-block snapshot the engine works from.
    pub fn controls(&self) -> DelayControls {
        DelayControls {
            time_ms: self.time.value(),
            sync: self.sync.value(),
            divisor: self.divisor.value(),
            wet_dry: self.wet_dry.value(),
            lpf_hz: self.lpf.value(),
            gain_db: self.gain.value(),
            invert: self.invert.value(),
        }
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        let defaults = DelayControls::default();

        Self {
            time: FloatParam::new(
                "Time",
                defaults.time_ms,
                FloatRange::Skewed {
                    min: 1.0,
                    max: MAX_DELAY_MS,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            sync: BoolParam::new("BPM Sync", defaults.sync),

            divisor: IntParam::new(
                "Divisor",
                defaults.divisor,
                IntRange::Linear { min: 1, max: 5 },
            ),

            wet_dry: FloatParam::new(
                "Wet/Dry",
                defaults.wet_dry,
                FloatRange::Linear {
                    min: 0.0,
                    max: 100.0,
                },
            )
            .with_unit(" %")
            .with_step_size(0.1),

            lpf: FloatParam::new(
                "Low Pass",
                defaults.lpf_hz,
                FloatRange::Skewed {
                    min: 20.0,
                    max: 20_000.0,
                    // Frequency perception is roughly logarithmic.
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" Hz")
            .with_step_size(1.0),

            gain: FloatParam::new(
                "Gain",
                defaults.gain_db,
                FloatRange::Linear {
                    min: -20.0,
                    max: 20.0,
                },
            )
            .with_unit(" dB")
            .with_step_size(0.1),

            invert: BoolParam::new("Invert", defaults.invert),
        }
    }
}
