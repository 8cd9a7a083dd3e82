//! # Loveless Sync Delay: A Tempo-Synced AU/VST3/CLAP Delay Plugin
//!
//! A delay built with [nih-plug](https://github.com/robbert-vdh/nih-plug)
//! that can follow the host tempo and change its delay time without
//! clicks. Outputs Audio Unit (AUv2), VST3, and CLAP formats from a
//! single codebase.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬─────────────────────────────────────────────── × dry ───┐
//!         │                                                         │
//!         └──► [Ring Buffer] ──► taps: active ─┐                    │
//!                                     next ────┴─► crossfade        │
//!                                                     │             │
//!                                                     ▼             │
//!                                                 [Lowpass]         │
//!                                                     │             │
//!                                              × ±1 (invert)        │
//!                                                     │             │
//!                                                     └── × wet ──►(+)── × gain ──► Output
//!
//! Host transport ──► tempo events ──► [Tempo Tracker] ──► next block's delay time
//! ```
//!
//! There is no feedback path: each input sample comes back exactly once.
//! The DSP lives in [`engine`] and [`dsp`]; this file only adapts it to
//! the host.

pub mod dsp;
pub mod engine;
mod params;

use std::num::NonZeroU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;
use dsp::tempo::{BeatUnit, TempoEvent};
use engine::{DelayControls, DelayEngine, EngineError, MAX_DELAY_MS};
use nih_plug::prelude::*;
use params::DelayParams;

/// The main plugin struct.
///
/// Parameters are shared with the host through an `Arc`; the engines are
/// owned by the audio thread alone and only touched in `initialize()`,
/// `reset()` and `process()`.
pub struct LovelessSyncDelay {
    params: Arc<DelayParams>,

    /// Set in `initialize()`; a placeholder until then.
    sample_rate: f32,

    /// One engine per channel. Each carries its own ring buffer, filter
    /// and taps, so stereo channels never bleed into each other.
    engines: Vec<DelayEngine>,

    /// The delay time, in milliseconds, the last block actually used:
    /// the Time knob, or the tempo-derived time when sync is on. Written
    /// by the audio thread once per block.
    effective_delay_ms: Arc<AtomicF32>,
}

impl Default for LovelessSyncDelay {
    fn default() -> Self {
        let params = Arc::new(DelayParams::default());
        let effective_delay_ms = Arc::new(AtomicF32::new(params.time.value()));

        Self {
            params,
            sample_rate: 44100.0,
            engines: Vec::new(),
            effective_delay_ms,
        }
    }
}

impl LovelessSyncDelay {
    /// Shared handle to the delay time in use, for editors and hosts that
    /// want to show it. Read it with `Ordering::Relaxed`.
    pub fn effective_delay(&self) -> Arc<AtomicF32> {
        self.effective_delay_ms.clone()
    }

    /// Replace the engines with `num_channels` fresh ones at `sample_rate`.
    /// On error the old engines are kept.
    fn build_engines(
        &mut self,
        num_channels: usize,
        sample_rate: f32,
    ) -> Result<(), EngineError> {
        let engines = (0..num_channels)
            .map(|_| DelayEngine::new(sample_rate, MAX_DELAY_MS))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(engine) = engines.first() {
            nih_log!(
                "{num_channels} channel(s), {} sample ring buffer each at {} Hz",
                engine.capacity(),
                engine.sample_rate()
            );
        }

        self.sample_rate = sample_rate;
        self.engines = engines;
        Ok(())
    }

    /// Run one block through every channel's engine and publish the
    /// effective delay time. Every channel computes the same value.
    fn run_block<I>(
        &mut self,
        channels: &mut [&mut [f32]],
        controls: &DelayControls,
        events: I,
    ) -> f32
    where
        I: Iterator<Item = TempoEvent> + Clone,
    {
        let mut delay_ms = controls.time_ms;
        for (engine, channel) in self.engines.iter_mut().zip(channels.iter_mut()) {
            delay_ms = engine.process_in_place(channel, controls, events.clone());
        }

        self.effective_delay_ms.store(delay_ms, Ordering::Relaxed);
        delay_ms
    }
}

/// Turn the host's transport tempo and time-signature numerator into this
/// block's tempo events.
///
/// nih-plug hands us the transport as a struct rather than an event
/// stream, so each block produces at most one tempo event and one
/// time-signature event. Fixed-size, so no allocation.
fn transport_events(
    tempo: Option<f64>,
    time_sig_numerator: Option<i32>,
) -> impl Iterator<Item = TempoEvent> + Clone {
    [
        tempo.map(|bpm| TempoEvent::Bpm(bpm as f32)),
        time_sig_numerator
            .map(|numerator| TempoEvent::BeatUnit(BeatUnit::Long(i64::from(numerator)))),
    ]
    .into_iter()
    .flatten()
}

impl Plugin for LovelessSyncDelay {
    const NAME: &'static str = "Loveless Sync Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first since most DAW tracks are stereo; mono as fallback.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Parameters are read once per block, so there's nothing to gain from
    // having the host split blocks at automation points.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate one engine per channel, sized for the longest delay at
    /// the host's sample rate. This is the only place the plugin
    /// allocates audio memory.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);

        match self.build_engines(num_channels, buffer_config.sample_rate) {
            Ok(()) => true,
            Err(err) => {
                nih_error!("Cannot initialize delay engine: {err}");
                false
            }
        }
    }

    /// Called when playback stops or the plugin is bypassed: silence the
    /// ring buffers, rewind the taps and forget the previous controls.
    fn reset(&mut self) {
        for engine in &mut self.engines {
            engine.activate();
        }
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        // One snapshot for the whole block; the engines never re-read the
        // parameters mid-block.
        let controls = self.params.controls();
        let transport = context.transport();
        let events = transport_events(transport.tempo, transport.time_sig_numerator);

        let delay_ms = self.run_block(buffer.as_slice(), &controls, events);

        // There is no feedback path, so the tail is exactly one trip
        // through the delay line. The host keeps calling process() for
        // that long after the input stops, so the last echo isn't cut off.
        ProcessStatus::Tail(calculate_delay_samples(delay_ms, self.sample_rate))
    }
}

/// Convert a delay time to a whole number of samples for the host tail,
/// never past the longest delay the engines can hold.
fn calculate_delay_samples(delay_ms: f32, sample_rate: f32) -> u32 {
    (delay_ms.min(MAX_DELAY_MS) * sample_rate / 1000.0) as u32
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for LovelessSyncDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-sync-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A tempo-synced delay with click-free time changes");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for LovelessSyncDelay {
    // `*b"..."` turns the 16-character ASCII literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssSyncDly_v01";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

nih_export_clap!(LovelessSyncDelay);
nih_export_vst3!(LovelessSyncDelay);

// AUv2 entry point for Logic Pro, generated from the CLAP export.
clap_wrapper::export_auv2!();

#[cfg(test)]
mod tests {
    use super::*;

    /// Tempo and signature become one event each; the numerator arrives
    /// in integer encoding.
    #[test]
    fn test_transport_events() {
        let events: Vec<_> = transport_events(Some(128.0), Some(3)).collect();
        assert_eq!(
            events,
            vec![
                TempoEvent::Bpm(128.0),
                TempoEvent::BeatUnit(BeatUnit::Long(3)),
            ]
        );
    }

    /// A host that reports no transport info yields no events.
    #[test]
    fn test_transport_without_tempo() {
        assert_eq!(transport_events(None, None).count(), 0);

        let events: Vec<_> = transport_events(Some(90.0), None).collect();
        assert_eq!(events, vec![TempoEvent::Bpm(90.0)]);
    }

    /// Tail lengths follow the effective delay, capped at the maximum.
    #[test]
    fn test_calculate_delay_samples() {
        assert_eq!(calculate_delay_samples(500.0, 48000.0), 24000);
        assert_eq!(calculate_delay_samples(20_000.0, 1000.0), 8000);
        assert_eq!(calculate_delay_samples(-5.0, 48000.0), 0);
    }

    /// The published delay time follows the sync switch: the Time knob
    /// while sync is off, the tempo-derived time once it's on.
    #[test]
    fn test_effective_delay_follows_sync() {
        let mut plugin = LovelessSyncDelay::default();
        plugin.build_engines(2, 1000.0).unwrap();
        let published = plugin.effective_delay();

        let literal = DelayControls {
            time_ms: 300.0,
            divisor: 1,
            ..DelayControls::default()
        };
        let synced = DelayControls {
            sync: true,
            ..literal
        };
        let mut left = [0.0; 16];
        let mut right = [0.0; 16];

        let ms = plugin.run_block(
            &mut [&mut left[..], &mut right[..]],
            &literal,
            transport_events(Some(120.0), Some(4)),
        );
        assert_eq!(ms, 300.0);
        assert_eq!(published.load(Ordering::Relaxed), 300.0);

        // One bar of 4/4 at 120 BPM.
        plugin.run_block(
            &mut [&mut left[..], &mut right[..]],
            &synced,
            transport_events(Some(120.0), Some(4)),
        );
        assert_eq!(published.load(Ordering::Relaxed), 2000.0);

        plugin.run_block(
            &mut [&mut left[..], &mut right[..]],
            &literal,
            transport_events(Some(120.0), Some(4)),
        );
        assert_eq!(published.load(Ordering::Relaxed), 300.0);
    }

    /// Without engines (before initialize) the knob value is published.
    #[test]
    fn test_effective_delay_before_initialize() {
        let mut plugin = LovelessSyncDelay::default();
        let controls = DelayControls::default();

        plugin.run_block(&mut [], &controls, transport_events(None, None));
        assert_eq!(plugin.effective_delay().load(Ordering::Relaxed), controls.time_ms);
    }

    /// A bad sample rate is rejected and the plugin keeps no engines.
    #[test]
    fn test_build_engines_rejects_bad_sample_rate() {
        let mut plugin = LovelessSyncDelay::default();
        assert_eq!(
            plugin.build_engines(2, 0.0),
            Err(EngineError::InvalidSampleRate(0.0))
        );
        assert!(plugin.engines.is_empty());
    }

    /// The events can be replayed for every channel's engine.
    #[test]
    fn test_transport_events_replay_per_channel() {
        let events = transport_events(Some(100.0), Some(6));
        assert_eq!(events.clone().count(), 2);
        assert_eq!(events.count(), 2);
    }
}
