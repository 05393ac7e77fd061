//! # DelayLayLay — An AU/VST3/CLAP Circular-Buffer Delay
//!
//! A delay effect built with [nih-plug](https://github.com/robbert-vdh/nih-plug)
//! around a single block-wise circular delay buffer. The host hands us a
//! buffer of samples a few hundred times a second; each block is mixed
//! into a rolling per-channel history with a fixed feedback gain, and the
//! history that is about to be overwritten is read back into the output
//! as the echo.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──►(+)◄── history at write head (the echo, one buffer late)
//!           │
//!           ├───────────────────────────────────────────────► Output
//!           │
//!           └──► × 0.8 ──►(+)──► [Circular Delay Buffer]
//!                          ▲              │
//!                          │              │ × 0.8 (old content decays
//!                          └──────────────┘  each pass of the write head)
//! ```
//!
//! There are no user-facing parameters: no automation, no tempo sync, no
//! state to persist. The feedback gain is a fixed constant
//! ([`dsp::delay_engine::FEEDBACK_GAIN`]) and the buffer size is derived
//! from the host's audio configuration at initialize time.

mod dsp;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::delay_engine::DelayEngine;
use nih_plug::prelude::*;

/// The main plugin struct.
///
/// Holds the audio-rate state that persists between calls to `process()`.
/// All of it lives in the [`DelayEngine`]: the circular buffer rows and
/// the shared write position. The engine is owned exclusively by the
/// audio thread and only touched from the lifecycle hooks below, which
/// the host guarantees never overlap.
struct DelayLayLay {
    /// Shared reference to the (empty) parameter set. nih-plug still
    /// needs a `Params` object to derive the plugin's state payload,
    /// which for us is empty: there is nothing to automate or save.
    params: Arc<DelayLayLayParams>,

    /// The circular delay buffer and its write cursor. Allocated in
    /// `initialize()`, freed in `deactivate()`.
    engine: DelayEngine,
}

/// No parameters. The derive still generates the (empty) host-facing
/// parameter registration and state serialization.
#[derive(Default, Params)]
struct DelayLayLayParams {}

impl Default for DelayLayLay {
    fn default() -> Self {
        Self {
            params: Arc::new(DelayLayLayParams::default()),
            // Unprepared until the host calls initialize() with the real
            // sample rate, block size, and channel count.
            engine: DelayEngine::new(),
        }
    }
}

impl Plugin for DelayLayLay {
    const NAME: &'static str = "DelayLayLay";
    const VENDOR: &'static str = "LayLay Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Supported audio channel layouts. Mono or stereo only, and the
    // input layout must match the output layout — the host picks the
    // first entry that fits the track.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        // Stereo layout
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        // Mono fallback
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    // This is a pure audio effect; no MIDI in or out.
    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called when the plugin is loaded and again whenever the audio
    /// configuration changes (sample rate, maximum block size, channel
    /// count). This is the only place the delay buffer is allocated:
    /// `process()` must never touch the allocator, and the
    /// `assert_process_allocs` feature enforces that in debug builds.
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

        self.engine.prepare(
            f64::from(buffer_config.sample_rate),
            buffer_config.max_buffer_size,
            num_channels,
        );
        // The write path alone only maintains the history buffer; the
        // read-back is what makes the delay audible.
        self.engine.set_echo_enabled(true);

        nih_log!(
            "prepared delay buffer: {} channels x {} samples ({} Hz, {}-sample blocks)",
            num_channels,
            self.engine.delay_buffer_len(),
            buffer_config.sample_rate,
            buffer_config.max_buffer_size,
        );

        true
    }

    /// Called when playback stops or the plugin is bypassed. Clears the
    /// delay history (without reallocating) so stale echoes don't bleed
    /// into the next playback session.
    fn reset(&mut self) {
        self.engine.clear();
    }

    /// The audio callback. The engine mutates the buffer in place:
    /// the echo is summed into each channel and the result is folded
    /// back into the circular history. Real-time safe; the engine does
    /// no allocation, locking, or I/O on this path.
    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let num_input_channels = buffer.channels();
        self.engine.process_block(buffer.as_slice(), num_input_channels);

        ProcessStatus::Normal
    }

    /// Counterpart to `initialize()`: frees the delay buffer between
    /// playback sessions. The host won't call `process()` again until
    /// after the next `initialize()`.
    fn deactivate(&mut self) {
        self.engine.release();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────
//
// These traits tell nih-plug how to package the plugin for different
// plugin formats. We support both CLAP and VST3.

impl ClapPlugin for DelayLayLay {
    // A reverse-domain-notation ID, unique to this plugin.
    const CLAP_ID: &'static str = "com.laylay-audio.delaylaylay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A fixed-feedback circular-buffer delay effect");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for DelayLayLay {
    // A 16-byte class ID that must be globally unique across all VST3
    // plugins. The `*b"..."` syntax turns a 16-character ASCII string
    // literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"DelayLayLayv0001";

    // Categorized as a delay effect in the host's plugin browser.
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// These macros generate the C-compatible entry points that a host DAW
// uses to discover and load the plugin. nih_export_clap! exports the
// `clap_entry` symbol for CLAP hosts, nih_export_vst3! exports
// `GetPluginFactory` for VST3 hosts, and clap_wrapper re-exports the
// CLAP entry point as an AUv2 component so Logic Pro can load it.

nih_export_clap!(DelayLayLay);
nih_export_vst3!(DelayLayLay);

clap_wrapper::export_auv2!();
