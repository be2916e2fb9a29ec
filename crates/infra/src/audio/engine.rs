//! Audio engine: one capture stream feeding one playback stream
//!
//! The engine owns the equalizer's audio side once started; the caller keeps
//! an [`EqualizerControl`] for the control side.

use super::cpal_backend::{device_name, CpalEnumerator};
use super::stream::{
    build_capture_stream, build_playback_stream, MonoBridge, StatsSnapshot, StreamStats,
};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use std::sync::Arc;
use tonestack_core::domain::audio::{AudioError, Result};
use tonestack_core::domain::{EqualizerControl, ThreeBandEqualizer, TonestackConfig};
use tracing::{info, instrument, warn};

/// Capture-to-playback queue length, in buffers
const BRIDGE_BUFFERS: usize = 4;

/// Running streams; dropping the handle stops audio
pub struct EngineHandle {
    _capture: Stream,
    _playback: Stream,
    stats: Arc<StreamStats>,
    bridge: Arc<MonoBridge>,
    control: EqualizerControl,
}

impl EngineHandle {
    pub fn control(&self) -> EqualizerControl {
        self.control.clone()
    }

    /// Watcher for the streams' overrun and underrun counters
    pub fn monitor(&self) -> EngineMonitor {
        EngineMonitor::new(Arc::clone(&self.stats), Arc::clone(&self.bridge))
    }
}

/// Reports stream glitches from outside the audio callbacks
pub struct EngineMonitor {
    stats: Arc<StreamStats>,
    bridge: Arc<MonoBridge>,
    last: StatsSnapshot,
}

impl EngineMonitor {
    pub fn new(stats: Arc<StreamStats>, bridge: Arc<MonoBridge>) -> Self {
        Self {
            stats,
            bridge,
            last: StatsSnapshot::default(),
        }
    }

    /// Log the counters if they moved since the previous check
    ///
    /// Returns the growth since that check, or `None` when nothing changed.
    pub fn check(&mut self) -> Option<StatsSnapshot> {
        let now = self.stats.snapshot();
        if now == self.last {
            return None;
        }

        let delta = StatsSnapshot {
            overruns: now.overruns - self.last.overruns,
            underruns: now.underruns - self.last.underruns,
        };
        warn!(
            overruns = delta.overruns,
            underruns = delta.underruns,
            queued = self.bridge.len(),
            capacity = self.bridge.capacity(),
            "Audio stream glitches"
        );
        self.last = now;
        Some(delta)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        info!(
            overruns = self.stats.overruns(),
            underruns = self.stats.underruns(),
            "Shutting down audio engine"
        );
    }
}

/// Capture and playback stream parameters; capture keeps the device's channel count
fn stream_configs(
    config: &TonestackConfig,
    input_channels: u16,
) -> (CpalStreamConfig, CpalStreamConfig) {
    let stream = |channels| CpalStreamConfig {
        channels,
        sample_rate: config.engine.sample_rate,
        buffer_size: cpal::BufferSize::Fixed(config.engine.buffer_size),
    };
    (stream(input_channels), stream(config.audio.output_channels))
}

pub struct AudioEngine;

impl AudioEngine {
    /// Seed the equalizer with the startup readings, then build and start
    /// both streams
    #[instrument(skip_all)]
    pub fn start(
        config: &TonestackConfig,
        equalizer: ThreeBandEqualizer,
        enumerator: &CpalEnumerator,
    ) -> Result<EngineHandle> {
        config
            .validate()
            .map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?;

        let sample_rate = config.engine.sample_rate;
        if equalizer.sample_rate() != sample_rate as f32 {
            return Err(AudioError::InvalidConfiguration(format!(
                "equalizer runs at {} Hz but the engine is configured for {} Hz",
                equalizer.sample_rate(),
                sample_rate
            )));
        }

        // Gains must be installed before any audio flows or the output is muted
        let control = equalizer.control();
        let installed = control.apply(&config.controls.startup);
        info!(
            bass_db = installed[0],
            mid_db = installed[1],
            treble_db = installed[2],
            "Startup gains applied"
        );

        let input = enumerator.input_device(config.audio.input_device.as_deref())?;
        let output = enumerator.output_device(config.audio.output_device.as_deref())?;

        let input_channels = input
            .default_input_config()
            .map(|c| c.channels())
            .map_err(|e| AudioError::UnsupportedConfiguration(e.to_string()))?;

        let buffer_size = config.engine.buffer_size;
        let (capture_config, playback_config) = stream_configs(config, input_channels);

        info!(
            input = %device_name(&input),
            output = %device_name(&output),
            sample_rate,
            buffer_size,
            topology = equalizer.topology().name(),
            "Starting audio engine"
        );

        let bridge = Arc::new(MonoBridge::with_capacity(
            buffer_size as usize * BRIDGE_BUFFERS,
        ));
        let stats = Arc::new(StreamStats::default());

        let capture = build_capture_stream(
            &input,
            &capture_config,
            Arc::clone(&bridge),
            Arc::clone(&stats),
        )?;
        let playback = build_playback_stream(
            &output,
            &playback_config,
            equalizer,
            Arc::clone(&bridge),
            Arc::clone(&stats),
        )?;

        capture
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start input stream: {}", e)))?;
        playback
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;

        Ok(EngineHandle {
            _capture: capture,
            _playback: playback,
            stats,
            bridge,
            control,
        })
    }
}
