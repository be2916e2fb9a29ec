//! Capture and playback callbacks around the equalizer
//!
//! The capture callback pushes channel 0 of every input frame into a
//! [`MonoBridge`]. The playback callback pops one sample per output frame,
//! runs it through the equalizer and copies the result to every channel.
//!
//! Both callbacks are audio-rate code:
//! - No allocations, locks or logging
//! - Overruns and underruns are only counted; the control side reports them

use cpal::traits::DeviceTrait;
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use crossbeam::queue::ArrayQueue;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonestack_core::domain::audio::{AudioError, Result};
use tonestack_core::domain::ThreeBandEqualizer;
use tracing::error;

/// Bounded lock-free queue of mono samples between the two streams
pub struct MonoBridge {
    queue: ArrayQueue<f32>,
}

impl MonoBridge {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Enqueue a sample, discarding the oldest one when full
    ///
    /// Returns `false` if a sample had to be discarded.
    #[inline]
    pub fn push(&self, sample: f32) -> bool {
        self.queue.force_push(sample).is_none()
    }

    #[inline]
    pub fn pop(&self) -> Option<f32> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Counters written by the callbacks
#[derive(Default)]
pub struct StreamStats {
    overruns: CachePadded<AtomicU64>,
    underruns: CachePadded<AtomicU64>,
}

impl StreamStats {
    /// Capture samples dropped because playback fell behind
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Output frames rendered from silence because no capture sample was ready
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            overruns: self.overruns(),
            underruns: self.underruns(),
        }
    }

    #[inline]
    pub(crate) fn record_overruns(&self, count: u64) {
        if count > 0 {
            self.overruns.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_underruns(&self, count: u64) {
        if count > 0 {
            self.underruns.fetch_add(count, Ordering::Relaxed);
        }
    }
}

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub overruns: u64,
    pub underruns: u64,
}

/// Push channel 0 of each interleaved frame; returns the number of samples dropped
#[inline]
pub fn capture_frames(data: &[f32], channels: usize, bridge: &MonoBridge) -> u64 {
    if channels == 0 {
        return 0;
    }
    let mut dropped = 0;
    for frame in data.chunks_exact(channels) {
        if !bridge.push(frame[0]) {
            dropped += 1;
        }
    }
    dropped
}

/// Fill interleaved output frames; returns the number of frames that underran
#[inline]
pub fn render_frames(
    out: &mut [f32],
    channels: usize,
    equalizer: &mut ThreeBandEqualizer,
    bridge: &MonoBridge,
) -> u64 {
    if channels == 0 {
        return 0;
    }
    let mut missing = 0;
    for frame in out.chunks_exact_mut(channels) {
        let x = bridge.pop().unwrap_or_else(|| {
            missing += 1;
            0.0
        });
        frame.fill(equalizer.process(x));
    }
    missing
}

/// Build (without starting) the capture stream
pub fn build_capture_stream(
    device: &cpal::Device,
    config: &CpalStreamConfig,
    bridge: Arc<MonoBridge>,
    stats: Arc<StreamStats>,
) -> Result<Stream> {
    let channels = usize::from(config.channels);
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                stats.record_overruns(capture_frames(data, channels, &bridge));
            },
            |err| error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build input stream: {}", e)))
}

/// Build (without starting) the playback stream; the equalizer moves into it
pub fn build_playback_stream(
    device: &cpal::Device,
    config: &CpalStreamConfig,
    mut equalizer: ThreeBandEqualizer,
    bridge: Arc<MonoBridge>,
    stats: Arc<StreamStats>,
) -> Result<Stream> {
    let channels = usize::from(config.channels);
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                stats.record_underruns(render_frames(data, channels, &mut equalizer, &bridge));
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
}
