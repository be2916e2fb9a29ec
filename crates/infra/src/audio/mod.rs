//! Platform-specific audio hosting using CPAL
//!
//! CPAL abstracts the platform APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;
pub mod engine;
pub mod stream;

pub use cpal_backend::CpalEnumerator;
pub use engine::{AudioEngine, EngineHandle, EngineMonitor};
pub use stream::{capture_frames, render_frames, MonoBridge, StatsSnapshot, StreamStats};
