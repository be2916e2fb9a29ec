//! Digital signal processing core of the tone stack
//!
//! This module provides the three-band equalizer and the pieces it is built
//! from:
//! - `biquad`: a two-pole recursive section with two delay registers
//! - `design`: RBJ-cookbook coefficient design (low shelf, peaking, high shelf)
//! - `publish`: lock-free hand-off of coefficient sets to the audio thread
//! - `equalizer`: the bass/mid/treble cascade and its control handle
//!
//! Everything reachable from `process` is designed for:
//! - Zero allocations in the hot path
//! - No locks and no logging at audio rate
//! - Constant time per sample

pub mod biquad;
pub mod design;
pub mod equalizer;
pub mod publish;

pub use biquad::{BiquadSection, FilterCoefficients, FilterState, Topology};
pub use design::{FilterDesigner, FilterShape};
pub use equalizer::{Band, BandDescriptor, EqualizerControl, ThreeBandEqualizer};
pub use publish::CoefficientCell;

use crate::domain::audio::AudioError;

pub type Result<T> = std::result::Result<T, AudioError>;

/// Core trait for block-based audio effects
///
/// Effects process mono audio in-place on f32 buffers normalized to [-1.0, 1.0].
pub trait Effect: Send {
    /// Process a buffer of audio samples in-place
    ///
    /// # Requirements
    /// - No allocations in the hot path
    /// - Handle buffer of any size
    fn process(&mut self, buffer: &mut [f32]) -> Result<()>;

    /// Reset effect state to initial conditions
    ///
    /// Clears delay registers only; parameters are kept.
    fn reset(&mut self);

    /// Get effect name for debugging/display
    fn name(&self) -> &str;
}

/// Parameter constraints for the filter core
///
/// Design inputs are clamped to these ranges before any trigonometry runs,
/// so degenerate values never reach a `BiquadSection`.
pub mod params {
    /// Smallest Q accepted by the designer
    pub const Q_MIN: f64 = 0.05;

    /// Largest Q accepted by the designer; `+inf` lands here
    pub const Q_MAX: f64 = 100.0;

    /// Lowest center frequency accepted by the designer (Hz)
    pub const FREQ_MIN: f64 = 1.0;

    /// Highest center frequency as a fraction of the sample rate (0.5 = Nyquist)
    pub const NYQUIST_FRACTION: f64 = 0.45;

    /// Poles at or beyond this radius are treated as unstable
    pub const MAX_POLE_RADIUS: f64 = 0.9999;

    /// Bisection steps used when pulling an unstable gain back toward 0 dB
    pub const STABILITY_SEARCH_STEPS: u32 = 24;

    /// Neutral control position (0 dB)
    pub const POT_CENTER: f32 = 0.5;
}
