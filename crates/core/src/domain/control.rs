//! Control readings and the gain mapping applied to them
//!
//! A pot reading is a normalized position in `[0, 1]`. The tone stack maps it
//! to a gain with the inverted convention of the hardware: fully
//! counter-clockwise (0.0) is the maximum boost, fully clockwise (1.0) the
//! maximum cut, and the center detent (0.5) is flat.

use super::dsp::params::POT_CENTER;
use super::dsp::Band;
use serde::{Deserialize, Serialize};

/// Normalized control position, always within `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct PotPosition(f32);

impl PotPosition {
    pub const MIN: Self = Self(0.0);
    pub const CENTER: Self = Self(POT_CENTER);
    pub const MAX: Self = Self(1.0);

    /// Clamp a raw reading; NaN reads as the center position
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self::CENTER
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Gain in dB for a band whose range is `±max_db`
    ///
    /// `(0.5 - pot) * 2 * max_db`: strictly decreasing in the position.
    pub fn gain_db(&self, max_db: f32) -> f32 {
        (POT_CENTER - self.0) * 2.0 * max_db
    }
}

impl Default for PotPosition {
    fn default() -> Self {
        Self::CENTER
    }
}

impl From<f32> for PotPosition {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<PotPosition> for f32 {
    fn from(pot: PotPosition) -> Self {
        pot.0
    }
}

/// One reading of all three tone controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlReadings {
    pub bass: PotPosition,
    pub mid: PotPosition,
    pub treble: PotPosition,
}

impl ControlReadings {
    pub fn new(bass: f32, mid: f32, treble: f32) -> Self {
        Self {
            bass: PotPosition::new(bass),
            mid: PotPosition::new(mid),
            treble: PotPosition::new(treble),
        }
    }

    /// Reading for one band
    pub fn get(&self, band: Band) -> PotPosition {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::Treble => self.treble,
        }
    }
}

/// Producer of control readings, polled at control rate
///
/// Implementations return `Some` when there is something to apply. Returning
/// the same readings again is harmless: the setters are idempotent.
pub trait ControlSource: Send {
    fn poll(&mut self) -> Option<ControlReadings>;

    /// Short description for logs
    fn describe(&self) -> String {
        "control source".to_string()
    }
}
