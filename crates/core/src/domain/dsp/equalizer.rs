//! Bass / mid / treble tone stack
//!
//! Three [`BiquadSection`]s run in series, bass first. Band gains are set at
//! control rate through an [`EqualizerControl`] handle, which designs new
//! coefficients and publishes them to the sections' cells; the audio side
//! only ever reads.

use super::biquad::{BiquadSection, FilterCoefficients, Topology};
use super::design::FilterShape;
use super::params::STABILITY_SEARCH_STEPS;
use super::publish::CoefficientCell;
use super::{Effect, Result};
use crate::domain::control::{ControlReadings, PotPosition};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

/// One of the three tone controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

impl Band {
    /// Series order of the cascade
    pub const ALL: [Band; 3] = [Band::Bass, Band::Mid, Band::Treble];

    pub const fn index(self) -> usize {
        match self {
            Band::Bass => 0,
            Band::Mid => 1,
            Band::Treble => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::Mid => "mid",
            Band::Treble => "treble",
        }
    }

    /// Fixed filter parameters of this band
    pub const fn descriptor(self) -> BandDescriptor {
        match self {
            Band::Bass => BandDescriptor {
                shape: FilterShape::LowShelf,
                freq_hz: 80.0,
                q: 0.707,
                max_db: 15.0,
            },
            Band::Mid => BandDescriptor {
                shape: FilterShape::Peaking,
                freq_hz: 800.0,
                q: 1.0,
                max_db: 12.0,
            },
            Band::Treble => BandDescriptor {
                shape: FilterShape::HighShelf,
                freq_hz: 4000.0,
                q: 0.707,
                max_db: 15.0,
            },
        }
    }
}

/// Shape, center frequency, Q and gain range of a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandDescriptor {
    pub shape: FilterShape,
    pub freq_hz: f32,
    pub q: f32,
    pub max_db: f32,
}

impl BandDescriptor {
    pub fn gain_db(&self, pot: PotPosition) -> f32 {
        pot.gain_db(self.max_db)
    }

    pub fn design(&self, sample_rate: f32, gain_db: f32) -> FilterCoefficients {
        self.shape.design(sample_rate, self.freq_hz, self.q, gain_db)
    }
}

/// Control-rate handle to a [`ThreeBandEqualizer`]
///
/// Cheap to clone and safe to share between threads. Every setter designs a
/// full coefficient set and publishes it in one step; the audio side picks it
/// up on its next sample.
#[derive(Debug, Clone)]
pub struct EqualizerControl {
    sample_rate: f32,
    topology: Topology,
    cells: [Arc<CoefficientCell>; 3],
}

impl EqualizerControl {
    pub fn set_bass(&self, pot: f32) -> f32 {
        self.set_band(Band::Bass, PotPosition::new(pot))
    }

    pub fn set_mid(&self, pot: f32) -> f32 {
        self.set_band(Band::Mid, PotPosition::new(pot))
    }

    pub fn set_treble(&self, pot: f32) -> f32 {
        self.set_band(Band::Treble, PotPosition::new(pot))
    }

    /// Map `pot` to a gain, design the band and publish it
    ///
    /// Returns the gain actually installed, which is closer to 0 dB than the
    /// requested one when the requested design would not be stable.
    pub fn set_band(&self, band: Band, pot: PotPosition) -> f32 {
        let requested = band.descriptor().gain_db(pot);
        let (installed, coeffs) = self.stable_design(band, requested);

        if installed != requested {
            warn!(
                band = band.name(),
                requested_db = requested,
                installed_db = installed,
                "Gain clamped to keep filter stable"
            );
        }

        self.cells[band.index()].publish(coeffs);
        trace!("{} set to {:.2} dB (pot {:.3})", band.name(), installed, pot.value());
        installed
    }

    /// Apply all three readings in cascade order
    pub fn apply(&self, readings: &ControlReadings) -> [f32; 3] {
        Band::ALL.map(|band| self.set_band(band, readings.get(band)))
    }

    /// Largest gain between 0 dB and `requested` whose design is stable
    fn stable_design(&self, band: Band, requested: f32) -> (f32, FilterCoefficients) {
        let descriptor = band.descriptor();
        let coeffs = descriptor.design(self.sample_rate, requested);
        if coeffs.is_stable(self.topology) {
            return (requested, coeffs);
        }

        // 0 dB designs to a pass-through: stable for every topology
        let mut stable = (0.0, FilterCoefficients::IDENTITY);
        let mut unstable = requested;
        for _ in 0..STABILITY_SEARCH_STEPS {
            let gain = 0.5 * (stable.0 + unstable);
            let coeffs = descriptor.design(self.sample_rate, gain);
            if coeffs.is_stable(self.topology) {
                stable = (gain, coeffs);
            } else {
                unstable = gain;
            }
        }
        stable
    }

    /// Most recently published coefficients of `band`
    pub fn coefficients(&self, band: Band) -> FilterCoefficients {
        self.cells[band.index()].load()
    }

    /// Transfer function of the whole cascade at `freq` Hz
    pub fn response(&self, freq: f64) -> Complex64 {
        Band::ALL
            .iter()
            .map(|&band| {
                self.coefficients(band)
                    .response(self.topology, freq, f64::from(self.sample_rate))
            })
            .product()
    }

    pub fn magnitude_db(&self, freq: f64) -> f64 {
        20.0 * self.response(freq).norm().log10()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }
}

/// Three-band equalizer for one mono stream
///
/// Sections start with zero coefficients: the equalizer outputs silence until
/// each band has been set once. Set the initial readings before starting
/// audio.
#[derive(Debug)]
pub struct ThreeBandEqualizer {
    sample_rate: f32,
    sections: [BiquadSection; 3],
    control: EqualizerControl,
}

impl ThreeBandEqualizer {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_topology(sample_rate, Topology::default())
    }

    pub fn with_topology(sample_rate: f32, topology: Topology) -> Self {
        let sections = Band::ALL.map(|_| BiquadSection::new(topology));
        let cells = std::array::from_fn(|i| sections[i].cell());

        let mut eq = Self {
            sample_rate,
            sections,
            control: EqualizerControl {
                sample_rate,
                topology,
                cells,
            },
        };
        eq.reset();
        eq
    }

    /// Handle for the control-rate side
    pub fn control(&self) -> EqualizerControl {
        self.control.clone()
    }

    pub fn set_bass(&self, pot: f32) -> f32 {
        self.control.set_bass(pot)
    }

    pub fn set_mid(&self, pot: f32) -> f32 {
        self.control.set_mid(pot)
    }

    pub fn set_treble(&self, pot: f32) -> f32 {
        self.control.set_treble(pot)
    }

    /// Zero every section's delay registers; gains are kept
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Run one sample through bass, mid and treble in that order
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let [bass, mid, treble] = &mut self.sections;
        treble.process(mid.process(bass.process(x)))
    }

    pub fn section(&self, band: Band) -> &BiquadSection {
        &self.sections[band.index()]
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn topology(&self) -> Topology {
        self.control.topology
    }
}

impl Effect for ThreeBandEqualizer {
    fn process(&mut self, buffer: &mut [f32]) -> Result<()> {
        for sample in buffer.iter_mut() {
            *sample = ThreeBandEqualizer::process(self, *sample);
        }
        Ok(())
    }

    fn reset(&mut self) {
        ThreeBandEqualizer::reset(self);
    }

    fn name(&self) -> &str {
        "ThreeBandEqualizer"
    }
}
