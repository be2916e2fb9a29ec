//! Two-pole recursive filter section
//!
//! A `BiquadSection` owns one set of delay registers and reads its
//! coefficients from a [`CoefficientCell`] that the control side publishes
//! into. Coefficients and state are kept in `f64`: low shelves sit at
//! `cos(w0) ≈ 0.99995` and lose most of their significant digits in `f32`.

use super::params::MAX_POLE_RADIUS;
use super::publish::CoefficientCell;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Recurrence used by a [`BiquadSection`]
///
/// Both variants use exactly two delay registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// The tone stack's original recurrence. The delay line holds past
    /// outputs only:
    ///
    /// `y = ff*x + (c1 - d1)*z1 + (c2 - d2)*z2`, then `z2 = z1; z1 = y`
    #[default]
    OutputFeedback,

    /// Canonical RBJ two-pole/two-zero section, transposed direct form II:
    ///
    /// `y = ff*x + z1; z1 = c1*x - d1*y + z2; z2 = c2*x - d2*y`
    TransposedDirectForm2,
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Topology::OutputFeedback => "output-feedback",
            Topology::TransposedDirectForm2 => "transposed-direct-form2",
        }
    }
}

/// Five recursion coefficients, normalized so the leading denominator term is 1
///
/// `ff`, `c1`, `c2` are the numerator terms (b0/a0, b1/a0, b2/a0) and
/// `d1`, `d2` the denominator terms (a1/a0, a2/a0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    pub ff: f64,
    pub c1: f64,
    pub c2: f64,
    pub d1: f64,
    pub d2: f64,
}

impl Default for FilterCoefficients {
    /// All zero: a section with default coefficients outputs silence
    fn default() -> Self {
        Self::ZERO
    }
}

impl FilterCoefficients {
    /// Mutes the section
    pub const ZERO: Self = Self {
        ff: 0.0,
        c1: 0.0,
        c2: 0.0,
        d1: 0.0,
        d2: 0.0,
    };

    /// Unity pass-through for every topology
    pub const IDENTITY: Self = Self {
        ff: 1.0,
        c1: 0.0,
        c2: 0.0,
        d1: 0.0,
        d2: 0.0,
    };

    pub fn new(ff: f64, c1: f64, c2: f64, d1: f64, d2: f64) -> Self {
        Self { ff, c1, c2, d1, d2 }
    }

    pub fn to_array(self) -> [f64; 5] {
        [self.ff, self.c1, self.c2, self.d1, self.d2]
    }

    pub fn from_array([ff, c1, c2, d1, d2]: [f64; 5]) -> Self {
        Self { ff, c1, c2, d1, d2 }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    /// Feedback polynomial `z^2 + p*z + q` realised by `topology`, as `(p, q)`
    fn feedback_polynomial(&self, topology: Topology) -> (f64, f64) {
        match topology {
            Topology::OutputFeedback => (-(self.c1 - self.d1), -(self.c2 - self.d2)),
            Topology::TransposedDirectForm2 => (self.d1, self.d2),
        }
    }

    /// Largest pole magnitude of the section when run with `topology`
    pub fn pole_radius(&self, topology: Topology) -> f64 {
        let (p, q) = self.feedback_polynomial(topology);
        let root = Complex64::new(p * p - 4.0 * q, 0.0).sqrt();
        let r1 = (-p + root) * 0.5;
        let r2 = (-p - root) * 0.5;
        r1.norm().max(r2.norm())
    }

    /// Finite coefficients with every pole strictly inside the stability margin
    pub fn is_stable(&self, topology: Topology) -> bool {
        self.is_finite() && self.pole_radius(topology) < MAX_POLE_RADIUS
    }

    /// Transfer function value at `freq` Hz for the recurrence `topology` runs
    pub fn response(&self, topology: Topology, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        match topology {
            Topology::OutputFeedback => {
                let den = Complex64::new(1.0, 0.0) - (self.c1 - self.d1) * z1 - (self.c2 - self.d2) * z2;
                Complex64::new(self.ff, 0.0) / den
            }
            Topology::TransposedDirectForm2 => {
                let num = self.ff + self.c1 * z1 + self.c2 * z2;
                let den = 1.0 + self.d1 * z1 + self.d2 * z2;
                num / den
            }
        }
    }

    /// Steady-state gain in dB for a sinusoid at `freq` Hz
    pub fn magnitude_db(&self, topology: Topology, freq: f64, sample_rate: f64) -> f64 {
        20.0 * self.response(topology, freq, sample_rate).norm().log10()
    }
}

/// Two delay registers of one section
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub z1: f64,
    pub z2: f64,
}

impl FilterState {
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// One filter section: the coefficient snapshot in use plus its delay state
///
/// Coefficient updates go through the shared cell and are picked up at the
/// start of the next `process` call, so a set is always applied whole.
/// The delay registers survive coefficient updates.
#[derive(Debug)]
pub struct BiquadSection {
    topology: Topology,
    coeffs: FilterCoefficients,
    state: FilterState,
    cell: Arc<CoefficientCell>,
    seen_version: u64,
}

impl Default for BiquadSection {
    fn default() -> Self {
        Self::new(Topology::default())
    }
}

impl BiquadSection {
    /// Create a section with zeroed state and zero (muting) coefficients
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            coeffs: FilterCoefficients::ZERO,
            state: FilterState::default(),
            cell: Arc::new(CoefficientCell::new(FilterCoefficients::ZERO)),
            seen_version: 0,
        }
    }

    /// Zero both delay registers; coefficients are left untouched
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Publish a new coefficient set
    ///
    /// No validation happens here. Callable from any thread holding a
    /// reference; the audio side sees the whole set or none of it.
    pub fn set_coefficients(&self, coeffs: FilterCoefficients) {
        self.cell.publish(coeffs);
    }

    /// Shared cell this section reads its coefficients from
    pub fn cell(&self) -> Arc<CoefficientCell> {
        Arc::clone(&self.cell)
    }

    /// Coefficients used by the most recent `process` call
    pub fn coefficients(&self) -> FilterCoefficients {
        self.coeffs
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    fn refresh(&mut self) {
        if let Some((version, coeffs)) = self.cell.try_load(self.seen_version) {
            self.seen_version = version;
            self.coeffs = coeffs;
        }
    }

    /// Compute one output sample and advance the delay registers
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.refresh();

        let x = f64::from(x);
        let c = &self.coeffs;
        let s = &mut self.state;

        let y = match self.topology {
            Topology::OutputFeedback => {
                let y = c.ff * x + (c.c1 - c.d1) * s.z1 + (c.c2 - c.d2) * s.z2;
                s.z2 = s.z1;
                s.z1 = y;
                y
            }
            Topology::TransposedDirectForm2 => {
                let y = c.ff * x + s.z1;
                s.z1 = c.c1 * x - c.d1 * y + s.z2;
                s.z2 = c.c2 * x - c.d2 * y;
                y
            }
        };

        y as f32
    }

    /// Process a buffer of samples in place
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
