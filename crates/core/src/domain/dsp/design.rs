//! RBJ-cookbook coefficient design
//!
//! Stateless functions turning (sample rate, center frequency, Q, gain in dB)
//! into normalized [`FilterCoefficients`] for low-shelf, peaking and
//! high-shelf responses. All three share:
//!
//! ```text
//! A     = 10^(gain_db / 40)
//! w0    = 2*pi*freq / sample_rate
//! alpha = sin(w0) / (2*Q)
//! ```
//!
//! and divide every term by `a0` before returning.

use super::biquad::FilterCoefficients;
use super::params::{FREQ_MIN, NYQUIST_FRACTION, Q_MAX, Q_MIN};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Response shape produced by the designer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterShape {
    LowShelf,
    Peaking,
    HighShelf,
}

impl FilterShape {
    /// Design coefficients for this shape
    pub fn design(self, sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
        match self {
            FilterShape::LowShelf => FilterDesigner::low_shelf(sample_rate, freq, q, gain_db),
            FilterShape::Peaking => FilterDesigner::peaking(sample_rate, freq, q, gain_db),
            FilterShape::HighShelf => FilterDesigner::high_shelf(sample_rate, freq, q, gain_db),
        }
    }
}

/// Intermediate terms shared by every shape
#[derive(Debug, Clone, Copy)]
struct Prewarp {
    a: f64,
    sqrt_a: f64,
    cos_w0: f64,
    alpha: f64,
}

impl Prewarp {
    /// Clamp inputs into the range where the formulas are defined
    ///
    /// Returns `None` for a sample rate that is not a positive finite number.
    fn new(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Option<Self> {
        let sample_rate = f64::from(sample_rate);
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return None;
        }

        let limit = sample_rate * NYQUIST_FRACTION;
        let freq = if freq.is_nan() { FREQ_MIN } else { f64::from(freq) };
        let freq = freq.clamp(FREQ_MIN.min(limit), limit);

        let q = if q.is_nan() { Q_MIN } else { f64::from(q).clamp(Q_MIN, Q_MAX) };
        let gain_db = if gain_db.is_finite() { f64::from(gain_db) } else { 0.0 };

        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;

        Some(Self {
            a,
            sqrt_a: a.sqrt(),
            cos_w0: w0.cos(),
            alpha: w0.sin() / (2.0 * q),
        })
    }
}

/// Divide through by `a0`
fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> FilterCoefficients {
    if !a0.is_normal() {
        return FilterCoefficients::IDENTITY;
    }
    FilterCoefficients {
        ff: b0 / a0,
        c1: b1 / a0,
        c2: b2 / a0,
        d1: a1 / a0,
        d2: a2 / a0,
    }
}

/// Stateless coefficient designer
///
/// Degenerate inputs are clamped before use: Q into `[Q_MIN, Q_MAX]` (NaN
/// becomes `Q_MIN`), the center frequency into
/// `[FREQ_MIN, NYQUIST_FRACTION * sample_rate]` (NaN becomes `FREQ_MIN`), and
/// a non-finite gain to 0 dB. An unusable sample rate yields the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterDesigner;

impl FilterDesigner {
    /// Boost or cut below `freq`
    #[must_use]
    pub fn low_shelf(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
        let Some(Prewarp { a, sqrt_a, cos_w0, alpha }) = Prewarp::new(sample_rate, freq, q, gain_db)
        else {
            return FilterCoefficients::IDENTITY;
        };
        let beta = 2.0 * sqrt_a * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + beta);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - beta);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + beta;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - beta;

        normalize(b0, b1, b2, a0, a1, a2)
    }

    /// Boost or cut above `freq`
    #[must_use]
    pub fn high_shelf(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
        let Some(Prewarp { a, sqrt_a, cos_w0, alpha }) = Prewarp::new(sample_rate, freq, q, gain_db)
        else {
            return FilterCoefficients::IDENTITY;
        };
        let beta = 2.0 * sqrt_a * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + beta);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - beta);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + beta;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - beta;

        normalize(b0, b1, b2, a0, a1, a2)
    }

    /// Bell around `freq`
    #[must_use]
    pub fn peaking(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> FilterCoefficients {
        let Some(Prewarp { a, cos_w0, alpha, .. }) = Prewarp::new(sample_rate, freq, q, gain_db)
        else {
            return FilterCoefficients::IDENTITY;
        };

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        normalize(b0, b1, b2, a0, a1, a2)
    }
}
