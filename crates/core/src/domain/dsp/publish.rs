//! Lock-free hand-off of coefficient sets from the control thread to the
//! audio thread
//!
//! `CoefficientCell` is a multi-writer, single-reader sequence lock over five
//! `AtomicU64` words (the bit patterns of the `f64` coefficients). Writers
//! claim the cell with a compare-and-swap that makes the sequence odd, store
//! the words and make it even again. The reader never waits: if it sees an
//! odd sequence or the sequence moved while it was copying, it reports
//! "nothing new" and keeps using its previous set until the next sample.
//!
//! Performance characteristics:
//! - Reader is wait-free and allocation-free
//! - Writers only contend with each other (control rate)
//! - Sequence counter is cache-padded away from the payload

use super::biquad::FilterCoefficients;
use crossbeam::utils::CachePadded;
use std::fmt;
use std::sync::atomic::{fence, AtomicU64, Ordering};

/// Shared slot holding the latest published coefficient set of one section
pub struct CoefficientCell {
    /// Even = stable, odd = write in progress
    sequence: CachePadded<AtomicU64>,
    words: [AtomicU64; 5],
}

impl CoefficientCell {
    pub fn new(coeffs: FilterCoefficients) -> Self {
        let [ff, c1, c2, d1, d2] = coeffs.to_array();
        Self {
            sequence: CachePadded::new(AtomicU64::new(2)),
            words: [
                AtomicU64::new(ff.to_bits()),
                AtomicU64::new(c1.to_bits()),
                AtomicU64::new(c2.to_bits()),
                AtomicU64::new(d1.to_bits()),
                AtomicU64::new(d2.to_bits()),
            ],
        }
    }

    /// Replace the stored set as one unit
    pub fn publish(&self, coeffs: FilterCoefficients) {
        let seq = self.begin_write();

        fence(Ordering::Release);
        for (word, value) in self.words.iter().zip(coeffs.to_array()) {
            word.store(value.to_bits(), Ordering::Relaxed);
        }

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Claim the cell for writing; returns the even sequence it replaced
    fn begin_write(&self) -> u64 {
        let mut seq = self.sequence.load(Ordering::Relaxed);
        loop {
            if seq & 1 == 1 {
                std::hint::spin_loop();
                seq = self.sequence.load(Ordering::Relaxed);
                continue;
            }
            match self.sequence.compare_exchange_weak(
                seq,
                seq.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return seq,
                Err(current) => seq = current,
            }
        }
    }

    /// Single consistent read attempt
    #[inline]
    fn read(&self) -> Option<(u64, FilterCoefficients)> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let mut values = [0.0_f64; 5];
        for (value, word) in values.iter_mut().zip(self.words.iter()) {
            *value = f64::from_bits(word.load(Ordering::Relaxed));
        }

        fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        if before != after {
            return None;
        }

        Some((before, FilterCoefficients::from_array(values)))
    }

    /// Fetch the current set if it differs from version `last_seen`
    ///
    /// Wait-free. `None` means "keep what you have": either nothing new was
    /// published or a write was in flight.
    #[inline]
    pub fn try_load(&self, last_seen: u64) -> Option<(u64, FilterCoefficients)> {
        if self.sequence.load(Ordering::Relaxed) == last_seen {
            return None;
        }
        self.read().filter(|(version, _)| *version != last_seen)
    }

    /// Current set, retrying until a consistent copy is obtained
    ///
    /// Spins while a write is in progress; not for use on the audio thread.
    pub fn load(&self) -> FilterCoefficients {
        loop {
            if let Some((_, coeffs)) = self.read() {
                return coeffs;
            }
            std::hint::spin_loop();
        }
    }

    /// Sequence number of the last completed publication
    pub fn version(&self) -> u64 {
        self.sequence.load(Ordering::Acquire) & !1
    }
}

impl fmt::Debug for CoefficientCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoefficientCell")
            .field("version", &self.version())
            .finish()
    }
}
