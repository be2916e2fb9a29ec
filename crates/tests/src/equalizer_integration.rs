//! Integration tests for the equalizer core
//!
//! These tests drive the public API the way the host does: readings go in
//! through the control handle, samples through `process`, often from
//! different threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tonestack_core::domain::{
    Band, ControlReadings, Effect, FilterCoefficients, FilterDesigner, ThreeBandEqualizer, Topology,
};

const SAMPLE_RATE: f32 = 48000.0;

fn generate_sine_wave(frequency: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

fn designs_for(readings: ControlReadings, topology: Topology) -> [FilterCoefficients; 3] {
    let control = ThreeBandEqualizer::with_topology(SAMPLE_RATE, topology).control();
    control.apply(&readings);
    Band::ALL.map(|band| control.coefficients(band))
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_startup_order_matters() {
    let input = generate_sine_wave(440.0, 512);

    // Processing first mutes
    let mut eq = ThreeBandEqualizer::new(SAMPLE_RATE);
    let mut early = input.clone();
    Effect::process(&mut eq, &mut early).unwrap();
    assert!(early.iter().all(|&s| s == 0.0));

    // Gains first passes audio
    let mut eq = ThreeBandEqualizer::new(SAMPLE_RATE);
    eq.control().apply(&ControlReadings::default());
    let mut late = input.clone();
    Effect::process(&mut eq, &mut late).unwrap();
    assert_eq!(late, input);
}

#[test]
fn test_bass_pot_zero_reproduces_reference_design() {
    let mut eq = ThreeBandEqualizer::new(SAMPLE_RATE);
    assert_eq!(eq.set_bass(0.0), 15.0);
    eq.set_mid(0.5);
    eq.set_treble(0.5);

    let reference = FilterDesigner::low_shelf(SAMPLE_RATE, 80.0, 0.707, 15.0);
    assert_eq!(eq.control().coefficients(Band::Bass), reference);

    // Mid and treble are exact pass-throughs, so the cascade is the bass section
    let expected = [
        1.006_616_920_566_748_6,
        1.070_960_537_969_548e-4,
        -6.553_596_756_567_739e-3,
        -1.394_502_608_887_410_5e-6,
        4.266_723_010_237_644_7e-5,
    ];
    for (n, want) in expected.iter().enumerate() {
        let y = f64::from(eq.process(if n == 0 { 1.0 } else { 0.0 }));
        assert!(((y - want) / want).abs() < 1e-4, "sample {n}: {y} vs {want}");
    }
}

#[test]
fn test_block_and_sample_processing_agree() {
    let readings = ControlReadings::new(0.3, 0.8, 0.6);
    let input = generate_sine_wave(1234.0, 2048);

    let mut by_sample = ThreeBandEqualizer::new(SAMPLE_RATE);
    by_sample.control().apply(&readings);
    let expected: Vec<f32> = input.iter().map(|&x| by_sample.process(x)).collect();

    let mut by_block = ThreeBandEqualizer::new(SAMPLE_RATE);
    by_block.control().apply(&readings);
    let mut output = input.clone();
    for chunk in output.chunks_mut(100) {
        Effect::process(&mut by_block, chunk).unwrap();
    }

    assert_eq!(output, expected);
}

#[test]
fn test_reset_restarts_identically() {
    let mut eq = ThreeBandEqualizer::with_topology(SAMPLE_RATE, Topology::TransposedDirectForm2);
    eq.control().apply(&ControlReadings::new(0.0, 1.0, 0.2));
    let input = generate_sine_wave(300.0, 1000);

    let first: Vec<f32> = input.iter().map(|&x| eq.process(x)).collect();
    eq.reset();
    let second: Vec<f32> = input.iter().map(|&x| eq.process(x)).collect();
    assert_eq!(first, second);
}

// ============================================================================
// CONCURRENT CONTROL
// ============================================================================

#[test]
fn test_audio_thread_never_sees_mixed_sets() {
    let topology = Topology::TransposedDirectForm2;
    let a = ControlReadings::new(0.0, 1.0, 0.0);
    let b = ControlReadings::new(1.0, 0.0, 1.0);
    let designs_a = designs_for(a, topology);
    let designs_b = designs_for(b, topology);

    let mut eq = ThreeBandEqualizer::with_topology(SAMPLE_RATE, topology);
    let control = eq.control();
    control.apply(&a);

    let done = Arc::new(AtomicBool::new(false));
    let writer_done = Arc::clone(&done);
    let writer = std::thread::spawn(move || {
        for i in 0..5_000 {
            control.apply(if i % 2 == 0 { &b } else { &a });
        }
        writer_done.store(true, Ordering::Release);
    });

    let input = generate_sine_wave(500.0, 4800);
    let mut n = 0;
    while !done.load(Ordering::Acquire) || n < input.len() {
        let y = eq.process(input[n % input.len()]);
        assert!(y.is_finite());
        for band in Band::ALL {
            let current = eq.section(band).coefficients();
            let i = band.index();
            assert!(
                current == designs_a[i] || current == designs_b[i],
                "{band:?} saw a set that was never published: {current:?}"
            );
        }
        n += 1;
    }

    writer.join().unwrap();
}

#[test]
fn test_control_handles_are_interchangeable() {
    let mut eq = ThreeBandEqualizer::new(SAMPLE_RATE);
    let first = eq.control();
    let second = first.clone();

    first.set_bass(0.2);
    second.set_mid(0.7);
    eq.set_treble(1.0);

    eq.process(0.0);
    assert_eq!(eq.section(Band::Bass).coefficients(), second.coefficients(Band::Bass));
    assert_eq!(eq.section(Band::Mid).coefficients(), first.coefficients(Band::Mid));
    assert_eq!(
        eq.section(Band::Treble).coefficients(),
        Band::Treble.descriptor().design(SAMPLE_RATE, -15.0)
    );
}

// ============================================================================
// RESPONSE
// ============================================================================

#[test]
fn test_canonical_cascade_matches_measurement() {
    let readings = ControlReadings::new(0.2, 0.7, 0.9);
    let mut eq = ThreeBandEqualizer::with_topology(SAMPLE_RATE, Topology::TransposedDirectForm2);
    let control = eq.control();
    control.apply(&readings);

    for freq in [60.0_f32, 800.0, 6000.0] {
        eq.reset();
        let input = generate_sine_wave(freq, 48_000);
        let output: Vec<f32> = input.iter().map(|&x| eq.process(x)).collect();

        let tail = 24_000..48_000;
        let power = |s: &[f32]| s.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>();
        let measured = 10.0 * (power(&output[tail.clone()]) / power(&input[tail])).log10();
        let predicted = control.magnitude_db(f64::from(freq));
        assert!(
            (measured - predicted).abs() < 0.1,
            "{freq} Hz: measured {measured} dB, predicted {predicted} dB"
        );
    }
}
