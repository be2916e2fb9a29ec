//! Integration tests for the host pipeline without audio hardware
//!
//! Configuration, control sources and the capture/playback callbacks are
//! wired together exactly as `tonestack run` does, with the CPAL streams
//! replaced by direct calls to the callback bodies.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tonestack_core::domain::{
    Band, ConfigManager, ControlReadings, ControlSourceKind, ThreeBandEqualizer, TonestackConfig,
    Topology,
};
use tonestack_infra::audio::{capture_frames, render_frames, MonoBridge};
use tonestack_infra::control::{ControlLoop, FileControls, FixedControls};

fn equalizer_for(config: &TonestackConfig) -> ThreeBandEqualizer {
    ThreeBandEqualizer::with_topology(config.engine.sample_rate as f32, config.engine.topology)
}

#[tokio::test]
async fn test_config_to_stereo_output() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());

    let mut config = TonestackConfig::default();
    config.audio.output_channels = 2;
    manager.save(&config).await.unwrap();

    let config = manager.load().await;
    let mut eq = equalizer_for(&config);
    let mut control_loop = ControlLoop::new(
        eq.control(),
        Box::new(FixedControls::new(config.controls.startup)),
        config.engine.control_interval(),
    );
    control_loop.tick();

    // Stereo capture: only the left channel reaches the equalizer
    let bridge = MonoBridge::with_capacity(config.engine.buffer_size as usize * 4);
    let capture: Vec<f32> = (0..64).flat_map(|i| [i as f32 / 64.0, -1.0]).collect();
    assert_eq!(capture_frames(&capture, 2, &bridge), 0);

    let mut out = vec![0.0; 128];
    assert_eq!(render_frames(&mut out, 2, &mut eq, &bridge), 0);
    for (i, frame) in out.chunks_exact(2).enumerate() {
        assert_eq!(frame[0], i as f32 / 64.0);
        assert_eq!(frame[1], frame[0]);
    }
}

#[tokio::test]
async fn test_file_controls_drive_running_equalizer() {
    let dir = TempDir::new().unwrap();
    let pots = dir.path().join("pots.toml");
    tokio::fs::write(&pots, "bass = 0.5\nmid = 0.5\ntreble = 0.5")
        .await
        .unwrap();

    let config_path = dir.path().join("config.toml");
    let mut config = TonestackConfig::default();
    config.engine.topology = Topology::TransposedDirectForm2;
    config.controls.source = ControlSourceKind::File;
    config.controls.file = Some(pots.clone());
    config.save_to_file(&config_path).await.unwrap();

    let config = TonestackConfig::load_from_file(&config_path).await.unwrap();
    let eq = equalizer_for(&config);
    let control = eq.control();
    control.apply(&config.controls.startup);

    let source = FileControls::new(config.controls.file.clone().unwrap()).unwrap();
    let control_loop = ControlLoop::new(control.clone(), Box::new(source), Duration::from_millis(1));

    let watched = control.clone();
    let shutdown = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::fs::write(&pots, "bass = 0.0\nmid = 1.0\ntreble = 0.5")
            .await
            .unwrap();

        let boosted = Band::Bass.descriptor().design(48000.0, 15.0);
        let cut = Band::Mid.descriptor().design(48000.0, -12.0);
        for _ in 0..250 {
            if watched.coefficients(Band::Bass) == boosted && watched.coefficients(Band::Mid) == cut {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    let finished = control_loop.run_until(shutdown).await;
    assert_eq!(finished.last_applied(), Some(ControlReadings::new(0.0, 1.0, 0.5)));
    assert!((control.magnitude_db(20.0) - 15.0).abs() < 0.2);
    assert!((control.magnitude_db(800.0) + 12.0).abs() < 0.2);
}

#[test]
fn test_capture_and_playback_threads() {
    let config = TonestackConfig::default();
    let mut eq = equalizer_for(&config);
    eq.control().apply(&ControlReadings::default());

    let bridge = Arc::new(MonoBridge::with_capacity(48_000));
    let producer = Arc::clone(&bridge);
    let capture = std::thread::spawn(move || {
        let block: Vec<f32> = (0..256).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut dropped = 0;
        for _ in 0..100 {
            dropped += capture_frames(&block, 1, &producer);
        }
        dropped
    });
    assert_eq!(capture.join().unwrap(), 0);

    let mut rendered = 0;
    let mut underruns = 0;
    let mut out = vec![0.0; 512];
    while rendered < 256 * 100 {
        underruns += render_frames(&mut out, 2, &mut eq, &bridge);
        rendered += 256;
    }
    assert_eq!(underruns, 0);
    assert!(bridge.is_empty());
}
