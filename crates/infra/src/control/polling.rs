//! Fixed-period control polling

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tonestack_core::domain::{ControlReadings, ControlSource, EqualizerControl};
use tracing::{debug, info};

/// Polls a control source and feeds the equalizer
pub struct ControlLoop {
    control: EqualizerControl,
    source: Box<dyn ControlSource>,
    interval: Duration,
    last: Option<ControlReadings>,
}

impl ControlLoop {
    pub fn new(control: EqualizerControl, source: Box<dyn ControlSource>, interval: Duration) -> Self {
        Self {
            control,
            source,
            interval: interval.max(Duration::from_millis(1)),
            last: None,
        }
    }

    /// Poll once; returns the readings that were applied, if any
    pub fn tick(&mut self) -> Option<ControlReadings> {
        let readings = self.source.poll()?;

        if self.last != Some(readings) {
            debug!(
                bass = readings.bass.value(),
                mid = readings.mid.value(),
                treble = readings.treble.value(),
                "Control readings changed"
            );
        }

        self.control.apply(&readings);
        self.last = Some(readings);
        Some(readings)
    }

    /// Most recently applied readings
    pub fn last_applied(&self) -> Option<ControlReadings> {
        self.last
    }

    /// Poll until `shutdown` resolves
    pub async fn run_until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        info!(
            source = %self.source.describe(),
            interval_ms = self.interval.as_millis() as u64,
            "Control loop started"
        );

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        info!("Control loop stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::FixedControls;
    use std::collections::VecDeque;
    use tonestack_core::domain::{Band, ThreeBandEqualizer};

    /// Replays a scripted sequence of polls
    struct Scripted(VecDeque<Option<ControlReadings>>);

    impl ControlSource for Scripted {
        fn poll(&mut self) -> Option<ControlReadings> {
            self.0.pop_front().flatten()
        }
    }

    fn control() -> EqualizerControl {
        ThreeBandEqualizer::new(48000.0).control()
    }

    #[test]
    fn test_tick_applies_readings() {
        let control = control();
        let readings = ControlReadings::new(0.0, 0.5, 1.0);
        let mut control_loop = ControlLoop::new(
            control.clone(),
            Box::new(FixedControls::new(readings)),
            Duration::from_millis(1),
        );

        assert_eq!(control_loop.tick(), Some(readings));
        assert_eq!(control_loop.last_applied(), Some(readings));
        assert_eq!(
            control.coefficients(Band::Bass),
            Band::Bass.descriptor().design(48000.0, 15.0)
        );

        // Fixed readings are delivered once
        assert_eq!(control_loop.tick(), None);
        assert_eq!(control_loop.last_applied(), Some(readings));
    }

    #[test]
    fn test_empty_polls_keep_previous_gains() {
        let control = control();
        let first = ControlReadings::new(0.2, 0.2, 0.2);
        let second = ControlReadings::new(0.9, 0.9, 0.9);
        let script = VecDeque::from(vec![Some(first), None, Some(second), None]);
        let mut control_loop =
            ControlLoop::new(control.clone(), Box::new(Scripted(script)), Duration::from_millis(1));

        control_loop.tick();
        let after_first = control.coefficients(Band::Mid);
        assert_eq!(control_loop.tick(), None);
        assert_eq!(control.coefficients(Band::Mid), after_first);

        assert_eq!(control_loop.tick(), Some(second));
        assert_ne!(control.coefficients(Band::Mid), after_first);
        assert_eq!(control_loop.last_applied(), Some(second));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let control = control();
        let readings = ControlReadings::new(0.3, 0.6, 0.9);
        let control_loop = ControlLoop::new(
            control.clone(),
            Box::new(FixedControls::new(readings)),
            Duration::from_millis(1),
        );

        let finished = control_loop
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await;

        assert_eq!(finished.last_applied(), Some(readings));
        assert_eq!(
            control.coefficients(Band::Mid),
            Band::Mid.descriptor().design(48000.0, readings.mid.gain_db(12.0))
        );
    }
}
