//! PDR tracker (C6): combines the step detector, step-length estimator, and
//! heading estimator into incremental planar displacement, in meters,
//! relative to the session's local frame origin.
//!
//! Per the redesign direction on cycles in orchestration, this tracker holds
//! no back-reference to its owner (the Fusion Manager, C8); `reset_position`
//! is called on it directly by C8 rather than the tracker reaching back out.

use crate::types::{AccelSample, EngineConfig, MagSample, PdrDelta, RotationRateSample};

use super::heading::HeadingEstimator;
use super::step_detector::StepDetector;
use super::step_length::StepLengthEstimator;

const STALL_THRESHOLD_MS: i64 = 2_000;

#[derive(Debug, Clone)]
pub struct PdrTracker {
    step_detector: StepDetector,
    step_length: StepLengthEstimator,
    heading: HeadingEstimator,
    x: f64,
    y: f64,
    last_sample_ms: Option<i64>,
}

impl PdrTracker {
    pub fn new(config: &EngineConfig) -> Self {
        PdrTracker {
            step_detector: StepDetector::new(config.step_detector.clone()),
            step_length: StepLengthEstimator::new(
                config.step_length_method,
                config.pdr.user_height_cm,
            ),
            heading: HeadingEstimator::new(config.heading.clone()),
            x: 0.0,
            y: 0.0,
            last_sample_ms: None,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn heading_now(&self) -> f64 {
        self.heading.heading_now()
    }

    /// Jumps position without clearing step/heading history, used for
    /// recalibration.
    pub fn reset_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Zeroes position and all subsystem history.
    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.step_detector.reset();
        self.step_length.reset();
        self.heading.reset();
        self.last_sample_ms = None;
    }

    /// True once more than [`STALL_THRESHOLD_MS`] have elapsed since the
    /// last sensor sample of any kind. While stalled the Fusion Manager
    /// treats PDR as unavailable and falls back to GPS-only.
    pub fn is_stalled(&self, now_ms: i64) -> bool {
        match self.last_sample_ms {
            None => false,
            Some(last) => now_ms - last >= STALL_THRESHOLD_MS,
        }
    }

    pub fn on_gyro(&mut self, sample: &RotationRateSample) {
        self.last_sample_ms = Some(sample.timestamp);
        self.heading.on_gyro(sample);
    }

    pub fn on_mag(&mut self, sample: &MagSample) {
        self.last_sample_ms = Some(sample.timestamp);
        self.heading.on_mag(sample);
    }

    /// Feeds an accelerometer sample to the step detector; returns a PDR
    /// delta when a step fires.
    pub fn on_accel(&mut self, sample: &AccelSample) -> Option<PdrDelta> {
        self.last_sample_ms = Some(sample.timestamp);
        let step = self.step_detector.on_sample(sample)?;

        let (a_max, a_min) = self.step_detector.window_extremes();
        let length_estimate = self.step_length.estimate(a_max, a_min);
        let heading_conf = self.heading.confidence(step.timestamp);
        let heading = self.heading.heading_now();

        let dx = length_estimate.length_m * heading.sin();
        let dy = length_estimate.length_m * heading.cos();
        self.x += dx;
        self.y += dy;

        Some(PdrDelta {
            dx,
            dy,
            step_length: length_estimate.length_m,
            heading,
            confidence: length_estimate.confidence.min(heading_conf),
            timestamp: step.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepDetectorConfig;

    fn config() -> EngineConfig {
        EngineConfig {
            step_detector: StepDetectorConfig {
                adaptive: false,
                ..StepDetectorConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn straight_north_steps_increase_y() {
        let mut tracker = PdrTracker::new(&config());
        let mut ts = 0i64;
        for _ in 0..5 {
            for &mag in &[1.0, 2.0, 1.0, 0.8] {
                ts += 50;
                if let Some(delta) = tracker.on_accel(&AccelSample {
                    ax: mag,
                    ay: 0.0,
                    az: 0.0,
                    timestamp: ts,
                }) {
                    assert!(delta.confidence >= 0.0 && delta.confidence <= 1.0);
                }
            }
            ts += 300;
        }
        let (_, y) = tracker.position();
        assert!(y >= 0.0);
    }

    #[test]
    fn reset_position_preserves_history() {
        let mut tracker = PdrTracker::new(&config());
        let mut ts = 0i64;
        for &mag in &[1.0, 2.0, 1.0, 0.8, 1.0, 2.2, 1.0] {
            ts += 50;
            tracker.on_accel(&AccelSample {
                ax: mag,
                ay: 0.0,
                az: 0.0,
                timestamp: ts,
            });
        }
        tracker.reset_position(10.0, 20.0);
        assert_eq!(tracker.position(), (10.0, 20.0));
        assert!(tracker.step_detector.step_count() > 0);
    }

    #[test]
    fn stall_detected_after_threshold() {
        let mut tracker = PdrTracker::new(&config());
        tracker.on_accel(&AccelSample {
            ax: 1.0,
            ay: 0.0,
            az: 0.0,
            timestamp: 0,
        });
        assert!(!tracker.is_stalled(1_000));
        assert!(tracker.is_stalled(2_500));
    }

    #[test]
    fn full_reset_zeroes_position_and_history() {
        let mut tracker = PdrTracker::new(&config());
        let mut ts = 0i64;
        for &mag in &[1.0, 2.0, 1.0, 0.8] {
            ts += 50;
            tracker.on_accel(&AccelSample {
                ax: mag,
                ay: 0.0,
                az: 0.0,
                timestamp: ts,
            });
        }
        tracker.reset();
        assert_eq!(tracker.position(), (0.0, 0.0));
        assert_eq!(tracker.step_detector.step_count(), 0);
    }
}
