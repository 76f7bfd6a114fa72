//! Heading estimator (C5): integrates yaw rate from the gyroscope,
//! periodically corrected by the magnetometer via a complementary filter.
//!
//! The blend math follows the teacher's `ComplementaryFilter` in
//! `filters/complementary.rs`, generalized from that filter's fixed
//! position/velocity blend to the spec's heading-only gyro/mag fusion with
//! drift tracking.

use std::collections::VecDeque;

use crate::types::{HeadingConfig, MagSample, RotationRateSample};

const DRIFT_HISTORY_CAPACITY: usize = 10;
const CONFIDENCE_TIME_CONSTANT_S: f64 = 60.0;
const MIN_CONFIDENCE: f64 = 0.5;

pub fn normalize_angle(angle: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    ((angle % two_pi) + two_pi) % two_pi
}

/// Signed difference `a - b` in `(-pi, pi]`, "how far to turn from b to a".
pub fn shortest_angle_diff(a: f64, b: f64) -> f64 {
    let diff = normalize_angle(a - b);
    if diff > std::f64::consts::PI {
        diff - std::f64::consts::TAU
    } else {
        diff
    }
}

#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    config: HeadingConfig,
    heading_rad: f64,
    last_update_ms: Option<i64>,
    last_mag_ms: Option<i64>,
    drift_rate: f64,
    drift_history: VecDeque<f64>,
}

impl HeadingEstimator {
    pub fn new(config: HeadingConfig) -> Self {
        HeadingEstimator {
            config,
            heading_rad: 0.0,
            last_update_ms: None,
            last_mag_ms: None,
            drift_rate: 0.0,
            drift_history: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.heading_rad = 0.0;
        self.last_update_ms = None;
        self.last_mag_ms = None;
        self.drift_rate = 0.0;
        self.drift_history.clear();
    }

    pub fn heading_now(&self) -> f64 {
        self.heading_rad
    }

    /// Exponentially decays from 1.0 at the moment of last magnetometer
    /// fusion, clamped to a floor of 0.5; 1.0 if magnetometer has never
    /// fused yet and a gyro sample has just arrived is not meaningful, so
    /// callers should treat "never fused" as low confidence too.
    pub fn confidence(&self, now_ms: i64) -> f64 {
        match self.last_mag_ms {
            None => MIN_CONFIDENCE,
            Some(last) => {
                let elapsed_s = ((now_ms - last).max(0) as f64) / 1000.0;
                let decayed = (-elapsed_s / CONFIDENCE_TIME_CONSTANT_S).exp();
                decayed.max(MIN_CONFIDENCE)
            }
        }
    }

    pub fn on_gyro(&mut self, sample: &RotationRateSample) {
        let dt = match self.last_update_ms {
            Some(last) => ((sample.timestamp - last).max(0) as f64) / 1000.0,
            None => 0.0,
        };
        let omega = sample.alpha * std::f64::consts::PI / 180.0;
        self.heading_rad = normalize_angle(self.heading_rad + (omega - self.drift_rate) * dt);
        self.last_update_ms = Some(sample.timestamp);
    }

    pub fn on_mag(&mut self, sample: &MagSample) {
        if let Some(last_mag) = self.last_mag_ms {
            if sample.timestamp - last_mag < self.config.mag_interval_ms {
                return;
            }
        }

        let measured = normalize_angle(sample.my.atan2(sample.mx));
        let diff = shortest_angle_diff(self.heading_rad, measured);
        self.heading_rad =
            normalize_angle(self.heading_rad + (1.0 - self.config.alpha_gyro) * diff);

        if let Some(last_mag) = self.last_mag_ms {
            let elapsed_s = ((sample.timestamp - last_mag).max(1) as f64) / 1000.0;
            self.drift_history.push_back(diff / elapsed_s);
            if self.drift_history.len() > DRIFT_HISTORY_CAPACITY {
                self.drift_history.pop_front();
            }
            self.drift_rate =
                self.drift_history.iter().sum::<f64>() / self.drift_history.len() as f64;
        }

        self.last_mag_ms = Some(sample.timestamp);
    }
}
