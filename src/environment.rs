//! Environment detector (C9): classifies outdoor/indoor/unknown from
//! positioning-quality history with hysteresis.
//!
//! The pending-then-commit hysteresis gate is grounded on the
//! cooldown-gated classification in the teacher's `incident.rs`
//! (`IncidentDetector`'s `swerve_cooldown`), generalized here from a single
//! cooldown timer to a "persist before commit" transition gate. The
//! accuracy-history ring follows the bounded-`VecDeque` pattern used
//! throughout the teacher (`smoothing.rs`, `health_monitor.rs`).

use std::collections::VecDeque;

use crate::types::{EnvironmentKind, EnvironmentState};

const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub outdoor_threshold_m: f64,
    pub indoor_threshold_m: f64,
    pub gps_timeout_ms: i64,
    pub hysteresis_ms: i64,
    pub min_samples: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            outdoor_threshold_m: 30.0,
            indoor_threshold_m: 100.0,
            gps_timeout_ms: 10_000,
            hysteresis_ms: 5_000,
            min_samples: 3,
        }
    }
}

struct PendingTransition {
    kind: EnvironmentKind,
    since_ms: i64,
}

pub struct EnvironmentDetector {
    config: EnvironmentConfig,
    history: VecDeque<(f64, i64)>,
    state: EnvironmentState,
    pending: Option<PendingTransition>,
    transition_count: u32,
}

impl EnvironmentDetector {
    pub fn new(config: EnvironmentConfig, now_ms: i64) -> Self {
        EnvironmentDetector {
            config,
            history: VecDeque::new(),
            state: EnvironmentState {
                environment: EnvironmentKind::Unknown,
                confidence: 0.0,
                last_transition_ms: now_ms,
            },
            pending: None,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }

    fn request(&mut self, kind: EnvironmentKind, confidence: f64, now_ms: i64) {
        if self.state.environment == kind {
            self.pending = None;
            self.state.confidence = confidence;
            return;
        }

        match &mut self.pending {
            Some(p) if p.kind == kind => {
                if now_ms - p.since_ms >= self.config.hysteresis_ms {
                    self.state.environment = kind;
                    self.state.confidence = confidence;
                    self.state.last_transition_ms = now_ms;
                    self.transition_count += 1;
                    self.pending = None;
                }
            }
            _ => {
                self.pending = Some(PendingTransition {
                    kind,
                    since_ms: now_ms,
                });
            }
        }
    }

    /// Feeds one fix-accuracy sample (meters) at `now_ms`.
    pub fn on_fix_accuracy(&mut self, accuracy: f64, now_ms: i64) {
        self.history.push_back((accuracy, now_ms));
        if self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.evaluate(now_ms);
    }

    /// Call periodically (or before reading [`Self::state`]) so a GPS
    /// timeout with no new fixes still transitions to Indoor.
    pub fn tick(&mut self, now_ms: i64) {
        self.evaluate(now_ms);
    }

    fn evaluate(&mut self, now_ms: i64) {
        if self.history.len() < self.config.min_samples {
            return;
        }

        let last_sample_ms = self.history.back().map(|&(_, t)| t).unwrap_or(now_ms);
        if now_ms - last_sample_ms >= self.config.gps_timeout_ms {
            self.request(EnvironmentKind::Indoor, 0.9, now_ms);
            return;
        }

        let recent: Vec<f64> = self
            .history
            .iter()
            .rev()
            .take(self.config.min_samples)
            .map(|&(a, _)| a)
            .collect();
        let mu = recent.iter().sum::<f64>() / recent.len() as f64;

        if mu <= self.config.outdoor_threshold_m {
            let confidence = 1.0 - 0.3 * (mu / self.config.outdoor_threshold_m);
            self.request(EnvironmentKind::Outdoor, confidence, now_ms);
        } else if mu >= self.config.indoor_threshold_m {
            let confidence = (mu / self.config.indoor_threshold_m).min(1.0);
            self.request(EnvironmentKind::Indoor, confidence, now_ms);
        } else {
            let current = if self.state.environment == EnvironmentKind::Unknown {
                EnvironmentKind::Outdoor
            } else {
                self.state.environment
            };
            self.request(current, 0.5, now_ms);
        }
    }
}
