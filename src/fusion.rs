//! Fusion Manager (C8): orchestrates the absolute-fix smoother, PDR tracker,
//! and 2D positional Kalman filter; performs anomaly gating, jump resets,
//! and soft recalibration.
//!
//! Structured after the teacher's `SensorFusion` in `sensor_fusion.rs`: a
//! config struct built once, sub-components owned directly (no shared
//! references), `feed_*` methods that mutate state and return what changed,
//! and a `get_snapshot`-style read method. Per the redesign direction on
//! orchestration cycles, the PDR tracker (C6) is owned here as a plain field
//! with no back-reference; `reset_position` is called on it directly rather
//! than C6 reaching back into its owner.

use log::{debug, info, warn};

use crate::environment::{EnvironmentConfig, EnvironmentDetector};
use crate::filters::{AbsoluteFixSmoother, PlanarKalman};
use crate::geo::LocalFrame;
use crate::pdr::PdrTracker;
use crate::types::{
    AbsoluteFix, AccelSample, EngineConfig, FusedPosition, MagSample, RotationRateSample, Source,
};

const JUMP_RESET_ANOMALY_COUNT: u32 = 2;
const SPEED_GATE_MPS: f64 = 20.0;
const DIVERGENCE_GATE_MIN_M: f64 = 30.0;
const DIVERGENCE_GATE_ACCURACY_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Running,
}

/// Whether the PDR pipeline is currently delivering deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdrState {
    Active,
    Stalled,
}

struct LastFixRecord {
    local: (f64, f64),
    timestamp: i64,
}

pub struct FusionManager {
    config: EngineConfig,
    tracking_state: TrackingState,
    pdr_state: PdrState,

    frame: Option<LocalFrame>,
    fix_smoother: AbsoluteFixSmoother,
    pdr: Option<PdrTracker>,
    planar: PlanarKalman,
    environment: Option<EnvironmentDetector>,

    last_fix: Option<LastFixRecord>,
    consecutive_anomaly_count: u32,
    gps_anomaly_count: u32,
    last_gps_anomaly_distance_m: Option<f64>,
    recalibration_count: u32,
    last_recalibration_ms: i64,
    last_fused: Option<FusedPosition>,
}

impl FusionManager {
    pub fn new(config: EngineConfig) -> Self {
        FusionManager {
            config,
            tracking_state: TrackingState::Idle,
            pdr_state: PdrState::Active,
            frame: None,
            fix_smoother: AbsoluteFixSmoother::new(),
            pdr: None,
            planar: PlanarKalman::new(1.0),
            environment: None,
            last_fix: None,
            consecutive_anomaly_count: 0,
            gps_anomaly_count: 0,
            last_gps_anomaly_distance_m: None,
            recalibration_count: 0,
            last_recalibration_ms: 0,
            last_fused: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_state == TrackingState::Running
    }

    pub fn recalibration_count(&self) -> u32 {
        self.recalibration_count
    }

    pub fn gps_anomaly_count(&self) -> u32 {
        self.gps_anomaly_count
    }

    pub fn last_recalibration_ms(&self) -> i64 {
        self.last_recalibration_ms
    }

    pub fn environment(&self) -> Option<crate::types::EnvironmentState> {
        self.environment.as_ref().map(|e| e.state())
    }

    /// Re-evaluates the environment classifier against wall-clock `now_ms`
    /// even when no new fix has arrived, so a GPS outage that outlasts
    /// `gps_timeout_ms` still transitions to Indoor. Callers drive this off
    /// their own periodic cadence (the reporter's tick, for one).
    pub fn tick_environment(&mut self, now_ms: i64) {
        if let Some(env) = &mut self.environment {
            env.tick(now_ms);
        }
    }

    /// Starts a tracking session from an initial fix. Returns `false`
    /// ("already tracking" signal) if a session is already running.
    pub fn start(&mut self, initial_fix: &AbsoluteFix, now_ms: i64) -> bool {
        if self.tracking_state == TrackingState::Running {
            warn!("start() called while already tracking");
            return false;
        }
        if !initial_fix.is_well_formed() {
            warn!("dropping malformed initial fix");
            return false;
        }

        self.frame = Some(LocalFrame::new(initial_fix.lat, initial_fix.lng));
        self.fix_smoother.reset();
        self.planar = PlanarKalman::new(1.0);
        self.planar.initialize(0.0, 0.0, initial_fix.accuracy.powi(2));

        self.pdr = Some(PdrTracker::new(&self.config));
        self.pdr_state = PdrState::Active;
        self.environment = Some(EnvironmentDetector::new(EnvironmentConfig::default(), now_ms));

        self.last_fix = Some(LastFixRecord {
            local: (0.0, 0.0),
            timestamp: initial_fix.timestamp,
        });
        self.consecutive_anomaly_count = 0;
        self.gps_anomaly_count = 0;
        self.last_gps_anomaly_distance_m = None;
        self.recalibration_count = 0;
        self.last_recalibration_ms = now_ms;
        self.tracking_state = TrackingState::Running;

        info!("tracking session started at ({}, {})", initial_fix.lat, initial_fix.lng);

        let mut fused = self.emit(Source::Gps, initial_fix.timestamp);
        fused.confidence = 1.0;
        self.last_fused = Some(fused);
        true
    }

    /// Stops the session; returns `false` ("not tracking" signal) if none
    /// was active. All per-session state is dropped.
    pub fn stop(&mut self) -> bool {
        if self.tracking_state != TrackingState::Running {
            warn!("stop() called while not tracking");
            return false;
        }
        self.tracking_state = TrackingState::Idle;
        self.frame = None;
        self.pdr = None;
        self.environment = None;
        self.last_fix = None;
        self.last_fused = None;
        info!("tracking session stopped");
        true
    }

    fn emit(&self, source: Source, timestamp: i64) -> FusedPosition {
        let frame = self.frame.expect("emit requires an active session");
        let (x, y) = self.planar.position();
        let (lat, lng) = frame.to_global(x, y);
        let (sx, sy) = self.planar.uncertainty();
        let accuracy = sx.max(sy);
        let confidence = (1.0 / (1.0 + accuracy)).max(0.0).min(1.0);

        FusedPosition {
            lat,
            lng,
            accuracy,
            timestamp,
            x,
            y,
            confidence,
            source,
            gps_anomaly_count: self.gps_anomaly_count,
            last_gps_anomaly_distance_m: self.last_gps_anomaly_distance_m,
        }
    }

    pub fn last_fused(&self) -> Option<FusedPosition> {
        self.last_fused
    }

    /// Processes one absolute fix. Returns the new fused position, or
    /// `None` if the session is not running or the fix was malformed.
    pub fn on_absolute_fix(&mut self, fix: &AbsoluteFix) -> Option<FusedPosition> {
        if self.tracking_state != TrackingState::Running {
            warn!("dropping absolute fix while not tracking");
            return None;
        }
        if !fix.is_well_formed() {
            warn!("dropping malformed absolute fix");
            return None;
        }

        let frame = self.frame?;
        let smoothed = self.fix_smoother.update(fix);
        let local = frame.to_local(smoothed.lat, smoothed.lng);

        if let Some(env) = &mut self.environment {
            env.on_fix_accuracy(fix.accuracy, fix.timestamp);
        }

        let is_anomalous = self.is_anomalous_fix(local, fix.timestamp, fix.accuracy);

        let fused = if is_anomalous {
            self.consecutive_anomaly_count += 1;
            self.gps_anomaly_count += 1;
            let (px, py) = self.planar.position();
            let dist = ((local.0 - px).powi(2) + (local.1 - py).powi(2)).sqrt();
            self.last_gps_anomaly_distance_m = Some(dist);

            if self.consecutive_anomaly_count >= JUMP_RESET_ANOMALY_COUNT {
                warn!("forcing jump reset after repeated GPS anomalies");
                self.planar.set_state(local.0, local.1, fix.accuracy.powi(2));
                if let Some(pdr) = &mut self.pdr {
                    pdr.reset_position(local.0, local.1);
                }
                self.consecutive_anomaly_count = 0;
                self.last_recalibration_ms = fix.timestamp;
                self.recalibration_count += 1;
            }
            self.emit(Source::Gps, fix.timestamp)
        } else {
            self.consecutive_anomaly_count = 0;
            if fix.accuracy <= self.config.min_gps_accuracy_for_update_m {
                self.planar.update(local.0, local.1, fix.accuracy);
                self.maybe_soft_recalibrate(local, fix);
                self.emit(Source::Fused, fix.timestamp)
            } else {
                debug!("GPS too noisy ({} m), skipping update", fix.accuracy);
                self.emit(Source::Gps, fix.timestamp)
            }
        };

        self.last_fix = Some(LastFixRecord {
            local,
            timestamp: fix.timestamp,
        });
        self.last_fused = Some(fused);
        Some(fused)
    }

    fn is_anomalous_fix(&self, local: (f64, f64), timestamp: i64, accuracy: f64) -> bool {
        if let Some(last) = &self.last_fix {
            let dt = ((timestamp - last.timestamp).max(0) as f64) / 1000.0;
            let dd = ((local.0 - last.local.0).powi(2) + (local.1 - last.local.1).powi(2)).sqrt();
            if dt > 0.0 && dd / dt > SPEED_GATE_MPS {
                return true;
            }
        }

        let (px, py) = self.planar.position();
        let dist = ((local.0 - px).powi(2) + (local.1 - py).powi(2)).sqrt();
        let threshold = DIVERGENCE_GATE_MIN_M.max(DIVERGENCE_GATE_ACCURACY_MULTIPLE * accuracy);
        dist > threshold
    }

    fn maybe_soft_recalibrate(&mut self, local: (f64, f64), fix: &AbsoluteFix) {
        let (px, py) = self.planar.position();
        let dist = ((local.0 - px).powi(2) + (local.1 - py).powi(2)).sqrt();
        if dist > self.config.error_threshold_m && fix.accuracy <= 20.0 {
            info!("soft recalibration: drift {} m exceeds threshold", dist);
            self.planar.set_state(local.0, local.1, fix.accuracy.powi(2));
            if let Some(pdr) = &mut self.pdr {
                pdr.reset_position(local.0, local.1);
            }
            self.recalibration_count += 1;
        }
    }

    pub fn on_accel(&mut self, sample: &AccelSample) -> Option<FusedPosition> {
        if self.tracking_state != TrackingState::Running {
            return None;
        }
        if !sample.is_well_formed() {
            warn!("dropping malformed accel sample");
            return None;
        }
        let now = sample.timestamp;
        let pdr = self.pdr.as_mut()?;
        if pdr.is_stalled(now) {
            if self.pdr_state != PdrState::Stalled {
                info!("PDR stalled, falling back to GPS-only");
            }
            self.pdr_state = PdrState::Stalled;
            return None;
        }
        self.pdr_state = PdrState::Active;

        let delta = pdr.on_accel(sample)?;
        debug!("step detected, dx={} dy={}", delta.dx, delta.dy);
        self.planar.predict(delta.dx, delta.dy);
        let fused = self.emit(Source::Pdr, delta.timestamp);
        self.last_fused = Some(fused);
        Some(fused)
    }

    pub fn on_gyro(&mut self, sample: &RotationRateSample) {
        if self.tracking_state != TrackingState::Running {
            return;
        }
        if !sample.is_well_formed() {
            warn!("dropping malformed gyro sample");
            return;
        }
        if let Some(pdr) = &mut self.pdr {
            pdr.on_gyro(sample);
        }
    }

    pub fn on_mag(&mut self, sample: &MagSample) {
        if self.tracking_state != TrackingState::Running {
            return;
        }
        if !sample.is_well_formed() {
            warn!("dropping malformed magnetometer sample");
            return;
        }
        if let Some(pdr) = &mut self.pdr {
            pdr.on_mag(sample);
        }
    }
}
