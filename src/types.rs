//! Data model shared across the engine: sample shapes, the fused-position
//! output, and the injected configuration tree.
//!
//! Sample shapes are strict structs rather than duck-typed objects, and
//! provenance is a tagged enum (`Source`) rather than an inferred string, per
//! the redesign direction away from the source's loosely-typed fix objects.

use serde::{Deserialize, Serialize};

/// Provenance of a fused position: which subsystem produced the estimate
/// that is currently being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gps,
    Pdr,
    Fused,
}

/// An absolute-position fix from the positioning source. Created once,
/// consumed once by the absolute-fix smoother, never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteFix {
    pub lat: f64,
    pub lng: f64,
    /// 1-sigma radius in meters. Always > 0 for a well-formed fix.
    pub accuracy: f64,
    /// Monotonic milliseconds.
    pub timestamp: i64,
}

impl AbsoluteFix {
    pub fn is_well_formed(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.accuracy.is_finite()
            && self.accuracy > 0.0
    }
}

/// A fix that has passed through the per-axis scalar Kalman smoother (C2).
/// Same shape as [`AbsoluteFix`]; `accuracy` is the post-update 1-sigma.
pub type SmoothedFix = AbsoluteFix;

/// Accelerometer sample, axes in m/s^2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub timestamp: i64,
}

impl AccelSample {
    pub fn magnitude(&self) -> f64 {
        (self.ax * self.ax + self.ay * self.ay + self.az * self.az).sqrt()
    }

    pub fn is_well_formed(&self) -> bool {
        self.ax.is_finite() && self.ay.is_finite() && self.az.is_finite()
    }
}

/// Gyroscope sample, degrees/second. Only `alpha` (yaw about the vertical
/// axis) is used by the heading estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationRateSample {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub timestamp: i64,
}

impl RotationRateSample {
    pub fn is_well_formed(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.gamma.is_finite()
    }
}

/// Magnetometer sample, arbitrary units. Used as an absolute yaw reference
/// via `atan2(my, mx)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagSample {
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    pub timestamp: i64,
}

impl MagSample {
    pub fn is_well_formed(&self) -> bool {
        self.mx.is_finite() && self.my.is_finite() && self.mz.is_finite()
    }
}

/// A detected step, emitted by the step detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_number: u64,
    pub peak_magnitude: f64,
    pub interval_ms: i64,
    pub timestamp: i64,
}

/// Incremental planar displacement produced by the PDR tracker on each step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdrDelta {
    pub dx: f64,
    pub dy: f64,
    pub step_length: f64,
    /// Radians, 0 = north, clockwise positive.
    pub heading: f64,
    pub confidence: f64,
    pub timestamp: i64,
}

/// State of the 2D positional Kalman filter. Off-diagonal covariance terms
/// are tracked but held at zero; see module docs on `filters::planar_kalman`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarKalmanState {
    pub x: f64,
    pub y: f64,
    pub p11: f64,
    pub p22: f64,
    pub p12: f64,
    pub p21: f64,
    pub initialized: bool,
}

impl Default for PlanarKalmanState {
    fn default() -> Self {
        PlanarKalmanState {
            x: 0.0,
            y: 0.0,
            p11: 0.0,
            p22: 0.0,
            p12: 0.0,
            p21: 0.0,
            initialized: false,
        }
    }
}

/// The engine's primary output: a fused position with provenance and
/// confidence, emitted on every absolute fix and every PDR delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedPosition {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: f64,
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
    pub source: Source,
    pub gps_anomaly_count: u32,
    pub last_gps_anomaly_distance_m: Option<f64>,
}

/// Outdoor/indoor/unknown classification driven by positioning-quality
/// history. Purely informational for the fusion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Outdoor,
    Indoor,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub environment: EnvironmentKind,
    pub confidence: f64,
    pub last_transition_ms: i64,
}

// ---------------------------------------------------------------------
// Configuration, injected once at session start and never mutated.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdrConfig {
    pub sensor_frequency_hz: f64,
    pub user_height_cm: f64,
}

impl Default for PdrConfig {
    fn default() -> Self {
        PdrConfig {
            sensor_frequency_hz: 20.0,
            user_height_cm: 170.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepLengthMethod {
    Fixed,
    Weinberg,
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDetectorConfig {
    pub threshold_g: f64,
    pub min_step_interval_ms: i64,
    pub buffer_size: usize,
    pub adaptive: bool,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        StepDetectorConfig {
            threshold_g: 1.5,
            min_step_interval_ms: 200,
            buffer_size: 10,
            adaptive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingConfig {
    pub mag_interval_ms: i64,
    pub alpha_gyro: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        HeadingConfig {
            mag_interval_ms: 1000,
            alpha_gyro: 0.98,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterConfig {
    pub foreground_ms: u64,
    pub background_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub endpoint_url: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            foreground_ms: 30_000,
            background_ms: 60_000,
            max_retries: 3,
            retry_delay_ms: 5_000,
            endpoint_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub min_gps_accuracy_for_update_m: f64,
    pub error_threshold_m: f64,
    pub recalibration_periodic_ms: i64,
    pub step_length_method: StepLengthMethod,
    pub pdr: PdrConfig,
    pub step_detector: StepDetectorConfig,
    pub heading: HeadingConfig,
    pub reporter: ReporterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            min_gps_accuracy_for_update_m: 40.0,
            error_threshold_m: 20.0,
            recalibration_periodic_ms: 60_000,
            step_length_method: StepLengthMethod::Adaptive,
            pdr: PdrConfig::default(),
            step_detector: StepDetectorConfig::default(),
            heading: HeadingConfig::default(),
            reporter: ReporterConfig::default(),
        }
    }
}
