//! Heartbeat reporter (C10): periodically samples the Fusion Manager's
//! current fused position and posts it to an external collector, on a
//! cadence that adapts to foreground/background visibility, with bounded
//! retry.
//!
//! The `reqwest::Client` + bounded-retry loop is grounded on the teacher's
//! `OverpassFetcher::fetch_tile` in `map_match/overpass_fetcher.rs`, adapted
//! from that file's exponential Overpass backoff to the spec's literal fixed
//! `retry_delay_ms`. The owned-task-with-cancellation-token shape follows
//! the periodic background task in `health_monitor.rs`'s
//! `health_monitor_task`. Per the redesign direction away from a
//! module-level singleton reporter, this is a plain owned value with no
//! global state; a caller holds it (typically inside [`crate::session::Session`]).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, EngineResult};
use crate::types::{EnvironmentKind, FusedPosition, ReporterConfig, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    GpsOnly,
    PdrOnly,
    Fusion,
}

impl TrackingMode {
    fn as_str(self) -> &'static str {
        match self {
            TrackingMode::GpsOnly => "gps-only",
            TrackingMode::PdrOnly => "pdr-only",
            TrackingMode::Fusion => "fusion",
        }
    }
}

impl From<Source> for TrackingMode {
    fn from(source: Source) -> Self {
        match source {
            Source::Gps => TrackingMode::GpsOnly,
            Source::Pdr => TrackingMode::PdrOnly,
            Source::Fused => TrackingMode::Fusion,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "attendanceId")]
    pub attendance_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: i64,
    #[serde(rename = "isBackground")]
    pub is_background: bool,
    pub source: &'static str,
    #[serde(rename = "trackingMode")]
    pub tracking_mode: &'static str,
    pub environment: &'static str,
    pub confidence: f64,
    #[serde(rename = "gpsWeight")]
    pub gps_weight: f64,
    #[serde(rename = "pdrWeight")]
    pub pdr_weight: f64,
    #[serde(rename = "gpsAnomalyCount")]
    pub gps_anomaly_count: u32,
    #[serde(rename = "lastGpsAnomalyDistance")]
    pub last_gps_anomaly_distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(rename = "locationValid")]
    pub location_valid: bool,
    pub distance: Option<f64>,
    #[serde(rename = "allowedRadius")]
    pub allowed_radius: Option<f64>,
    #[serde(rename = "sessionEnded")]
    pub session_ended: bool,
    #[serde(rename = "statusChanged")]
    pub status_changed: bool,
    #[serde(rename = "newStatus")]
    pub new_status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "lowAccuracy")]
    pub low_accuracy: Option<bool>,
    pub accuracy: Option<f64>,
}

fn environment_str(kind: Option<EnvironmentKind>) -> &'static str {
    match kind {
        Some(EnvironmentKind::Outdoor) => "outdoor",
        Some(EnvironmentKind::Indoor) => "indoor",
        Some(EnvironmentKind::Unknown) | None => "unknown",
    }
}

/// Builds the wire payload for one heartbeat tick. `gpsWeight`/`pdrWeight`
/// are legacy fields the collector still expects; under the Kalman path
/// they always carry 0.5 and no new information, preserved only for
/// compatibility.
pub fn build_request(
    attendance_id: &str,
    session_id: &str,
    fused: &FusedPosition,
    environment: Option<EnvironmentKind>,
    is_background: bool,
) -> HeartbeatRequest {
    let mode = TrackingMode::from(fused.source);
    HeartbeatRequest {
        attendance_id: attendance_id.to_string(),
        session_id: session_id.to_string(),
        latitude: fused.lat,
        longitude: fused.lng,
        accuracy: fused.accuracy,
        timestamp: fused.timestamp,
        is_background,
        source: if is_background { "background" } else { "foreground" },
        tracking_mode: mode.as_str(),
        environment: environment_str(environment),
        confidence: fused.confidence,
        gps_weight: 0.5,
        pdr_weight: 0.5,
        gps_anomaly_count: fused.gps_anomaly_count,
        last_gps_anomaly_distance: fused.last_gps_anomaly_distance_m,
    }
}

/// Source of the fused position the reporter should post on each tick.
pub trait PositionSource: Send + Sync {
    fn current_position(&self) -> Option<FusedPosition>;
    fn current_environment(&self) -> Option<EnvironmentKind>;

    /// Re-evaluates environment classification against wall-clock `now_ms`,
    /// so a GPS outage that never produces a new fix still ages out.
    fn tick_environment(&self, now_ms: i64);
}

struct Shared {
    client: reqwest::Client,
    config: ReporterConfig,
    attendance_id: String,
    session_id: String,
    is_background: AtomicBool,
    consecutive_failures: AtomicU32,
    last_success_ms: Mutex<Option<i64>>,
    /// Set once the collector responds with `sessionEnded=true`; the
    /// spawned schedule loop observes this and stops itself.
    session_ended: AtomicBool,
}

/// Owned, per-session heartbeat reporter. Holds its own tokio task handle;
/// dropping or calling [`Reporter::stop`] cancels cooperatively (an
/// in-flight POST is allowed to finish).
pub struct Reporter {
    shared: Arc<Shared>,
    source: Arc<dyn PositionSource>,
    handle: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn new(config: ReporterConfig, source: Arc<dyn PositionSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Reporter {
            shared: Arc::new(Shared {
                client,
                config,
                attendance_id: String::new(),
                session_id: String::new(),
                is_background: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                last_success_ms: Mutex::new(None),
                session_ended: AtomicBool::new(false),
            }),
            source,
            handle: None,
        }
    }

    fn interval_ms(&self) -> u64 {
        if self.shared.is_background.load(Ordering::Relaxed) {
            self.shared.config.background_ms
        } else {
            self.shared.config.foreground_ms
        }
    }

    /// Starts the periodic schedule. Idempotent: calling while already
    /// started restarts the timer on the current interval.
    pub fn start(&mut self, attendance_id: String, session_id: String) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        let client = self.shared.client.clone();
        let config = self.shared.config.clone();
        let shared = Arc::new(Shared {
            client,
            config,
            attendance_id,
            session_id,
            is_background: AtomicBool::new(self.shared.is_background.load(Ordering::Relaxed)),
            consecutive_failures: AtomicU32::new(0),
            last_success_ms: Mutex::new(None),
            session_ended: AtomicBool::new(false),
        });
        self.shared = shared.clone();

        let source = self.source.clone();
        let interval_ms = self.interval_ms();

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                if let Err(e) = tick(&shared, source.as_ref()).await {
                    warn!("heartbeat tick failed: {e}");
                }
                if shared.session_ended.load(Ordering::Relaxed) {
                    info!("collector ended the session, stopping heartbeat reporter");
                    break;
                }
            }
        }));
    }

    /// Cancels the schedule. In-flight requests are allowed to complete.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("heartbeat reporter stopped");
        }
    }

    /// `true` once the schedule is running and the collector has not yet
    /// ended the session.
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.shared.session_ended.load(Ordering::Relaxed)
    }

    /// Called by the host on a foreground/background transition. Reschedules
    /// the interval with no phase accumulation (the old timer is replaced,
    /// not paused).
    pub fn set_background(&mut self, is_background: bool) {
        self.shared.is_background.store(is_background, Ordering::Relaxed);
        if self.handle.is_some() {
            let attendance_id = self.shared.attendance_id.clone();
            let session_id = self.shared.session_id.clone();
            self.start(attendance_id, session_id);
        }
    }

    /// Best-effort single post on "page hide", before yielding. Does not
    /// affect the retry counter.
    pub async fn post_best_effort(&self) {
        let _ = tick(&self.shared, self.source.as_ref()).await;
    }
}

async fn tick(shared: &Shared, source: &dyn PositionSource) -> EngineResult<()> {
    source.tick_environment(SystemClock.now_ms());

    let Some(fused) = source.current_position() else {
        return Ok(());
    };
    let environment = source.current_environment();
    let is_background = shared.is_background.load(Ordering::Relaxed);

    let request = build_request(
        &shared.attendance_id,
        &shared.session_id,
        &fused,
        environment,
        is_background,
    );

    match post_with_retry(shared, &request).await {
        Ok(response) => {
            shared.consecutive_failures.store(0, Ordering::Relaxed);
            *shared.last_success_ms.lock().await = Some(fused.timestamp);
            if response.session_ended {
                info!("collector signaled session end");
                shared.session_ended.store(true, Ordering::Relaxed);
            }
            Ok(())
        }
        Err(e) => {
            let failures = shared.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= shared.config.max_retries {
                warn!("heartbeat reporter hit max retries ({failures})");
                shared.consecutive_failures.store(0, Ordering::Relaxed);
            }
            Err(e)
        }
    }
}

async fn post_with_retry(
    shared: &Shared,
    request: &HeartbeatRequest,
) -> EngineResult<HeartbeatResponse> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match post_once(shared, request).await {
            Ok(response) => return Ok(response),
            Err(e) if attempt >= shared.config.max_retries => return Err(e),
            Err(_) => {
                tokio::time::sleep(std::time::Duration::from_millis(shared.config.retry_delay_ms))
                    .await;
            }
        }
    }
}

async fn post_once(
    shared: &Shared,
    request: &HeartbeatRequest,
) -> EngineResult<HeartbeatResponse> {
    let response = shared
        .client
        .post(&shared.config.endpoint_url)
        .json(request)
        .send()
        .await
        .map_err(|e| EngineError::TransportError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(EngineError::TransportError(format!(
            "HTTP {}",
            response.status().as_u16()
        )));
    }

    let body: HeartbeatResponse = response
        .json()
        .await
        .map_err(|e| EngineError::TransportError(e.to_string()))?;

    if !body.success {
        let message = body.error.clone().unwrap_or_else(|| "rejected".to_string());
        return Err(EngineError::RejectedByCollector(message));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn tracking_mode_maps_from_source() {
        assert_eq!(TrackingMode::from(Source::Gps).as_str(), "gps-only");
        assert_eq!(TrackingMode::from(Source::Pdr).as_str(), "pdr-only");
        assert_eq!(TrackingMode::from(Source::Fused).as_str(), "fusion");
    }

    #[test]
    fn build_request_carries_legacy_weights() {
        let fused = FusedPosition {
            lat: 1.0,
            lng: 2.0,
            accuracy: 5.0,
            timestamp: 1000,
            x: 0.0,
            y: 0.0,
            confidence: 0.9,
            source: Source::Fused,
            gps_anomaly_count: 0,
            last_gps_anomaly_distance_m: None,
        };
        let req = build_request("att-1", "sess-1", &fused, Some(EnvironmentKind::Outdoor), false);
        assert_eq!(req.gps_weight, 0.5);
        assert_eq!(req.pdr_weight, 0.5);
        assert_eq!(req.source, "foreground");
        assert_eq!(req.environment, "outdoor");
    }
}
