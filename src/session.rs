//! Session (Idle/Running lifecycle wrapper around the Fusion Manager and
//! the heartbeat reporter).
//!
//! Grounded on the teacher's `Session` in
//! `motion-tracker-android/rust/src/session.rs`: a state-checked lifecycle
//! (`start`/`stop` returning the spec's lifecycle errors rather than
//! panicking on misuse) and the lock-poisoning-recovery pattern
//! (`.lock().unwrap_or_else(|e| e.into_inner())`) for the shared mutable
//! state behind a mutex.

use std::sync::{Arc, Mutex};

use log::info;

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, EngineResult};
use crate::fusion::FusionManager;
use crate::reporter::{PositionSource, Reporter};
use crate::types::{
    AbsoluteFix, AccelSample, EngineConfig, EnvironmentKind, FusedPosition, MagSample,
    RotationRateSample,
};

fn lock<'a>(mutex: &'a Mutex<FusionManager>) -> std::sync::MutexGuard<'a, FusionManager> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Adapts the shared [`FusionManager`] to the reporter's read-only
/// snapshot contract.
struct FusionSource {
    manager: Arc<Mutex<FusionManager>>,
}

impl PositionSource for FusionSource {
    fn current_position(&self) -> Option<FusedPosition> {
        lock(&self.manager).last_fused()
    }

    fn current_environment(&self) -> Option<EnvironmentKind> {
        lock(&self.manager).environment().map(|s| s.environment)
    }

    fn tick_environment(&self, now_ms: i64) {
        lock(&self.manager).tick_environment(now_ms);
    }
}

/// Owns the Fusion Manager and the Heartbeat Reporter for the lifetime of
/// one tracking session. This is the type most callers construct directly;
/// [`FusionManager`] and [`Reporter`] are usable standalone for callers that
/// want to manage their own locking.
pub struct Session {
    manager: Arc<Mutex<FusionManager>>,
    reporter: Reporter,
    clock: Arc<dyn Clock>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds a session with an injected clock, so callers driving
    /// `start_now`/`on_page_hide` can substitute a [`crate::clock::FakeClock`]
    /// in tests. Callers who always supply explicit timestamps (`start`,
    /// `on_absolute_fix`, ...) don't need this.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let manager = Arc::new(Mutex::new(FusionManager::new(config.clone())));
        let reporter = Reporter::new(
            config.reporter.clone(),
            Arc::new(FusionSource {
                manager: manager.clone(),
            }),
        );
        Session {
            manager,
            reporter,
            clock,
        }
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.manager).is_tracking()
    }

    /// Starts tracking and schedules the heartbeat reporter.
    pub fn start(
        &mut self,
        initial_fix: AbsoluteFix,
        attendance_id: impl Into<String>,
        session_id: impl Into<String>,
        now_ms: i64,
    ) -> EngineResult<()> {
        let started = lock(&self.manager).start(&initial_fix, now_ms);
        if !started {
            return Err(EngineError::AlreadyTracking);
        }
        self.reporter.start(attendance_id.into(), session_id.into());
        info!("session started");
        Ok(())
    }

    /// Convenience wrapper over [`Self::start`] that stamps `initial_fix`
    /// and the session start with the session's clock, for callers that
    /// don't track their own timestamps.
    pub fn start_now(
        &mut self,
        mut initial_fix: AbsoluteFix,
        attendance_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> EngineResult<()> {
        let now_ms = self.clock.now_ms();
        initial_fix.timestamp = now_ms;
        self.start(initial_fix, attendance_id, session_id, now_ms)
    }

    pub fn stop(&mut self) -> EngineResult<()> {
        let stopped = lock(&self.manager).stop();
        self.reporter.stop();
        if !stopped {
            return Err(EngineError::NotTracking);
        }
        Ok(())
    }

    pub fn on_absolute_fix(&self, fix: AbsoluteFix) -> Option<FusedPosition> {
        lock(&self.manager).on_absolute_fix(&fix)
    }

    pub fn on_accel(&self, sample: AccelSample) -> Option<FusedPosition> {
        lock(&self.manager).on_accel(&sample)
    }

    pub fn on_gyro(&self, sample: RotationRateSample) {
        lock(&self.manager).on_gyro(&sample)
    }

    pub fn on_mag(&self, sample: MagSample) {
        lock(&self.manager).on_mag(&sample)
    }

    pub fn current_position(&self) -> Option<FusedPosition> {
        lock(&self.manager).last_fused()
    }

    pub fn set_background(&mut self, is_background: bool) {
        self.reporter.set_background(is_background);
    }

    pub async fn on_page_hide(&self) {
        self.reporter.post_best_effort().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lng: f64, accuracy: f64, timestamp: i64) -> AbsoluteFix {
        AbsoluteFix {
            lat,
            lng,
            accuracy,
            timestamp,
        }
    }

    #[tokio::test]
    async fn start_twice_returns_already_tracking() {
        let mut session = Session::new(EngineConfig::default());
        session
            .start(fix(37.5, 127.0, 8.0, 0), "att-1", "sess-1", 0)
            .unwrap();
        let err = session
            .start(fix(37.5, 127.0, 8.0, 1), "att-1", "sess-1", 1)
            .unwrap_err();
        assert_eq!(err, EngineError::AlreadyTracking);
    }

    #[tokio::test]
    async fn stop_without_start_returns_not_tracking() {
        let mut session = Session::new(EngineConfig::default());
        let err = session.stop().unwrap_err();
        assert_eq!(err, EngineError::NotTracking);
    }

    #[tokio::test]
    async fn fix_after_start_produces_fused_position() {
        let mut session = Session::new(EngineConfig::default());
        session
            .start(fix(37.5, 127.0, 8.0, 0), "att-1", "sess-1", 0)
            .unwrap();
        let fused = session.on_absolute_fix(fix(37.50001, 127.00001, 8.0, 1000));
        assert!(fused.is_some());
        assert!(session.current_position().is_some());
    }

    #[tokio::test]
    async fn start_now_stamps_fix_from_the_injected_clock() {
        use crate::clock::FakeClock;

        let clock = Arc::new(FakeClock::new(5_000));
        let mut session = Session::with_clock(EngineConfig::default(), clock);
        session
            .start_now(fix(37.5, 127.0, 8.0, 0), "att-1", "sess-1")
            .unwrap();
        assert_eq!(session.current_position().unwrap().timestamp, 5_000);
    }
}
