//! 2D positional Kalman filter (C7): fuses predicted PDR displacements
//! (process model) with smoothed absolute fixes (measurement model).
//!
//! State/impl separation follows the teacher's `ComplementaryFilterState` /
//! `ComplementaryFilter` split in `filters/complementary.rs`. Off-diagonal
//! covariance terms `p12`/`p21` are tracked in [`PlanarKalmanState`] but held
//! at zero here — an open question the spec resolves by defining them as
//! always zero, leaving room for a future extension that populates them from
//! correlated process noise.

use crate::types::PlanarKalmanState;

#[derive(Debug, Clone, Copy)]
pub struct PlanarKalman {
    state: PlanarKalmanState,
    process_noise: f64,
}

impl PlanarKalman {
    pub fn new(process_noise: f64) -> Self {
        PlanarKalman {
            state: PlanarKalmanState::default(),
            process_noise,
        }
    }

    pub fn initialize(&mut self, x0: f64, y0: f64, variance: f64) {
        self.state = PlanarKalmanState {
            x: x0,
            y: y0,
            p11: variance,
            p22: variance,
            p12: 0.0,
            p21: 0.0,
            initialized: true,
        };
    }

    /// Forced reset used by recalibration and jump resets: sets state
    /// directly without any smoothing.
    pub fn set_state(&mut self, x: f64, y: f64, variance: f64) {
        self.initialize(x, y, variance);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    pub fn position(&self) -> (f64, f64) {
        (self.state.x, self.state.y)
    }

    /// `(sqrt(p11), sqrt(p22))`, clamped to non-negative before the square
    /// root per the global P-diagonal invariant.
    pub fn uncertainty(&self) -> (f64, f64) {
        (self.state.p11.max(0.0).sqrt(), self.state.p22.max(0.0).sqrt())
    }

    pub fn p11(&self) -> f64 {
        self.state.p11.max(0.0)
    }

    pub fn p22(&self) -> f64 {
        self.state.p22.max(0.0)
    }

    pub fn predict(&mut self, dx: f64, dy: f64) {
        self.state.x += dx;
        self.state.y += dy;
        self.state.p11 += self.process_noise;
        self.state.p22 += self.process_noise;
    }

    /// `r = accuracy^2`.
    pub fn update(&mut self, zx: f64, zy: f64, accuracy: f64) {
        let r = accuracy * accuracy;
        let kx = self.state.p11 / (self.state.p11 + r);
        let ky = self.state.p22 / (self.state.p22 + r);
        self.state.x += kx * (zx - self.state.x);
        self.state.y += ky * (zy - self.state.y);
        self.state.p11 *= 1.0 - kx;
        self.state.p22 *= 1.0 - ky;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_advances_position_and_grows_variance() {
        let mut k = PlanarKalman::new(1.0);
        k.initialize(0.0, 0.0, 4.0);
        k.predict(1.0, 2.0);
        assert_eq!(k.position(), (1.0, 2.0));
        assert_eq!(k.p11(), 5.0);
        assert_eq!(k.p22(), 5.0);
    }

    #[test]
    fn update_pulls_variance_toward_measurement() {
        let mut k = PlanarKalman::new(1.0);
        k.initialize(0.0, 0.0, 100.0);
        let before = k.p11();
        k.update(10.0, 10.0, 1.0);
        assert!(k.p11() < before);
        assert!(k.p11() <= 1.0); // bounded by measurement variance.
    }

    #[test]
    fn accuracy_never_changing_position_when_gps_too_noisy_is_caller_responsibility() {
        // C7 itself always applies an update when called; gating on
        // min_gps_accuracy is the Fusion Manager's job (C8), not C7's.
        let mut k = PlanarKalman::new(1.0);
        k.initialize(0.0, 0.0, 4.0);
        k.update(100.0, 100.0, 1000.0);
        assert!(k.position().0 > 0.0);
    }

    #[test]
    fn set_state_forces_position_without_smoothing() {
        let mut k = PlanarKalman::new(1.0);
        k.initialize(0.0, 0.0, 4.0);
        k.predict(5.0, 5.0);
        k.set_state(50.0, 60.0, 25.0);
        assert_eq!(k.position(), (50.0, 60.0));
        assert_eq!(k.p11(), 25.0);
    }
}
