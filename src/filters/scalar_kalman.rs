//! Scalar Kalman filter (C1): smooths one scalar quantity against a
//! per-update measurement variance. Grounded on the teacher's generic
//! `kalman_update` gain/variance arithmetic, specialized here to the scalar
//! case the spec requires (no matrix machinery needed for a 1x1 state).

/// Default process-noise variance for a bare scalar filter, per spec.
pub const DEFAULT_PROCESS_NOISE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarKalman {
    x_hat: f64,
    variance: f64,
    process_noise: f64,
    initialized: bool,
}

impl ScalarKalman {
    pub fn new(process_noise: f64) -> Self {
        ScalarKalman {
            x_hat: 0.0,
            variance: 0.0,
            process_noise,
            initialized: false,
        }
    }

    pub fn reset(&mut self) {
        self.x_hat = 0.0;
        self.variance = 0.0;
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn estimate(&self) -> f64 {
        self.x_hat
    }

    /// Reading clamps the variance to non-negative, per the global invariant
    /// that P diagonals never surface as negative even if float drift nudges
    /// them there.
    pub fn variance(&self) -> f64 {
        self.variance.max(0.0)
    }

    /// `r` is the measurement variance for this update, must be > 0.
    pub fn update(&mut self, z: f64, r: f64) -> f64 {
        debug_assert!(r > 0.0, "measurement variance must be positive");
        if !self.initialized {
            self.x_hat = z;
            self.variance = r;
            self.initialized = true;
            return self.x_hat;
        }
        self.variance += self.process_noise;
        let gain = self.variance / (self.variance + r);
        self.x_hat += gain * (z - self.x_hat);
        self.variance *= 1.0 - gain;
        self.x_hat
    }
}
