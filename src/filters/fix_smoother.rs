//! Absolute-fix smoother (C2): wraps two independent scalar Kalman
//! instances, one per geographic axis, and reshapes the pair of
//! post-update variances into a single 1-sigma summary.
//!
//! lat/lng are smoothed independently at short horizons to keep the filter
//! trivially invertible; any cross-term correlation is left to the planar
//! fusion filter (C7) rather than modeled here.

use super::scalar_kalman::{ScalarKalman, DEFAULT_PROCESS_NOISE};
use crate::types::{AbsoluteFix, SmoothedFix};

#[derive(Debug, Clone)]
pub struct AbsoluteFixSmoother {
    lat_filter: ScalarKalman,
    lng_filter: ScalarKalman,
}

impl Default for AbsoluteFixSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl AbsoluteFixSmoother {
    pub fn new() -> Self {
        AbsoluteFixSmoother {
            lat_filter: ScalarKalman::new(DEFAULT_PROCESS_NOISE),
            lng_filter: ScalarKalman::new(DEFAULT_PROCESS_NOISE),
        }
    }

    pub fn reset(&mut self) {
        self.lat_filter.reset();
        self.lng_filter.reset();
    }

    /// Updates both axis filters with `r = accuracy^2` and returns the
    /// smoothed fix, with accuracy recomputed as
    /// `sqrt((P_lat + P_lng) / 2)`.
    pub fn update(&mut self, fix: &AbsoluteFix) -> SmoothedFix {
        let r = fix.accuracy * fix.accuracy;
        let lat = self.lat_filter.update(fix.lat, r);
        let lng = self.lng_filter.update(fix.lng, r);
        let accuracy = ((self.lat_filter.variance() + self.lng_filter.variance()) / 2.0).sqrt();
        SmoothedFix {
            lat,
            lng,
            accuracy,
            timestamp: fix.timestamp,
        }
    }
}
