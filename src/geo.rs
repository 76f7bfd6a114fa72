//! Local-frame converter (C11): lat/lng <-> local planar (x, y) around a
//! chosen origin, plus general-purpose Haversine distance.
//!
//! Grounded on the teacher's `latlon_to_meters`/`meters_to_latlon`/
//! `haversine_distance` helpers (small-angle equirectangular approximation,
//! accurate to roughly 0.5% within a few kilometers of the origin — not
//! meant for the general-purpose distances the Haversine formula below
//! handles instead).

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Anchors a local planar frame at a fixed `(lat, lng)` origin for the
/// lifetime of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    lat0: f64,
    lng0: f64,
}

impl LocalFrame {
    pub fn new(lat0: f64, lng0: f64) -> Self {
        LocalFrame { lat0, lng0 }
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.lat0, self.lng0)
    }

    /// `x` = east-west meters, `y` = north-south meters, relative to the
    /// origin.
    pub fn to_local(&self, lat: f64, lng: f64) -> (f64, f64) {
        let x = (lng - self.lng0) * (self.lat0.to_radians()).cos() * EARTH_RADIUS_M
            * std::f64::consts::PI
            / 180.0;
        let y = (lat - self.lat0) * EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        (x, y)
    }

    /// Inverse of [`Self::to_local`].
    pub fn to_global(&self, x: f64, y: f64) -> (f64, f64) {
        let lat = self.lat0 + y * 180.0 / (EARTH_RADIUS_M * std::f64::consts::PI);
        let lng = self.lng0
            + x * 180.0 / (EARTH_RADIUS_M * std::f64::consts::PI * self.lat0.to_radians().cos());
        (lat, lng)
    }
}

/// Great-circle distance between two arbitrary `(lat, lng)` points, in
/// meters. Used for distances that are not relative to a session's local
/// frame; the linearization in [`LocalFrame`] is not accurate enough beyond
/// a few kilometers.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
