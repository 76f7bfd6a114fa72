//! Kalman-style smoothing filters: the scalar 1D update (C1), the
//! lat/lng absolute-fix smoother built on top of it (C2), and the 2D
//! positional filter that fuses PDR predictions with smoothed fixes (C7).

pub mod fix_smoother;
pub mod planar_kalman;
pub mod scalar_kalman;

pub use fix_smoother::AbsoluteFixSmoother;
pub use planar_kalman::PlanarKalman;
pub use scalar_kalman::ScalarKalman;
