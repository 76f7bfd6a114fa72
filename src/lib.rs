//! Pedestrian GPS/PDR fusion engine.
//!
//! Fuses noisy absolute position fixes (GPS-like) with dead-reckoning computed
//! from inertial sensors to produce a continuous stream of fused positions
//! with per-sample confidence and provenance. See [`fusion::FusionManager`]
//! for the orchestration entry point and [`session::Session`] for the
//! lifecycle wrapper most callers want.

pub mod clock;
pub mod environment;
pub mod error;
pub mod filters;
pub mod fusion;
pub mod geo;
pub mod pdr;
pub mod reporter;
pub mod session;
pub mod types;

pub use error::EngineError;
pub use fusion::FusionManager;
pub use session::Session;
pub use types::{
    AbsoluteFix, EngineConfig, EnvironmentKind, EnvironmentState, FusedPosition, Source,
};
