//! Error kinds surfaced across the session/lifecycle/transport boundary.
//!
//! Numeric-path failures (NaN samples, non-positive accuracy) are not
//! represented here: per policy they are dropped with a `warn!` log and a
//! counter bump inside the component that sees them, never propagated as
//! `Err`. This enum is reserved for the lifecycle and transport operations a
//! caller actually needs to react to.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sensor platform unavailable: {0}")]
    SensorUnavailable(String),

    #[error("operation requires an active tracking session")]
    NotTracking,

    #[error("a tracking session is already active")]
    AlreadyTracking,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("collector rejected the request: {0}")]
    RejectedByCollector(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
