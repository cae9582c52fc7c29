//! Monitor error types.
//!
//! Probe failures are never errors here: every probe resolves to a
//! `Classification`. These variants cover the cycle machinery itself.

use thiserror::Error;

/// Errors that can occur while driving a monitor cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("a monitor cycle is already in flight")]
    CycleInFlight,

    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("state store error: {0}")]
    State(#[from] sitewatch_state::StateError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
