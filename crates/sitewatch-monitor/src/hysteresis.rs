//! Notification hysteresis — when to alert, when to stay quiet.
//!
//! A pure decision function over updated endpoint state. The failure
//! threshold suppresses alerts on transient blips; the tri-state
//! `LastNotification` suppresses repeats while an outage persists and
//! makes the recovery alert fire exactly once.

use sitewatch_state::{Endpoint, LastNotification};

/// Which alert a cycle should dispatch for an endpoint, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// The endpoint crossed its failure threshold.
    Failure,
    /// The endpoint recovered after a failure alert.
    Recovery,
}

/// Decide whether to alert for an endpoint after its state was updated
/// from a probe outcome.
///
/// `status_change` is whether this probe's classification differs from
/// the endpoint's previously recorded status. Transition table:
///
/// - active ∧ not OK ∧ failures ≥ threshold ∧ last ≠ Fail → `Failure`
/// - active ∧ OK ∧ status changed ∧ last = Fail → `Recovery`
/// - otherwise → no alert
pub fn decide(endpoint: &Endpoint, status_change: bool) -> Option<AlertKind> {
    if !endpoint.active {
        return None;
    }

    if !endpoint.is_ok()
        && endpoint.failures >= endpoint.failure_threshold
        && endpoint.last_notification != LastNotification::Fail
    {
        return Some(AlertKind::Failure);
    }

    if endpoint.is_ok() && status_change && endpoint.last_notification == LastNotification::Fail {
        return Some(AlertKind::Recovery);
    }

    None
}
