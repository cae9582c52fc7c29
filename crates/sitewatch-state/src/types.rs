//! Domain types for the SiteWatch state store.
//!
//! `Endpoint` holds a monitored target's configuration and its current
//! summary state; `Event` is one immutable probe-history record. Both are
//! serialized to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored endpoint.
pub type EndpointId = String;

/// The classification string a successful probe produces.
pub const STATUS_OK: &str = "OK";

// ── Endpoint ──────────────────────────────────────────────────────

/// A monitored network target: configuration plus current health summary.
///
/// The runtime fields (`response_time_ms`, `status`, `failures`,
/// `last_notification`) are mutated only by the monitor cycle; everything
/// else is operator-supplied configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub id: EndpointId,
    /// Display name used in event descriptions and alert subjects.
    pub name: String,
    /// Target URL for the health probe (http:// or https://).
    pub url: String,
    /// Optional substring the response body must contain verbatim.
    pub assert_text: Option<String>,
    /// Inactive endpoints are skipped entirely: no probe, no events.
    pub active: bool,
    /// Consecutive failures required before a failure alert fires (≥ 1).
    pub failure_threshold: u32,
    /// Comma-separated alert recipients; blank means never notify.
    pub notify: String,
    /// Latency of the most recent probe in milliseconds.
    pub response_time_ms: u64,
    /// Most recent classification string; empty before the first probe.
    pub status: String,
    /// Consecutive failure count; 0 whenever `status` is `OK`.
    pub failures: u32,
    /// What the last dispatched alert said, for notification dedup.
    pub last_notification: LastNotification,
}

impl Endpoint {
    /// Build a fresh endpoint from configuration with zeroed runtime state.
    pub fn new(id: impl Into<EndpointId>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            assert_text: None,
            active: true,
            failure_threshold: 1,
            notify: String::new(),
            response_time_ms: 0,
            status: String::new(),
            failures: 0,
            last_notification: LastNotification::None,
        }
    }

    /// Whether the current status is the success classification.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Key for the endpoints table.
    pub fn table_key(&self) -> &str {
        &self.id
    }
}

/// Tri-state record of the last dispatched alert for an endpoint.
///
/// The hysteresis transition table is the only writer: `Fail` after a
/// failure alert, `Ok` after a recovery alert, `None` before any alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LastNotification {
    #[default]
    None,
    Fail,
    Ok,
}

// ── Event ─────────────────────────────────────────────────────────

/// One immutable probe-history record.
///
/// Events reference their endpoint by id, never by live object, and are
/// only ever deleted in bulk by the retention purge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub endpoint_id: EndpointId,
    /// Unix timestamp of the probe in milliseconds.
    pub event_time_ms: u64,
    /// Classification string the probe produced.
    pub state: String,
    /// Human-readable summary, `"{name} {state}"`.
    pub description: String,
    /// Measured probe latency in milliseconds.
    pub response_time_ms: u64,
    /// Whether this probe's classification differs from the endpoint's
    /// previously recorded status.
    pub status_change: bool,
}

impl Event {
    /// Composite key for the events table. Zero-padded timestamp first so
    /// lexicographic order is chronological.
    pub fn table_key(&self) -> String {
        format!("{:020}:{}", self.event_time_ms, self.endpoint_id)
    }
}
