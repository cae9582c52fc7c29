//! sitewatch-monitor — the SiteWatch monitoring core.
//!
//! Probes configured endpoints over HTTP(S), records the outcome history,
//! and dispatches alerts only on meaningful state transitions.
//!
//! # Architecture
//!
//! ```text
//! Monitor::run_monitor_cycle()
//!   ├── load endpoints, skip inactive
//!   ├── Prober::probe() × N      (concurrent tasks via JoinSet)
//!   ├── wait-all barrier
//!   └── per endpoint, sequentially:
//!       ├── detect status change, update latency/status/failures
//!       ├── persist endpoint state
//!       ├── hysteresis::decide() → maybe dispatch alert
//!       └── append Event to history
//!
//! Monitor::purge_older_than()    (independent retention pass)
//! ```
//!
//! Probes return immutable outcome values and never touch shared state;
//! the cycle orchestrator is the only mutator. A single-flight guard
//! rejects overlapping cycles.

pub mod cycle;
pub mod error;
pub mod hysteresis;
pub mod notify;
pub mod probe;

pub use cycle::{CycleSummary, Monitor, DEFAULT_PURGE_AGE};
pub use error::{MonitorError, MonitorResult};
pub use hysteresis::AlertKind;
pub use notify::{LogNotifier, Notifier, NotifyError, RenderTemplate, TextTemplate};
pub use probe::{Classification, ProbeOutcome, ProbeTarget, Prober, DEFAULT_REQUEST_TIMEOUT};
