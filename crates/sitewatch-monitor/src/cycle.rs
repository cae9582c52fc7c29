//! Cycle orchestrator — one full monitoring pass over all active endpoints.
//!
//! `Monitor` fans out one probe task per active endpoint, waits for every
//! probe to reach a terminal outcome, then sequentially merges results:
//! endpoint state update, persistence, hysteresis evaluation, event append.
//! Probes return immutable values; the orchestrator is the only mutator.
//!
//! A single-flight guard rejects a trigger that arrives while a cycle is
//! still running. One endpoint's persistence or dispatch failure is logged
//! and absorbed; it never aborts the rest of the cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use sitewatch_state::{Endpoint, Event, LastNotification, StateStore};

use crate::error::{MonitorError, MonitorResult};
use crate::hysteresis::{self, AlertKind};
use crate::notify::{split_recipients, Notifier, RenderTemplate};
use crate::probe::{ProbeOutcome, ProbeTarget, Prober};

/// Default retention for probe history: 7 days.
pub const DEFAULT_PURGE_AGE: Duration = Duration::from_secs(168 * 60 * 60);

/// Aggregate outcome of one monitor cycle, for the daemon's log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Endpoints probed to a terminal outcome.
    pub probed: usize,
    /// Alerts dispatched (failure + recovery).
    pub alerts: usize,
    /// Absorbed per-endpoint persist/dispatch errors.
    pub errors: usize,
}

/// Drives monitor cycles and retention purges over a shared state store.
pub struct Monitor {
    state: StateStore,
    prober: Prober,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn RenderTemplate>,
    /// Single-flight guard: held for the full duration of a cycle.
    in_flight: Mutex<()>,
    /// Timestamp of the previous cycle, for strictly increasing event
    /// times (event table keys embed the timestamp).
    last_cycle_ms: AtomicU64,
}

impl Monitor {
    pub fn new(
        state: StateStore,
        prober: Prober,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn RenderTemplate>,
    ) -> Self {
        Self {
            state,
            prober,
            notifier,
            renderer,
            in_flight: Mutex::new(()),
            last_cycle_ms: AtomicU64::new(0),
        }
    }

    /// Run one monitoring pass over all active endpoints.
    ///
    /// Rejects with `CycleInFlight` if a previous cycle has not finished;
    /// overlapping cycles are disallowed by design. Fails only if the
    /// endpoint list cannot be loaded — everything per-endpoint is
    /// absorbed into the summary's error count.
    pub async fn run_monitor_cycle(&self) -> MonitorResult<CycleSummary> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| MonitorError::CycleInFlight)?;

        debug!("monitor cycle starting");
        let active: Vec<Endpoint> = self
            .state
            .list_endpoints()?
            .into_iter()
            .filter(|e| e.active)
            .collect();

        // Fan out one probe task per active endpoint. Unbounded on purpose:
        // the endpoint set is assumed small enough for full parallelism.
        let mut tasks = JoinSet::new();
        for endpoint in &active {
            let prober = self.prober.clone();
            let target = ProbeTarget::from_endpoint(endpoint);
            tasks.spawn(async move { prober.probe(&target).await });
        }

        // Wait-all barrier: no outcome is applied while any probe is
        // still running.
        let mut outcomes: HashMap<String, ProbeOutcome> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.endpoint_id.clone(), outcome);
                }
                // Probes have no error path; only a panicked task lands here.
                Err(e) => error!(error = %e, "probe task failed to join"),
            }
        }

        let now_ms = self.cycle_timestamp();
        let mut summary = CycleSummary::default();
        for endpoint in active {
            match outcomes.remove(&endpoint.id) {
                Some(outcome) => {
                    summary.probed += 1;
                    self.apply_outcome(endpoint, outcome, now_ms, &mut summary)
                        .await;
                }
                None => {
                    error!(endpoint_id = %endpoint.id, "probe produced no outcome");
                    summary.errors += 1;
                }
            }
        }

        info!(
            probed = summary.probed,
            alerts = summary.alerts,
            errors = summary.errors,
            "monitor cycle finished"
        );
        Ok(summary)
    }

    /// Merge one probe outcome into durable endpoint state, evaluate
    /// hysteresis, and append the history event. State update and persist
    /// happen before notification evaluation for this endpoint.
    async fn apply_outcome(
        &self,
        mut endpoint: Endpoint,
        outcome: ProbeOutcome,
        now_ms: u64,
        summary: &mut CycleSummary,
    ) {
        let status = outcome.classification.to_string();
        let status_change = status != endpoint.status;

        endpoint.response_time_ms = outcome.latency.as_millis() as u64;
        endpoint.status = status.clone();
        if outcome.classification.is_ok() {
            endpoint.failures = 0;
        } else {
            endpoint.failures += 1;
        }

        if let Err(e) = self.state.put_endpoint(&endpoint) {
            error!(endpoint_id = %endpoint.id, error = %e, "failed to persist endpoint state");
            summary.errors += 1;
        }

        let event = Event {
            endpoint_id: endpoint.id.clone(),
            event_time_ms: now_ms,
            state: status.clone(),
            description: format!("{} {}", endpoint.name, status),
            response_time_ms: endpoint.response_time_ms,
            status_change,
        };

        if let Some(kind) = hysteresis::decide(&endpoint, status_change) {
            self.dispatch_alert(&mut endpoint, &event, kind, summary).await;
        }

        // The event is recorded whether or not an alert fired.
        if let Err(e) = self.state.put_event(&event) {
            error!(endpoint_id = %endpoint.id, error = %e, "failed to persist event");
            summary.errors += 1;
        }
    }

    /// Dispatch one alert and persist the endpoint's new last-notification
    /// state. A failed failure dispatch leaves the previous state in place
    /// so the alert is retried next cycle. A failed recovery dispatch still
    /// advances the state: the status change that triggered it is gone by
    /// the next cycle, so a stale `Fail` marker would never clear and would
    /// suppress the next outage's failure alert.
    async fn dispatch_alert(
        &self,
        endpoint: &mut Endpoint,
        event: &Event,
        kind: AlertKind,
        summary: &mut CycleSummary,
    ) {
        let recipients = split_recipients(&endpoint.notify);

        let advance = if recipients.is_empty() {
            // No recipients configured: a vacuous dispatch. The
            // notification state still transitions, otherwise the raise
            // rule re-fires every cycle for the endpoint.
            debug!(endpoint_id = %endpoint.id, "no recipients configured, alert skipped");
            true
        } else {
            let subject = format!("**SiteWatch** [{}] {}", endpoint.name, event.state);
            let timestamp = format_timestamp(event.event_time_ms);
            let body = self
                .renderer
                .render(&timestamp, &event.description, &event.state);

            match self.notifier.send_alert(&recipients, &subject, &body).await {
                Ok(()) => {
                    info!(endpoint_id = %endpoint.id, ?kind, subject, "alert dispatched");
                    summary.alerts += 1;
                    true
                }
                Err(e) => {
                    warn!(endpoint_id = %endpoint.id, error = %e, "alert dispatch failed");
                    summary.errors += 1;
                    matches!(kind, AlertKind::Recovery)
                }
            }
        };

        if advance {
            endpoint.last_notification = match kind {
                AlertKind::Failure => LastNotification::Fail,
                AlertKind::Recovery => LastNotification::Ok,
            };
            if let Err(e) = self.state.put_endpoint(endpoint) {
                error!(endpoint_id = %endpoint.id, error = %e, "failed to persist notification state");
                summary.errors += 1;
            }
        }
    }

    /// Delete every event older than `max_age`. Returns the number
    /// deleted. Idempotent; endpoint state is untouched.
    pub async fn purge_older_than(&self, max_age: Duration) -> MonitorResult<u64> {
        let cutoff_ms = epoch_ms().saturating_sub(max_age.as_millis() as u64);
        let deleted = self.state.delete_events_older_than(cutoff_ms)?;
        info!(
            deleted,
            max_age_hours = max_age.as_secs() / 3600,
            "event purge completed"
        );
        Ok(deleted)
    }

    /// Event timestamp for this cycle, strictly greater than the previous
    /// cycle's so event table keys never collide. The single-flight guard
    /// serializes cycles, so plain load/store is enough.
    fn cycle_timestamp(&self) -> u64 {
        let prev = self.last_cycle_ms.load(Ordering::Relaxed);
        let ts = epoch_ms().max(prev + 1);
        self.last_cycle_ms.store(ts, Ordering::Relaxed);
        ts
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Render an event timestamp for alert bodies, `YYYY-MM-DD HH:MM:SS` UTC.
fn format_timestamp(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
