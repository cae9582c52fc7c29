//! Health check probe logic.
//!
//! One probe = one HTTP GET against one endpoint, classified into `OK` or
//! one of several failure shapes. Certificate validation is disabled on
//! purpose: monitoring tolerates self-signed and expired certs, so a cert
//! problem never masks the reachability answer.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use sitewatch_state::Endpoint;

use crate::error::{MonitorError, MonitorResult};

/// Fixed per-request timeout; a probe always reaches a terminal outcome
/// within this bound.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome classification of a single probe.
///
/// The enum keeps assertion failures distinguishable from transport
/// failures; `Display` renders the classification string stored on
/// endpoints and events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 2xx response and, if configured, the assertion text was found.
    Ok,
    /// 2xx response but the body did not contain the assertion text.
    AssertFailed,
    /// Request completed with a non-2xx status.
    BadStatus(u16),
    /// Transport-level fault: timeout, connection refused, DNS, TLS.
    Transport(String),
}

impl Classification {
    /// Whether this is the success classification.
    pub fn is_ok(&self) -> bool {
        matches!(self, Classification::Ok)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ok => write!(f, "OK"),
            Classification::AssertFailed => write!(f, "FAIL"),
            Classification::BadStatus(code) => write!(f, "FAIL status: {code}"),
            Classification::Transport(cause) => write!(f, "FAIL {cause}"),
        }
    }
}

/// Immutable probe input, cloned from an `Endpoint` before fan-out so probe
/// tasks never share the endpoint itself.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub endpoint_id: String,
    pub url: String,
    pub assert_text: Option<String>,
}

impl ProbeTarget {
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            url: endpoint.url.clone(),
            assert_text: endpoint.assert_text.clone(),
        }
    }
}

/// Immutable probe result. The cycle orchestrator applies it to endpoint
/// state after all probes complete.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub endpoint_id: String,
    pub classification: Classification,
    /// Wall-clock time from request start to terminal outcome, measured
    /// by the probe itself.
    pub latency: Duration,
}

/// Executes health probes over a shared trust-everything HTTP client.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// Build a prober with the given per-request timeout.
    ///
    /// TLS certificate validation is disabled; this is the deliberate
    /// trust-everything policy for monitoring, not a bug.
    pub fn new(timeout: Duration) -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Run one health check. Never fails: every failure shape is captured
    /// as a `Classification`, and no shared state is touched.
    pub async fn probe(&self, target: &ProbeTarget) -> ProbeOutcome {
        let start = Instant::now();
        let classification = self.execute(target).await;
        let latency = start.elapsed();

        debug!(
            endpoint_id = %target.endpoint_id,
            %classification,
            latency_ms = latency.as_millis() as u64,
            "probe finished"
        );

        ProbeOutcome {
            endpoint_id: target.endpoint_id.clone(),
            classification,
            latency,
        }
    }

    async fn execute(&self, target: &ProbeTarget) -> Classification {
        let response = match self.client.get(&target.url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(endpoint_id = %target.endpoint_id, error = %e, "probe request failed");
                return Classification::Transport(transport_cause(&e));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                debug!(endpoint_id = %target.endpoint_id, error = %e, "probe body read failed");
                return Classification::Transport(transport_cause(&e));
            }
        };

        classify(status, &body, target.assert_text.as_deref())
    }
}

/// Short diagnostic string for a transport-level fault.
fn transport_cause(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        return "timeout".to_string();
    }
    // The innermost source carries the useful diagnostic
    // ("connection refused", DNS failure, TLS handshake error).
    let mut cause: &dyn std::error::Error = e;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause.to_string()
}

/// Classify a completed HTTP exchange.
///
/// Non-2xx is a failure carrying the code. A 2xx response is `OK` unless
/// assertion text is configured and the body does not contain it verbatim
/// (case-sensitive substring match).
pub fn classify(status: u16, body: &str, assert_text: Option<&str>) -> Classification {
    if !(200..300).contains(&status) {
        return Classification::BadStatus(status);
    }
    match assert_text {
        Some(text) if !text.is_empty() => {
            if body.contains(text) {
                Classification::Ok
            } else {
                Classification::AssertFailed
            }
        }
        _ => Classification::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_2xx_without_assertion_is_ok() {
        assert_eq!(classify(200, "anything", None), Classification::Ok);
        assert_eq!(classify(204, "", None), Classification::Ok);
    }

    #[test]
    fn classify_non_2xx_carries_the_code() {
        assert_eq!(classify(503, "", None), Classification::BadStatus(503));
        assert_eq!(classify(301, "", None), Classification::BadStatus(301));
        // Status check wins over assertion.
        assert_eq!(
            classify(500, "healthy", Some("healthy")),
            Classification::BadStatus(500)
        );
    }

    #[test]
    fn classify_assertion_match_is_ok() {
        assert_eq!(
            classify(200, "service is healthy", Some("healthy")),
            Classification::Ok
        );
    }

    #[test]
    fn classify_assertion_mismatch_fails() {
        assert_eq!(
            classify(200, "service is down", Some("healthy")),
            Classification::AssertFailed
        );
    }

    #[test]
    fn classify_assertion_is_case_sensitive() {
        assert_eq!(
            classify(200, "service is Healthy", Some("healthy")),
            Classification::AssertFailed
        );
    }

    #[test]
    fn classify_empty_assertion_means_no_assertion() {
        assert_eq!(classify(200, "whatever", Some("")), Classification::Ok);
    }

    #[test]
    fn classification_strings() {
        assert_eq!(Classification::Ok.to_string(), "OK");
        assert_eq!(Classification::AssertFailed.to_string(), "FAIL");
        assert_eq!(Classification::BadStatus(503).to_string(), "FAIL status: 503");
        assert_eq!(
            Classification::Transport("timeout".to_string()).to_string(),
            "FAIL timeout"
        );
    }

    #[tokio::test]
    async fn probe_to_closed_port_is_transport_failure() {
        let prober = Prober::new(Duration::from_millis(500)).unwrap();
        let target = ProbeTarget {
            endpoint_id: "ep-1".to_string(),
            url: "http://127.0.0.1:1/".to_string(),
            assert_text: None,
        };

        let outcome = prober.probe(&target).await;
        assert_eq!(outcome.endpoint_id, "ep-1");
        assert!(matches!(outcome.classification, Classification::Transport(_)));
        assert!(!outcome.classification.is_ok());
    }

    #[tokio::test]
    async fn probe_measures_latency() {
        let prober = Prober::new(Duration::from_millis(200)).unwrap();
        let target = ProbeTarget {
            endpoint_id: "ep-1".to_string(),
            // Non-routable address: the probe runs into its own timeout.
            url: "http://10.255.255.1:81/".to_string(),
            assert_text: None,
        };

        let start = Instant::now();
        let outcome = prober.probe(&target).await;
        assert!(start.elapsed() >= outcome.latency);
        assert!(matches!(outcome.classification, Classification::Transport(_)));
    }
}
