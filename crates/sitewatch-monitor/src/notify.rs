//! Notifier and template-renderer seams.
//!
//! Outbound delivery (mail, chat, webhooks) lives behind the `Notifier`
//! trait; the core only decides *when* to alert and supplies the rendered
//! message. `LogNotifier` ships as the in-tree implementation so a bare
//! daemon still surfaces alerts in its logs.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Error from an alert dispatch attempt.
#[derive(Debug, Error)]
#[error("alert dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound alert delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert to the given recipients.
    async fn send_alert(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

/// Renders an alert message body from the three values the core supplies.
pub trait RenderTemplate: Send + Sync {
    fn render(&self, timestamp: &str, status_description: &str, status: &str) -> String;
}

/// Notifier that writes alerts to the tracing log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        info!(?recipients, subject, %body, "alert");
        Ok(())
    }
}

/// Plain-text message template.
pub struct TextTemplate;

impl RenderTemplate for TextTemplate {
    fn render(&self, timestamp: &str, status_description: &str, status: &str) -> String {
        format!("{timestamp}\n{status_description}\nstatus: {status}\n")
    }
}

/// Split an endpoint's notify field into recipients.
///
/// Comma-separated, whitespace-trimmed; blank entries are dropped. An
/// empty result means "never notify" and is not an error.
pub fn split_recipients(notify: &str) -> Vec<String> {
    notify
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_split_on_commas_and_trimmed() {
        assert_eq!(
            split_recipients("a@example.com, b@example.com ,c@example.com"),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn blank_notify_field_yields_no_recipients() {
        assert!(split_recipients("").is_empty());
        assert!(split_recipients("  ").is_empty());
        assert!(split_recipients(",,").is_empty());
    }

    #[test]
    fn text_template_carries_all_three_values() {
        let body = TextTemplate.render("2026-08-29 12:00:00", "api FAIL status: 503", "FAIL status: 503");
        assert!(body.contains("2026-08-29 12:00:00"));
        assert!(body.contains("api FAIL status: 503"));
        assert!(body.contains("status: FAIL status: 503"));
    }
}
