//! Outbound alert notification sinks and dispatch

use crate::errors::{MonitorError, Result};
use crate::status::{AlertDetails, AlertKind, AlertRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Queue depth for pending notifications; alerts beyond it are dropped
const DISPATCH_QUEUE_SIZE: usize = 64;

/// Pluggable delivery target for raised alerts
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, record: &AlertRecord) -> Result<()>;
}

/// Sink used when no webhook is configured
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn send(&self, record: &AlertRecord) -> Result<()> {
        debug!(
            "Notifications disabled, dropping {} alert for {}",
            record.kind(),
            record.endpoint
        );
        Ok(())
    }
}

/// Slack incoming-webhook notifier
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(webhook_url: String, delivery_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("endpoint_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            webhook_url,
            timeout: delivery_timeout,
        })
    }

    fn attachment_color(kind: AlertKind) -> &'static str {
        match kind {
            AlertKind::Downtime => "#ff0000",
            AlertKind::Recovery => "#00ff00",
            AlertKind::SlowResponse => "#ffaa00",
            AlertKind::SslExpiry => "#ff00ff",
        }
    }

    fn attachment_title(record: &AlertRecord) -> String {
        match record.kind() {
            AlertKind::Downtime => format!("{} is DOWN", record.endpoint),
            AlertKind::Recovery => format!("{} has RECOVERED", record.endpoint),
            AlertKind::SlowResponse => format!("{} is SLOW", record.endpoint),
            AlertKind::SslExpiry => format!("{} SSL expires soon", record.endpoint),
        }
    }

    /// Build the colored-attachment webhook payload
    pub fn format_message(record: &AlertRecord) -> Value {
        let mut fields = Vec::new();

        match &record.details {
            AlertDetails::Downtime {
                state,
                error,
                consecutive_failures,
            } => {
                fields.push(json!({"title": "Status", "value": state.to_string(), "short": true}));
                fields.push(json!({
                    "title": "Consecutive Failures",
                    "value": consecutive_failures.to_string(),
                    "short": true
                }));
                if let Some(error) = error {
                    fields.push(json!({"title": "Error", "value": error, "short": false}));
                }
            }
            AlertDetails::Recovery { response_time_ms } => {
                fields.push(json!({"title": "Status", "value": "healthy", "short": true}));
                if let Some(ms) = response_time_ms {
                    fields.push(json!({
                        "title": "Response Time",
                        "value": format!("{}ms", ms),
                        "short": true
                    }));
                }
            }
            AlertDetails::SlowResponse {
                response_time_ms,
                threshold_ms,
            } => {
                fields.push(json!({
                    "title": "Response Time",
                    "value": format!("{}ms", response_time_ms),
                    "short": true
                }));
                fields.push(json!({
                    "title": "Threshold",
                    "value": format!("{}ms", threshold_ms),
                    "short": true
                }));
            }
            AlertDetails::SslExpiry {
                expires,
                days_until_expiry,
            } => {
                fields.push(json!({
                    "title": "Days Until Expiry",
                    "value": days_until_expiry.to_string(),
                    "short": true
                }));
                fields.push(json!({
                    "title": "Expires",
                    "value": expires.to_rfc3339(),
                    "short": true
                }));
            }
        }

        json!({
            "attachments": [{
                "color": Self::attachment_color(record.kind()),
                "title": Self::attachment_title(record),
                "fields": fields,
                "timestamp": record.fired_at.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn send(&self, record: &AlertRecord) -> Result<()> {
        let message = Self::format_message(record);

        let response = timeout(
            self.timeout,
            self.client.post(&self.webhook_url).json(&message).send(),
        )
        .await
        .map_err(|_| MonitorError::Notify("webhook delivery timed out".to_string()))?
        .map_err(MonitorError::Http)?;

        if !response.status().is_success() {
            return Err(MonitorError::Notify(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Hands alerts to a background worker over a bounded queue so a slow sink
/// never stalls the sweep loop
#[derive(Clone)]
pub struct NotifyDispatcher {
    tx: mpsc::Sender<AlertRecord>,
}

impl NotifyDispatcher {
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertRecord>(DISPATCH_QUEUE_SIZE);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match sink.send(&record).await {
                    Ok(()) => debug!(
                        "Delivered {} alert for {}",
                        record.kind(),
                        record.endpoint
                    ),
                    Err(e) => error!(
                        "Failed to deliver {} alert for {}: {}",
                        record.kind(),
                        record.endpoint,
                        e
                    ),
                }
            }
        });

        Self { tx }
    }

    /// Queue a record for delivery; drops it if the queue is full
    pub fn dispatch(&self, record: AlertRecord) {
        if let Err(e) = self.tx.try_send(record) {
            warn!("Notification queue full, dropping alert: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downtime_record() -> AlertRecord {
        AlertRecord::new(
            "GitHub API",
            Utc::now(),
            AlertDetails::Downtime {
                state: crate::status::HealthState::Unhealthy,
                error: Some("expected 200, got 503".to_string()),
                consecutive_failures: 2,
            },
        )
    }

    #[test]
    fn test_format_message_shape() {
        let message = SlackNotifier::format_message(&downtime_record());
        let attachment = &message["attachments"][0];

        assert_eq!(attachment["color"], "#ff0000");
        assert_eq!(attachment["title"], "GitHub API is DOWN");

        let fields = attachment["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["title"] == "Error"));
        assert!(fields.iter().any(|f| f["title"] == "Consecutive Failures"));
    }

    #[test]
    fn test_format_ssl_expiry_message() {
        let record = AlertRecord::new(
            "GitHub API",
            Utc::now(),
            AlertDetails::SslExpiry {
                expires: Utc::now() + chrono::Duration::days(15),
                days_until_expiry: 15,
            },
        );

        let message = SlackNotifier::format_message(&record);
        let attachment = &message["attachments"][0];
        assert_eq!(attachment["color"], "#ff00ff");
        assert_eq!(attachment["title"], "GitHub API SSL expires soon");
    }

    #[tokio::test]
    async fn test_slack_delivery_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(
            format!("{}/webhook", server.uri()),
            Duration::from_secs(10),
        )
        .unwrap();

        assert!(notifier.send(&downtime_record()).await.is_ok());
    }

    #[tokio::test]
    async fn test_slack_delivery_failure_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier =
            SlackNotifier::new(server.uri(), Duration::from_secs(10)).unwrap();

        assert!(notifier.send(&downtime_record()).await.is_err());
    }

    struct RecordingSink {
        received: Mutex<Vec<AlertRecord>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, record: &AlertRecord) -> Result<()> {
            self.received.lock().await.push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatcher_forwards_to_sink() {
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
        });
        let dispatcher = NotifyDispatcher::spawn(sink.clone());

        dispatcher.dispatch(downtime_record());

        // Give the worker a moment to drain the queue
        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = sink.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].endpoint, "GitHub API");
    }
}
