//! Persistence and metrics collaborator surfaces

use crate::errors::Result;
use crate::status::{AlertKind, AlertRecord, EndpointStatus};
use async_trait::async_trait;
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

/// Best-effort storage for statuses and alerts; failures are logged by the
/// caller, never propagated into the sweep
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save_status(&self, status: &EndpointStatus) -> Result<()>;
    async fn save_alert(&self, record: &AlertRecord) -> Result<()>;
}

/// Severity attached to persisted alerts
pub fn alert_severity(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Downtime => "critical",
        AlertKind::SslExpiry => "high",
        AlertKind::SlowResponse => "medium",
        AlertKind::Recovery => "info",
    }
}

/// Default sink: records to the structured log only
pub struct LogPersistence;

#[async_trait]
impl PersistenceSink for LogPersistence {
    async fn save_status(&self, status: &EndpointStatus) -> Result<()> {
        debug!("Saved status for {}: {}", status.name, status.state);
        Ok(())
    }

    async fn save_alert(&self, record: &AlertRecord) -> Result<()> {
        debug!(
            "Saved {} ({}) alert for {}",
            record.kind(),
            alert_severity(record.kind()),
            record.endpoint
        );
        Ok(())
    }
}

/// Per-endpoint health, latency and uptime gauges with Prometheus export
#[derive(Debug)]
pub struct MetricsRecorder {
    registry: Registry,
    endpoint_up: IntGaugeVec,
    response_time_ms: GaugeVec,
    uptime_percentage: GaugeVec,
}

impl MetricsRecorder {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let endpoint_up = IntGaugeVec::new(
            Opts::new(
                "endpoint_status",
                "Endpoint health status (1=healthy, 0=unhealthy)",
            ),
            &["name", "url"],
        )?;
        registry.register(Box::new(endpoint_up.clone()))?;

        let response_time_ms = GaugeVec::new(
            Opts::new(
                "endpoint_response_time_ms",
                "Endpoint response time in milliseconds",
            ),
            &["name", "url"],
        )?;
        registry.register(Box::new(response_time_ms.clone()))?;

        let uptime_percentage = GaugeVec::new(
            Opts::new("endpoint_uptime_percentage", "Endpoint uptime percentage"),
            &["name", "url"],
        )?;
        registry.register(Box::new(uptime_percentage.clone()))?;

        Ok(Self {
            registry,
            endpoint_up,
            response_time_ms,
            uptime_percentage,
        })
    }

    /// Refresh gauges from one sweep's enriched statuses
    pub fn update(&self, statuses: &[EndpointStatus]) {
        for status in statuses {
            let labels = &[status.name.as_str(), status.url.as_str()];

            self.endpoint_up
                .with_label_values(labels)
                .set(if status.is_healthy() { 1 } else { 0 });

            if let Some(ms) = status.response_time_ms {
                self.response_time_ms.with_label_values(labels).set(ms);
            }

            if let Some(uptime) = status.uptime_percentage {
                self.uptime_percentage.with_label_values(labels).set(uptime);
            }
        }
    }

    /// Prometheus text exposition of the current gauges
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer)
            .map_err(|e| crate::errors::MonitorError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::HealthState;
    use chrono::Utc;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(alert_severity(AlertKind::Downtime), "critical");
        assert_eq!(alert_severity(AlertKind::Recovery), "info");
        assert_eq!(alert_severity(AlertKind::SslExpiry), "high");
        assert_eq!(alert_severity(AlertKind::SlowResponse), "medium");
    }

    #[test]
    fn test_metrics_update_and_export() {
        let recorder = MetricsRecorder::new().unwrap();

        let mut healthy = EndpointStatus::new(
            "GitHub API",
            "https://api.github.com",
            HealthState::Healthy,
            Utc::now(),
        )
        .with_status_code(200)
        .with_response_time(120.0);
        healthy.uptime_percentage = Some(99.5);

        let down = EndpointStatus::new(
            "Staging",
            "http://staging.example.com",
            HealthState::Timeout,
            Utc::now(),
        )
        .with_error("request timeout");

        recorder.update(&[healthy, down]);

        let text = recorder.export().unwrap();
        assert!(text.contains("endpoint_status"));
        assert!(text.contains("endpoint_response_time_ms"));
        assert!(text.contains("endpoint_uptime_percentage"));
        assert!(text.contains("GitHub API"));
    }

    #[tokio::test]
    async fn test_log_persistence_is_infallible() {
        let sink = LogPersistence;
        let status = EndpointStatus::new(
            "api",
            "https://example.com",
            HealthState::Healthy,
            Utc::now(),
        );

        assert!(sink.save_status(&status).await.is_ok());
    }
}
