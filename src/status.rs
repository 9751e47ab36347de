//! Status and alert data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification of a single probe
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Timeout,
    Error,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
            HealthState::Timeout => write!(f, "timeout"),
            HealthState::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for HealthState {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "healthy" | "up" | "ok" => HealthState::Healthy,
            "unhealthy" | "down" => HealthState::Unhealthy,
            "timeout" | "timedout" => HealthState::Timeout,
            _ => HealthState::Error,
        }
    }
}

/// Result of probing one endpoint once
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EndpointStatus {
    pub name: String,
    pub url: String,
    pub state: HealthState,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub ssl_valid: Option<bool>,
    pub ssl_expires: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Start-of-probe timestamp
    pub timestamp: DateTime<Utc>,
    /// Filled in after the history update, unknown at probe time
    pub uptime_percentage: Option<f64>,
}

impl EndpointStatus {
    pub fn new(name: &str, url: &str, state: HealthState, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            state,
            status_code: None,
            response_time_ms: None,
            ssl_valid: None,
            ssl_expires: None,
            error: None,
            timestamp,
            uptime_percentage: None,
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_response_time(mut self, millis: f64) -> Self {
        self.response_time_ms = Some(millis);
        self
    }

    pub fn with_ssl(mut self, valid: bool, expires: DateTime<Utc>) -> Self {
        self.ssl_valid = Some(valid);
        self.ssl_expires = Some(expires);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Kind of a raised alert
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Downtime,
    Recovery,
    SlowResponse,
    SslExpiry,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Downtime => write!(f, "downtime"),
            AlertKind::Recovery => write!(f, "recovery"),
            AlertKind::SlowResponse => write!(f, "slow_response"),
            AlertKind::SslExpiry => write!(f, "ssl_expiry"),
        }
    }
}

/// Kind-specific alert payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertDetails {
    Downtime {
        state: HealthState,
        error: Option<String>,
        consecutive_failures: u32,
    },
    Recovery {
        response_time_ms: Option<f64>,
    },
    SlowResponse {
        response_time_ms: f64,
        threshold_ms: f64,
    },
    SslExpiry {
        expires: DateTime<Utc>,
        days_until_expiry: i64,
    },
}

impl AlertDetails {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertDetails::Downtime { .. } => AlertKind::Downtime,
            AlertDetails::Recovery { .. } => AlertKind::Recovery,
            AlertDetails::SlowResponse { .. } => AlertKind::SlowResponse,
            AlertDetails::SslExpiry { .. } => AlertKind::SslExpiry,
        }
    }
}

/// One raised alert, never mutated after creation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub endpoint: String,
    pub fired_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: AlertDetails,
}

impl AlertRecord {
    pub fn new(endpoint: &str, fired_at: DateTime<Utc>, details: AlertDetails) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            fired_at,
            details,
        }
    }

    pub fn kind(&self) -> AlertKind {
        self.details.kind()
    }
}

/// Published result of one completed sweep
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepSnapshot {
    pub sweep_id: String,
    pub timestamp: DateTime<Utc>,
    pub statuses: Vec<EndpointStatus>,
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub unhealthy_endpoints: usize,
}

impl SweepSnapshot {
    pub fn new(sweep_id: String, statuses: Vec<EndpointStatus>) -> Self {
        let total_endpoints = statuses.len();
        let healthy_endpoints = statuses.iter().filter(|s| s.is_healthy()).count();

        Self {
            sweep_id,
            timestamp: Utc::now(),
            total_endpoints,
            healthy_endpoints,
            unhealthy_endpoints: total_endpoints - healthy_endpoints,
            statuses,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new())
    }
}

/// Round to two decimal places, the precision used for latency and uptime
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_state_from_str() {
        assert_eq!(HealthState::from("healthy"), HealthState::Healthy);
        assert_eq!(HealthState::from("DOWN"), HealthState::Unhealthy);
        assert_eq!(HealthState::from("timeout"), HealthState::Timeout);
        assert_eq!(HealthState::from("anything else"), HealthState::Error);
    }

    #[test]
    fn test_health_state_serializes_lowercase() {
        let json = serde_json::to_string(&HealthState::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
    }

    #[test]
    fn test_status_builders() {
        let status = EndpointStatus::new(
            "GitHub API",
            "https://api.github.com",
            HealthState::Unhealthy,
            Utc::now(),
        )
        .with_status_code(500)
        .with_response_time(120.0)
        .with_error("expected 200, got 500");

        assert_eq!(status.status_code, Some(500));
        assert_eq!(status.response_time_ms, Some(120.0));
        assert_eq!(status.error.as_deref(), Some("expected 200, got 500"));
        assert!(!status.is_healthy());
        assert!(status.uptime_percentage.is_none());
    }

    #[test]
    fn test_alert_record_kind_and_tag() {
        let record = AlertRecord::new(
            "GitHub API",
            Utc::now(),
            AlertDetails::SlowResponse {
                response_time_ms: 7500.0,
                threshold_ms: 5000.0,
            },
        );

        assert_eq!(record.kind(), AlertKind::SlowResponse);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "slow_response");
        assert_eq!(json["endpoint"], "GitHub API");
    }

    #[test]
    fn test_snapshot_counts() {
        let now = Utc::now();
        let statuses = vec![
            EndpointStatus::new("a", "http://a", HealthState::Healthy, now),
            EndpointStatus::new("b", "http://b", HealthState::Timeout, now),
            EndpointStatus::new("c", "http://c", HealthState::Healthy, now),
        ];

        let snapshot = SweepSnapshot::new("sweep-1".to_string(), statuses);
        assert_eq!(snapshot.total_endpoints, 3);
        assert_eq!(snapshot.healthy_endpoints, 2);
        assert_eq!(snapshot.unhealthy_endpoints, 1);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }
}
