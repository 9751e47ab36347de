//! Configuration management for the endpoint monitor

use crate::errors::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

/// One monitored endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Unique name, the stable identity used everywhere else
    pub name: String,

    /// URL probed with an HTTP GET
    pub url: String,

    /// Status code that counts as healthy
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Inspect the TLS certificate on https endpoints
    #[serde(default = "default_check_ssl")]
    pub check_ssl: bool,
}

fn default_expected_status() -> u16 {
    200
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_check_ssl() -> bool {
    true
}

impl EndpointConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            expected_status: default_expected_status(),
            timeout_secs: default_timeout_secs(),
            check_ssl: default_check_ssl(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interval between sweeps
    pub check_interval: Duration,

    /// Consecutive failures before a downtime alert fires
    pub alert_threshold: u32,

    /// Latency above this many milliseconds raises a slow-response alert
    pub slow_response_ms: f64,

    /// Minimum interval between two alerts of the same kind for one endpoint
    pub alert_cooldown: Duration,

    /// Certificate expiring within this many days raises an ssl-expiry alert
    pub ssl_expiry_days: i64,

    /// Maximum age of a history entry before eviction
    pub retention_hours: i64,

    /// Bound on simultaneous outbound probes per sweep
    pub max_concurrent_probes: usize,

    /// Slack webhook URL, empty disables notifications
    pub slack_webhook_url: String,

    /// Timeout for notification delivery
    pub notify_timeout: Duration,

    /// Endpoints probed each sweep
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            alert_threshold: 2,
            slow_response_ms: 5000.0,
            alert_cooldown: Duration::from_secs(300),
            ssl_expiry_days: 30,
            retention_hours: 24,
            max_concurrent_probes: 20,
            slack_webhook_url: String::new(),
            notify_timeout: Duration::from_secs(10),
            endpoints: default_endpoints(),
        }
    }
}

/// Stock endpoint set used when no endpoints file is given
fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig {
            name: "GitHub API".to_string(),
            url: "https://api.github.com".to_string(),
            expected_status: 200,
            timeout_secs: 10,
            check_ssl: true,
        },
        EndpointConfig {
            name: "JSONPlaceholder".to_string(),
            url: "https://jsonplaceholder.typicode.com/posts".to_string(),
            expected_status: 200,
            timeout_secs: 5,
            check_ssl: true,
        },
        EndpointConfig {
            name: "REST Countries".to_string(),
            url: "https://restcountries.com/v3.1/all".to_string(),
            expected_status: 200,
            timeout_secs: 8,
            check_ssl: true,
        },
    ]
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(interval) = env::var("CHECK_INTERVAL_SECONDS") {
            if let Ok(seconds) = interval.parse::<u64>() {
                config.check_interval = Duration::from_secs(seconds);
            }
        }

        if let Ok(threshold) = env::var("ALERT_THRESHOLD") {
            if let Ok(count) = threshold.parse() {
                config.alert_threshold = count;
            }
        }

        if let Ok(slow) = env::var("SLOW_RESPONSE_MS") {
            if let Ok(millis) = slow.parse() {
                config.slow_response_ms = millis;
            }
        }

        if let Ok(cooldown) = env::var("ALERT_COOLDOWN_SECONDS") {
            if let Ok(seconds) = cooldown.parse::<u64>() {
                config.alert_cooldown = Duration::from_secs(seconds);
            }
        }

        if let Ok(days) = env::var("SSL_EXPIRY_DAYS") {
            if let Ok(days) = days.parse() {
                config.ssl_expiry_days = days;
            }
        }

        if let Ok(hours) = env::var("RETENTION_HOURS") {
            if let Ok(hours) = hours.parse() {
                config.retention_hours = hours;
            }
        }

        if let Ok(limit) = env::var("MAX_CONCURRENT_PROBES") {
            if let Ok(limit) = limit.parse() {
                config.max_concurrent_probes = limit;
            }
        }

        if let Ok(webhook) = env::var("SLACK_WEBHOOK_URL") {
            config.slack_webhook_url = webhook;
        }

        if let Ok(timeout) = env::var("NOTIFY_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.notify_timeout = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Validate the configuration; any error here is fatal at startup
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.check_interval.is_zero() {
            return Err("check_interval must be greater than 0".to_string());
        }

        if self.alert_threshold == 0 {
            return Err("alert_threshold must be greater than 0".to_string());
        }

        if self.retention_hours <= 0 {
            return Err("retention_hours must be greater than 0".to_string());
        }

        if self.max_concurrent_probes == 0 {
            return Err("max_concurrent_probes must be greater than 0".to_string());
        }

        if self.endpoints.is_empty() {
            return Err("at least one endpoint must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.name.is_empty() {
                return Err("endpoint name cannot be empty".to_string());
            }

            if endpoint.url.is_empty() {
                return Err(format!("endpoint '{}' has an empty URL", endpoint.name));
            }

            if !seen.insert(endpoint.name.as_str()) {
                return Err(format!("duplicate endpoint name '{}'", endpoint.name));
            }
        }

        Ok(())
    }
}

/// Load a monitored endpoint list from a JSON file
pub fn load_endpoints_file(path: &Path) -> Result<Vec<EndpointConfig>> {
    let contents = std::fs::read_to_string(path)?;
    let endpoints: Vec<EndpointConfig> = serde_json::from_str(&contents)?;

    if endpoints.is_empty() {
        return Err(MonitorError::Config(format!(
            "endpoints file {} contains no endpoints",
            path.display()
        )));
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.alert_threshold, 2);
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.endpoints.len(), 3);
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = Config::default();
        config.endpoints = vec![
            EndpointConfig::new("api", "https://a.example.com"),
            EndpointConfig::new("api", "https://b.example.com"),
        ];

        let err = config.validate().unwrap_err();
        assert!(err.contains("duplicate endpoint name"));
    }

    #[test]
    fn test_validate_rejects_empty_name_and_url() {
        let mut config = Config::default();
        config.endpoints = vec![EndpointConfig::new("", "https://a.example.com")];
        assert!(config.validate().is_err());

        config.endpoints = vec![EndpointConfig::new("api", "")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_endpoint_list() {
        let mut config = Config::default();
        config.endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_endpoints_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "Internal API", "url": "https://internal.example.com/health"}},
                {{"name": "Staging", "url": "http://staging.example.com", "expected_status": 204, "timeout_secs": 3, "check_ssl": false}}
            ]"#
        )
        .unwrap();

        let endpoints = load_endpoints_file(file.path()).unwrap();
        assert_eq!(endpoints.len(), 2);

        // Omitted fields fall back to defaults
        assert_eq!(endpoints[0].expected_status, 200);
        assert_eq!(endpoints[0].timeout_secs, 10);
        assert!(endpoints[0].check_ssl);

        assert_eq!(endpoints[1].expected_status, 204);
        assert_eq!(endpoints[1].timeout_secs, 3);
        assert!(!endpoints[1].check_ssl);
    }

    #[test]
    fn test_load_endpoints_file_rejects_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();

        assert!(load_endpoints_file(file.path()).is_err());
    }
}
