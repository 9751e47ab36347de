//! Alert de-duplication and escalation engine

use crate::config::Config;
use crate::status::{AlertDetails, AlertKind, AlertRecord, EndpointStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::info;

/// Per-endpoint alert state machine with rate-limited emission
///
/// All suppression and counter state is owned by the instance, so tests and
/// embedders can run independent engines side by side.
#[derive(Debug)]
pub struct AlertEngine {
    threshold: u32,
    slow_response_ms: f64,
    cooldown: Duration,
    ssl_expiry_days: i64,
    consecutive_failures: HashMap<String, u32>,
    last_fired: HashMap<(String, AlertKind), DateTime<Utc>>,
    history: HashMap<String, Vec<AlertRecord>>,
}

impl AlertEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            threshold: config.alert_threshold,
            slow_response_ms: config.slow_response_ms,
            cooldown: Duration::seconds(config.alert_cooldown.as_secs() as i64),
            ssl_expiry_days: config.ssl_expiry_days,
            consecutive_failures: HashMap::new(),
            last_fired: HashMap::new(),
            history: HashMap::new(),
        }
    }

    /// Evaluate one sweep's outcomes, returning the alerts that survived
    /// suppression (already appended to the internal history)
    pub fn process(&mut self, statuses: &[EndpointStatus]) -> Vec<AlertRecord> {
        self.process_at(statuses, Utc::now())
    }

    /// Evaluate with an explicit clock, the seam tests drive time through
    pub fn process_at(&mut self, statuses: &[EndpointStatus], now: DateTime<Utc>) -> Vec<AlertRecord> {
        let mut emitted = Vec::new();

        for status in statuses {
            self.evaluate_downtime(status, now, &mut emitted);
            self.evaluate_slow_response(status, now, &mut emitted);
            self.evaluate_ssl_expiry(status, now, &mut emitted);
        }

        emitted
    }

    fn evaluate_downtime(
        &mut self,
        status: &EndpointStatus,
        now: DateTime<Utc>,
        emitted: &mut Vec<AlertRecord>,
    ) {
        if !status.is_healthy() {
            let failures = self
                .consecutive_failures
                .entry(status.name.clone())
                .or_insert(0);
            *failures += 1;
            let failures = *failures;

            if failures >= self.threshold {
                self.emit(
                    AlertRecord::new(
                        &status.name,
                        now,
                        AlertDetails::Downtime {
                            state: status.state,
                            error: status.error.clone(),
                            consecutive_failures: failures,
                        },
                    ),
                    now,
                    emitted,
                );
            }
        } else {
            // A recovery below the threshold resets the counter silently
            let was_alerting = self
                .consecutive_failures
                .get(&status.name)
                .is_some_and(|&count| count >= self.threshold);

            if was_alerting {
                self.emit(
                    AlertRecord::new(
                        &status.name,
                        now,
                        AlertDetails::Recovery {
                            response_time_ms: status.response_time_ms,
                        },
                    ),
                    now,
                    emitted,
                );
            }

            self.consecutive_failures.insert(status.name.clone(), 0);
        }
    }

    fn evaluate_slow_response(
        &mut self,
        status: &EndpointStatus,
        now: DateTime<Utc>,
        emitted: &mut Vec<AlertRecord>,
    ) {
        let Some(response_time_ms) = status.response_time_ms else {
            return;
        };

        if response_time_ms > self.slow_response_ms {
            self.emit(
                AlertRecord::new(
                    &status.name,
                    now,
                    AlertDetails::SlowResponse {
                        response_time_ms,
                        threshold_ms: self.slow_response_ms,
                    },
                ),
                now,
                emitted,
            );
        }
    }

    fn evaluate_ssl_expiry(
        &mut self,
        status: &EndpointStatus,
        now: DateTime<Utc>,
        emitted: &mut Vec<AlertRecord>,
    ) {
        let Some(expires) = status.ssl_expires else {
            return;
        };

        let days_until_expiry = (expires - now).num_days();
        if days_until_expiry <= self.ssl_expiry_days {
            self.emit(
                AlertRecord::new(
                    &status.name,
                    now,
                    AlertDetails::SslExpiry {
                        expires,
                        days_until_expiry,
                    },
                ),
                now,
                emitted,
            );
        }
    }

    /// Record an emission unless the same (endpoint, kind) fired within the
    /// cool-down window
    fn emit(&mut self, record: AlertRecord, now: DateTime<Utc>, emitted: &mut Vec<AlertRecord>) {
        let key = (record.endpoint.clone(), record.kind());

        if let Some(last) = self.last_fired.get(&key) {
            if now - *last < self.cooldown {
                return;
            }
        }

        self.last_fired.insert(key, now);
        self.history
            .entry(record.endpoint.clone())
            .or_default()
            .push(record.clone());

        info!("Alert raised: {} for {}", record.kind(), record.endpoint);
        emitted.push(record);
    }

    /// Alert history for one endpoint (insertion order), or all endpoints
    /// sorted by fired timestamp descending
    pub fn alert_history(&self, endpoint: Option<&str>) -> Vec<AlertRecord> {
        match endpoint {
            Some(name) => self.history.get(name).cloned().unwrap_or_default(),
            None => {
                let mut all: Vec<AlertRecord> =
                    self.history.values().flatten().cloned().collect();
                all.sort_by(|a, b| b.fired_at.cmp(&a.fired_at));
                all
            }
        }
    }

    #[cfg(test)]
    fn failures(&self, name: &str) -> u32 {
        self.consecutive_failures.get(name).copied().unwrap_or(0)
    }
}
