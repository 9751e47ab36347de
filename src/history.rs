//! Bounded per-endpoint status history and uptime derivation

use crate::status::{EndpointStatus, round2};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Uptime percentage over a history slice, 100.0 when the slice is empty
pub fn uptime_percentage(history: &[EndpointStatus]) -> f64 {
    if history.is_empty() {
        return 100.0;
    }

    let healthy = history.iter().filter(|s| s.is_healthy()).count();
    round2((healthy as f64 / history.len() as f64) * 100.0)
}

/// Thread-safe store of recent outcomes, keyed by endpoint name
///
/// Entries are kept in insertion order (chronological) and evicted lazily on
/// every append once they age past the retention window.
#[derive(Debug)]
pub struct HistoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<EndpointStatus>>>>,
    retention: Duration,
}

impl HistoryStore {
    pub fn new(retention_hours: i64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            retention: Duration::hours(retention_hours),
        }
    }

    /// Append one outcome and evict entries older than the retention window
    pub async fn record(&self, status: EndpointStatus) {
        self.record_at(status, Utc::now()).await;
    }

    /// Append with an explicit "now", the eviction reference point
    pub async fn record_at(&self, status: EndpointStatus, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let mut entries = self.entries.write().await;
        let history = entries.entry(status.name.clone()).or_default();

        history.push(status);

        let stale = history.iter().take_while(|s| s.timestamp <= cutoff).count();
        if stale > 0 {
            history.drain(..stale);
            debug!("Evicted {} stale history entries", stale);
        }
    }

    /// Uptime percentage for one endpoint, 100.0 when nothing is recorded yet
    pub async fn uptime(&self, name: &str) -> f64 {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .map(|history| uptime_percentage(history))
            .unwrap_or(100.0)
    }

    /// Chronological history for one endpoint, most-recent-last
    pub async fn history(&self, name: &str) -> Vec<EndpointStatus> {
        let entries = self.entries.read().await;
        entries.get(name).cloned().unwrap_or_default()
    }
}
