//! Sweep orchestrator tying the prober, history, alerts and sinks together

use crate::alerts::AlertEngine;
use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::history::HistoryStore;
use crate::notify::{NotificationSink, NotifyDispatcher, NullNotifier, SlackNotifier};
use crate::prober::Prober;
use crate::sinks::{LogPersistence, MetricsRecorder, PersistenceSink};
use crate::status::{AlertRecord, EndpointStatus, SweepSnapshot};
use futures::stream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::time::interval;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Periodic monitor over the configured endpoint set
///
/// One instance owns the prober, the bounded status history, the alert
/// engine and the collaborator sinks. Sweeps mutate state only from the
/// orchestrating task; reads are safe at any time.
pub struct Monitor {
    config: Config,
    monitor_id: String,
    prober: Prober,
    history: HistoryStore,
    alerts: RwLock<AlertEngine>,
    dispatcher: NotifyDispatcher,
    persistence: Arc<dyn PersistenceSink>,
    metrics: MetricsRecorder,
    snapshot: RwLock<SweepSnapshot>,
}

impl Monitor {
    /// Build a monitor with the default sinks (Slack when a webhook is
    /// configured, log-only persistence)
    pub fn new(config: Config) -> Result<Self> {
        let notifier: Arc<dyn NotificationSink> = if config.slack_webhook_url.is_empty() {
            Arc::new(NullNotifier)
        } else {
            Arc::new(SlackNotifier::new(
                config.slack_webhook_url.clone(),
                config.notify_timeout,
            )?)
        };

        Self::with_sinks(config, notifier, Arc::new(LogPersistence))
    }

    /// Build a monitor with explicit collaborator sinks
    pub fn with_sinks(
        config: Config,
        notifier: Arc<dyn NotificationSink>,
        persistence: Arc<dyn PersistenceSink>,
    ) -> Result<Self> {
        config.validate().map_err(MonitorError::Config)?;

        Ok(Self {
            monitor_id: Uuid::new_v4().to_string(),
            prober: Prober::new()?,
            history: HistoryStore::new(config.retention_hours),
            alerts: RwLock::new(AlertEngine::new(&config)),
            dispatcher: NotifyDispatcher::spawn(notifier),
            persistence,
            metrics: MetricsRecorder::new()?,
            snapshot: RwLock::new(SweepSnapshot::empty()),
            config,
        })
    }

    /// Probe every configured endpoint once and feed the results through
    /// history, alerting and the sinks
    #[instrument(skip(self), fields(monitor_id = %self.monitor_id))]
    pub async fn run_sweep(&self) -> Result<Vec<EndpointStatus>> {
        let sweep_id = Uuid::new_v4().to_string();

        // Concurrent fan-out with a bounded number of in-flight probes; a
        // hanging endpoint only costs its own timeout.
        let probes: Vec<_> = self
            .config
            .endpoints
            .iter()
            .map(|endpoint| self.prober.probe(endpoint))
            .collect();
        let outcomes: Vec<EndpointStatus> = stream::iter(probes)
            .buffer_unordered(self.config.max_concurrent_probes)
            .collect()
            .await;

        let mut enriched = Vec::with_capacity(outcomes.len());
        for mut status in outcomes {
            self.history.record(status.clone()).await;
            status.uptime_percentage = Some(self.history.uptime(&status.name).await);
            enriched.push(status);
        }

        let emitted = {
            let mut engine = self.alerts.write().await;
            engine.process(&enriched)
        };
        self.forward_alerts(emitted).await;

        self.metrics.update(&enriched);

        for status in &enriched {
            if let Err(e) = self.persistence.save_status(status).await {
                error!("Failed to persist status for {}: {}", status.name, e);
            }
        }

        let snapshot = SweepSnapshot::new(sweep_id, enriched.clone());
        info!(
            "Swept {} endpoints, {} healthy",
            snapshot.total_endpoints, snapshot.healthy_endpoints
        );
        *self.snapshot.write().await = snapshot;

        Ok(enriched)
    }

    async fn forward_alerts(&self, emitted: Vec<AlertRecord>) {
        for record in emitted {
            if let Err(e) = self.persistence.save_alert(&record).await {
                error!("Failed to persist alert for {}: {}", record.endpoint, e);
            }
            self.dispatcher.dispatch(record);
        }
    }

    /// Run sweeps on the configured interval until the shutdown signal flips
    #[instrument(skip(self, shutdown), fields(monitor_id = %self.monitor_id))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Monitoring {} endpoints every {:?}",
            self.config.endpoints.len(),
            self.config.check_interval
        );

        let mut ticker = interval(self.config.check_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_sweep().await {
                        // A bad sweep never terminates the loop
                        error!("Sweep failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
            }
        }
    }

    /// Uptime percentage for one endpoint over the retention window
    pub async fn uptime(&self, name: &str) -> f64 {
        self.history.uptime(name).await
    }

    /// Chronological status history for one endpoint
    pub async fn history(&self, name: &str) -> Vec<EndpointStatus> {
        self.history.history(name).await
    }

    /// Alert records for one endpoint, or all endpoints newest-first
    pub async fn alert_history(&self, name: Option<&str>) -> Vec<AlertRecord> {
        self.alerts.read().await.alert_history(name)
    }

    /// The most recently published sweep result
    pub async fn snapshot(&self) -> SweepSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Prometheus text exposition of the per-endpoint gauges
    pub fn export_metrics(&self) -> Result<String> {
        self.metrics.export()
    }
}
