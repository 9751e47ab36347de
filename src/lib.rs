//! HTTP Endpoint Health Monitor
//!
//! This library periodically probes configured HTTP endpoints, keeps a
//! bounded status history for uptime computation, and raises rate-limited
//! alerts on downtime, recovery, slow responses and impending certificate
//! expiry.

pub mod config;
pub mod monitor;
pub mod prober;
pub mod history;
pub mod alerts;
pub mod notify;
pub mod sinks;
pub mod status;
pub mod errors;

pub use config::{Config, EndpointConfig};
pub use monitor::Monitor;
pub use status::{
    AlertDetails, AlertKind, AlertRecord, EndpointStatus, HealthState, SweepSnapshot,
};
pub use errors::{MonitorError, Result};
