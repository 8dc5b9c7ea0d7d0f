use std::collections::BTreeMap;
use std::time::SystemTime;
use serde::{Serialize, Deserialize};
use crate::oracle::gate::GateStats;

/// Snapshot for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub uptime_secs: u64,
    pub start_time: SystemTime,

    // Entry count per map
    pub indices: BTreeMap<String, u64>,

    // Validation oracle
    pub gate: GateStats,
    pub oracle_configured: bool,
    pub cached_extractions: usize,
}

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
