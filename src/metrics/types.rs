use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::RequestKind;

/// How one analysis request ended up.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RequestOutcome {
    /// The result landed on the session.
    Applied,
    /// The service call failed and the failure landed on the session.
    Failed,
    /// Settled after the session moved on; outcome dropped.
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetrics {
    pub kind: RequestKind,
    pub submitted_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub outcome: RequestOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_requests: Vec<RequestMetrics>,
    pub submitted_count: u64,
    pub applied_count: u64,
    pub failed_count: u64,
    pub discarded_count: u64,
    pub skipped_tick_count: u64,
}
