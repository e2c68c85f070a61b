mod types;

pub use types::{MetricsSnapshot, RequestMetrics, RequestOutcome, SystemMetrics};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_REQUESTS: usize = 20;

/// Rolling view of request lifecycle counts plus CPU/RSS of the own process.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_requests: Vec<RequestMetrics>,
    submitted_count: u64,
    applied_count: u64,
    failed_count: u64,
    discarded_count: u64,
    skipped_tick_count: u64,
    system: System,
    pid: Pid,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_requests: Vec::with_capacity(MAX_RECENT_REQUESTS),
                submitted_count: 0,
                applied_count: 0,
                failed_count: 0,
                discarded_count: 0,
                skipped_tick_count: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_submitted(&self) {
        self.inner.lock().await.submitted_count += 1;
    }

    /// A sampler tick that found no frame ready.
    pub async fn record_skipped_tick(&self) {
        self.inner.lock().await.skipped_tick_count += 1;
    }

    pub async fn record_settled(&self, metrics: RequestMetrics) {
        let mut state = self.inner.lock().await;

        match metrics.outcome {
            RequestOutcome::Applied => state.applied_count += 1,
            RequestOutcome::Failed => state.failed_count += 1,
            RequestOutcome::Discarded => state.discarded_count += 1,
        }

        state.recent_requests.push(metrics);
        if state.recent_requests.len() > MAX_RECENT_REQUESTS {
            state.recent_requests.remove(0);
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        // Refresh to get current CPU/RAM
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system = if let Some(process) = state.system.process(pid) {
            SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            }
        } else {
            SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            }
        };

        MetricsSnapshot {
            system,
            recent_requests: state.recent_requests.clone(),
            submitted_count: state.submitted_count,
            applied_count: state.applied_count,
            failed_count: state.failed_count,
            discarded_count: state.discarded_count,
            skipped_tick_count: state.skipped_tick_count,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
