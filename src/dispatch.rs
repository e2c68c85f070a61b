//! Sends analysis requests to the external service and routes settlements
//! back onto the session state.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::analysis::{AnalysisBackend, AnalysisRequest, ErrorInfo, RequestKind};
use crate::metrics::{MetricsCollector, RequestMetrics, RequestOutcome};
use crate::session::{SessionState, Settlement};

pub type SharedState = Arc<Mutex<SessionState>>;

/// Fires requests at the analysis backend without blocking the caller and
/// publishes whatever comes back. In-flight frame requests may overlap
/// freely; the sampling period is the only backpressure.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn AnalysisBackend>,
    state: SharedState,
    metrics: MetricsCollector,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        state: SharedState,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            backend,
            state,
            metrics,
        }
    }

    /// Fire one request. Returns as soon as the in-flight counter is bumped;
    /// the epoch pins the settlement to the session mode it was submitted
    /// under.
    pub async fn submit(&self, request: AnalysisRequest, epoch: u64) {
        self.state.lock().await.request_started();
        self.metrics.record_submitted().await;

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.settle(request, epoch).await;
        });
    }

    async fn settle(self, request: AnalysisRequest, epoch: u64) {
        let AnalysisRequest {
            id,
            payload,
            kind,
            user_id,
            submitted_at,
        } = request;

        let started = Instant::now();
        let answer = match kind {
            RequestKind::Frame => self.backend.analyze_frame(payload).await,
            RequestKind::Video => self.backend.analyze_video(payload, user_id.as_deref()).await,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let failed = answer.is_err();
        let settlement = match answer {
            Ok(result) => Settlement::Success(result),
            Err(err) => {
                warn!("analysis request {id} failed after {latency_ms}ms: {err}");
                Settlement::Failure(ErrorInfo::new(err.to_string()))
            }
        };

        let applied = {
            let mut state = self.state.lock().await;
            match kind {
                RequestKind::Frame => state.apply_frame(settlement, submitted_at, epoch),
                RequestKind::Video => state.settle_upload(settlement, submitted_at, epoch),
            }
        };

        let outcome = if !applied {
            debug!("request {id} settled after the session moved on; outcome dropped");
            RequestOutcome::Discarded
        } else if failed {
            RequestOutcome::Failed
        } else {
            RequestOutcome::Applied
        };

        self.metrics
            .record_settled(RequestMetrics {
                kind,
                submitted_at,
                latency_ms,
                outcome,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::error::{Error, Result};

    struct StubBackend {
        delay: Duration,
        fail: bool,
        calls: AtomicU32,
    }

    impl StubBackend {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                delay,
                fail,
                calls: AtomicU32::new(0),
            }
        }

        async fn answer(&self) -> Result<AnalysisResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(Error::Service("stub failure".into()))
            } else {
                Ok(AnalysisResult {
                    classification: "Flood".into(),
                    people_count: 2,
                    analyst_report: None,
                })
            }
        }
    }

    #[async_trait]
    impl AnalysisBackend for StubBackend {
        async fn analyze_video(
            &self,
            _payload: Vec<u8>,
            _user_id: Option<&str>,
        ) -> Result<AnalysisResult> {
            self.answer().await
        }

        async fn analyze_frame(&self, _payload: Vec<u8>) -> Result<AnalysisResult> {
            self.answer().await
        }
    }

    fn harness(backend: StubBackend) -> (Dispatcher, SharedState) {
        let state: SharedState = Arc::new(Mutex::new(SessionState::new()));
        let dispatcher = Dispatcher::new(Arc::new(backend), state.clone(), MetricsCollector::new());
        (dispatcher, state)
    }

    #[tokio::test]
    async fn counter_rises_and_drains() {
        let (dispatcher, state) = harness(StubBackend::new(Duration::from_millis(50), false));

        let epoch = state.lock().await.begin_monitoring().unwrap();
        dispatcher.submit(AnalysisRequest::frame(vec![1]), epoch).await;
        dispatcher.submit(AnalysisRequest::frame(vec![2]), epoch).await;
        assert_eq!(state.lock().await.active_requests, 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let state = state.lock().await;
        assert_eq!(state.active_requests, 0);
        assert_eq!(
            state.latest_result.as_ref().unwrap().classification,
            "Flood"
        );
    }

    #[tokio::test]
    async fn failure_lands_as_last_error() {
        let (dispatcher, state) = harness(StubBackend::new(Duration::from_millis(10), true));

        let epoch = state.lock().await.begin_monitoring().unwrap();
        dispatcher.submit(AnalysisRequest::frame(vec![1]), epoch).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = state.lock().await;
        assert_eq!(state.active_requests, 0);
        assert!(state.latest_result.is_none());
        assert!(state
            .last_error
            .as_ref()
            .unwrap()
            .message
            .contains("stub failure"));
    }
}
