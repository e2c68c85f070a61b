use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::analysis::{AnalysisBackend, AnalysisRequest, AnalysisResult, ErrorInfo};
use crate::capture::Camera;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::monitor::MonitorController;
use crate::settings::MonitorSettings;

use super::state::{SessionMode, SessionState};

/// Coherent read of the session for a presentation layer.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub latest_result: Option<AnalysisResult>,
    pub last_error: Option<ErrorInfo>,
    pub active_requests: u32,
}

/// Drives one monitoring/upload lifecycle: owns the session state, the
/// dispatcher and the sampler, and maps user commands onto state
/// transitions.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    camera: Arc<dyn Camera>,
    dispatcher: Dispatcher,
    monitor: Arc<Mutex<MonitorController>>,
    metrics: MetricsCollector,
    sample_period: Duration,
}

impl SessionController {
    pub fn new(
        camera: Arc<dyn Camera>,
        backend: Arc<dyn AnalysisBackend>,
        settings: MonitorSettings,
    ) -> Self {
        let state = Arc::new(Mutex::new(SessionState::new()));
        let metrics = MetricsCollector::new();
        let dispatcher = Dispatcher::new(backend, state.clone(), metrics.clone());

        Self {
            state,
            camera,
            dispatcher,
            monitor: Arc::new(Mutex::new(MonitorController::new())),
            metrics,
            sample_period: settings.sample_period(),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            mode: state.mode,
            latest_result: state.latest_result.clone(),
            last_error: state.last_error.clone(),
            active_requests: state.active_requests,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// One-shot upload path. Monitoring, if active, is stopped first; a
    /// second upload while one is pending is rejected with no state change.
    pub async fn start_upload(&self, payload: Vec<u8>, user_id: Option<String>) -> Result<()> {
        let mode = self.state.lock().await.mode;
        match mode {
            SessionMode::UploadPending => return Err(Error::AlreadyInProgress("upload")),
            SessionMode::Monitoring => self.stop_monitoring().await,
            SessionMode::Idle => {}
        }

        let epoch = self.state.lock().await.begin_upload()?;

        let request = AnalysisRequest::video(payload, user_id);
        info!(
            "upload {} submitted ({} bytes)",
            request.id,
            request.payload.len()
        );
        self.dispatcher.submit(request, epoch).await;
        Ok(())
    }

    /// Start the live monitoring path. On camera acquisition failure the
    /// session keeps its prior mode, records the error and returns it.
    pub async fn start_monitoring(&self) -> Result<()> {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_active() {
            return Err(Error::AlreadyInProgress("monitoring"));
        }

        let stream = match self.camera.open().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("camera acquisition failed: {err}");
                self.state
                    .lock()
                    .await
                    .record_error(ErrorInfo::new(err.to_string()));
                return Err(err);
            }
        };

        let epoch = self.state.lock().await.begin_monitoring()?;
        monitor.start(
            stream,
            self.dispatcher.clone(),
            epoch,
            self.sample_period,
            self.metrics.clone(),
        )?;
        info!("monitoring started");
        Ok(())
    }

    /// Stop sampling and release the camera unconditionally; requests still
    /// in flight settle later and are discarded. Safe to call when idle.
    pub async fn stop_monitoring(&self) {
        let mut monitor = self.monitor.lock().await;
        let was_active = monitor.stop().await;

        let mut state = self.state.lock().await;
        state.end_monitoring();
        if was_active {
            info!("monitoring stopped");
        }
    }

    /// Release everything the session holds. Idempotent; any in-flight
    /// settlement is discarded through the epoch bump.
    pub async fn teardown(&self) {
        let mut monitor = self.monitor.lock().await;
        monitor.stop().await;
        self.state.lock().await.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::capture::SyntheticCamera;

    struct StubBackend {
        delay: Duration,
        fail: bool,
        frame_calls: Arc<AtomicU32>,
    }

    impl StubBackend {
        fn instant() -> Self {
            Self::with_delay(Duration::from_millis(1))
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                fail: false,
                frame_calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::instant()
            }
        }

        async fn answer(&self) -> Result<AnalysisResult> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(Error::Service("model offline".into()))
            } else {
                Ok(AnalysisResult {
                    classification: "Wildfire".into(),
                    people_count: 4,
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
            self.frame_calls.fetch_add(1, Ordering::SeqCst);
            self.answer().await
        }
    }

    fn settings(period_ms: u64) -> MonitorSettings {
        MonitorSettings {
            sample_period_ms: period_ms,
            ..MonitorSettings::default()
        }
    }

    fn controller(camera: SyntheticCamera, backend: StubBackend, period_ms: u64) -> SessionController {
        SessionController::new(Arc::new(camera), Arc::new(backend), settings(period_ms))
    }

    #[tokio::test]
    async fn upload_settles_into_idle_with_result() {
        let controller = controller(SyntheticCamera::ready(), StubBackend::instant(), 100);

        controller.start_upload(vec![0; 64], Some("user-1".into())).await.unwrap();
        assert_eq!(controller.snapshot().await.mode, SessionMode::UploadPending);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Idle);
        assert_eq!(snapshot.latest_result.unwrap().classification, "Wildfire");
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.active_requests, 0);
    }

    #[tokio::test]
    async fn second_upload_while_pending_is_rejected() {
        let controller = controller(
            SyntheticCamera::ready(),
            StubBackend::with_delay(Duration::from_millis(200)),
            100,
        );

        controller.start_upload(vec![1], None).await.unwrap();
        let second = controller.start_upload(vec![2], None).await;
        assert!(matches!(second, Err(Error::AlreadyInProgress("upload"))));
        assert_eq!(controller.snapshot().await.mode, SessionMode::UploadPending);
    }

    #[tokio::test]
    async fn upload_failure_reports_and_returns_to_idle() {
        let controller = controller(SyntheticCamera::ready(), StubBackend::failing(), 100);

        controller.start_upload(vec![1], None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Idle);
        assert!(snapshot.latest_result.is_none());
        assert!(snapshot.last_error.unwrap().message.contains("model offline"));
    }

    #[tokio::test]
    async fn monitoring_samples_once_per_period() {
        let backend = StubBackend::instant();
        let frame_calls = backend.frame_calls.clone();
        let controller = controller(SyntheticCamera::ready(), backend, 100);

        controller.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(frame_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(frame_calls.load(Ordering::SeqCst), 2);

        controller.stop_monitoring().await;
    }

    #[tokio::test]
    async fn frame_failure_keeps_sampling() {
        let backend = StubBackend::failing();
        let frame_calls = backend.frame_calls.clone();
        let controller = controller(SyntheticCamera::ready(), backend, 60);

        controller.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Monitoring);
        assert!(snapshot.last_error.is_some());
        assert!(frame_calls.load(Ordering::SeqCst) >= 2);

        controller.stop_monitoring().await;
    }

    #[tokio::test]
    async fn late_response_after_stop_is_discarded() {
        let controller = controller(
            SyntheticCamera::ready(),
            StubBackend::with_delay(Duration::from_millis(300)),
            100,
        );

        controller.start_monitoring().await.unwrap();
        // One request goes out at ~100ms and is still in flight at 150ms.
        tokio::time::sleep(Duration::from_millis(150)).await;
        controller.stop_monitoring().await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Idle);
        assert!(snapshot.latest_result.is_none());
        assert_eq!(snapshot.active_requests, 0);
    }

    #[tokio::test]
    async fn denied_camera_keeps_prior_mode() {
        let camera = SyntheticCamera {
            deny_permission: true,
            ..SyntheticCamera::default()
        };
        let controller = controller(camera, StubBackend::instant(), 100);

        let outcome = controller.start_monitoring().await;
        assert!(matches!(outcome, Err(Error::Device(_))));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Idle);
        assert!(snapshot.last_error.unwrap().message.contains("permission denied"));
    }

    #[tokio::test]
    async fn second_start_monitoring_is_rejected() {
        let controller = controller(SyntheticCamera::ready(), StubBackend::instant(), 100);

        controller.start_monitoring().await.unwrap();
        assert!(matches!(
            controller.start_monitoring().await,
            Err(Error::AlreadyInProgress("monitoring"))
        ));

        controller.stop_monitoring().await;
    }

    #[tokio::test]
    async fn upload_while_monitoring_stops_the_sampler() {
        let backend = StubBackend::instant();
        let frame_calls = backend.frame_calls.clone();
        let controller = controller(SyntheticCamera::ready(), backend, 60);

        controller.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        controller.start_upload(vec![9], None).await.unwrap();
        // Let already-spawned dispatch tasks drain before taking the count.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let sampled = frame_calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(frame_calls.load(Ordering::SeqCst), sampled);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.mode, SessionMode::Idle);
        assert_eq!(snapshot.latest_result.unwrap().classification, "Wildfire");
    }

    #[tokio::test]
    async fn stop_and_teardown_are_idempotent() {
        let controller = controller(SyntheticCamera::ready(), StubBackend::instant(), 100);

        controller.stop_monitoring().await;
        controller.teardown().await;

        controller.start_monitoring().await.unwrap();
        controller.teardown().await;
        controller.teardown().await;
        assert_eq!(controller.snapshot().await.mode, SessionMode::Idle);
    }
}
