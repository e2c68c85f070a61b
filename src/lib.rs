pub mod analysis;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod session;
pub mod settings;
mod utils;

pub use analysis::{
    AnalysisBackend, AnalysisRequest, AnalysisResult, AnalystReport, ErrorInfo,
    HttpAnalysisClient, RequestKind,
};
pub use capture::{Camera, CameraStream, CaptureHandle, Frame, SyntheticCamera};
pub use error::{Error, Result};
pub use session::{SessionController, SessionMode, SessionSnapshot};
pub use settings::{MonitorSettings, SettingsStore};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

// Extensions the analysis service accepts for one-shot uploads.
const ALLOWED_UPLOADS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "mp4", "avi", "mov"];

/// Headless runner: wires the synthetic camera and the HTTP analysis client
/// into a session. With `THREATSENSE_VIDEO` set, analyzes that file once;
/// otherwise monitors until ctrl-c, logging a snapshot each period.
pub async fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("ThreatSense core starting up...");

    let settings_path = std::env::var("THREATSENSE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("threatsense.json"));
    let store = SettingsStore::new(settings_path)?;
    let monitor_settings = store.monitor();

    let backend = Arc::new(HttpAnalysisClient::new(
        monitor_settings.service_url.clone(),
        monitor_settings.request_timeout(),
    )?);
    let camera = Arc::new(SyntheticCamera::default());
    let controller = SessionController::new(camera, backend, monitor_settings.clone());

    if let Ok(path) = std::env::var("THREATSENSE_VIDEO") {
        return run_upload(&controller, &path, monitor_settings.user_id).await;
    }

    controller.start_monitoring().await?;
    let period = monitor_settings.sample_period();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(period) => {
                let snapshot = controller.snapshot().await;
                match &snapshot.latest_result {
                    Some(result) => info!(
                        "{}: {} people, {} request(s) in flight",
                        result.classification, result.people_count, snapshot.active_requests
                    ),
                    None => info!("no result yet, {} request(s) in flight", snapshot.active_requests),
                }
                if let Some(err) = &snapshot.last_error {
                    warn!("last error: {}", err.message);
                }
            }
        }
    }

    info!("shutting down");
    controller.teardown().await;
    Ok(())
}

async fn run_upload(
    controller: &SessionController,
    path: &str,
    user_id: Option<String>,
) -> anyhow::Result<()> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    if !matches!(extension.as_deref(), Some(ext) if ALLOWED_UPLOADS.contains(&ext)) {
        anyhow::bail!("unsupported upload type: {path}");
    }

    let payload = std::fs::read(path)?;
    controller.start_upload(payload, user_id).await?;

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let snapshot = controller.snapshot().await;
        if snapshot.mode == SessionMode::Idle && snapshot.active_requests == 0 {
            match snapshot.latest_result {
                Some(result) => {
                    info!(
                        "classification: {} ({} people)",
                        result.classification, result.people_count
                    );
                    if let Some(report) = result.analyst_report {
                        info!(
                            "analyst: severity {}/10 - {}",
                            report.severity_score, report.summary
                        );
                        for action in report.actions {
                            info!("  - {action}");
                        }
                    }
                }
                None => {
                    if let Some(err) = snapshot.last_error {
                        warn!("analysis failed: {}", err.message);
                    }
                }
            }
            return Ok(());
        }
    }
}
