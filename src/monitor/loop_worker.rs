use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisRequest;
use crate::capture::{encode_jpeg, CaptureHandle};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Periodic sampling over one open capture stream.
///
/// Ticks stay on a fixed wall-clock cadence regardless of how long the
/// analysis of earlier frames takes; slow responses simply overlap. The
/// stream is owned by this loop and released on every exit path.
pub async fn sampling_loop(
    mut stream: CaptureHandle,
    dispatcher: Dispatcher,
    epoch: u64,
    period: Duration,
    cancel_token: CancellationToken,
    metrics: MetricsCollector,
) {
    // First sample lands one full period after start.
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sample_once(&mut stream, &dispatcher, epoch).await {
                    Ok(true) => {}
                    Ok(false) => {
                        // Device warm-up; not an error.
                        log_debug!("frame not ready, skipping tick");
                        metrics.record_skipped_tick().await;
                    }
                    Err(err) => log_error!("frame sample failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
        }
    }

    stream.release();
}

/// Grab, encode and submit one frame. `Ok(false)` means the device had no
/// frame yet and the tick was skipped.
async fn sample_once(
    stream: &mut CaptureHandle,
    dispatcher: &Dispatcher,
    epoch: u64,
) -> Result<bool> {
    let frame = match stream.current_frame().await {
        Ok(frame) => frame,
        Err(Error::FrameNotReady) => return Ok(false),
        Err(err) => return Err(err),
    };

    let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&frame))
        .await
        .map_err(|err| Error::Device(format!("encode worker join failed: {err}")))??;

    dispatcher
        .submit(AnalysisRequest::frame(jpeg), epoch)
        .await;
    Ok(true)
}
