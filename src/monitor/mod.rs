//! Periodic frame sampling bound to one open capture stream.

mod loop_worker;

pub use loop_worker::sampling_loop;

use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureHandle;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;

/// Owns the sampling task for one monitoring run. At most one run is active
/// at a time, which also bounds the session to a single capture handle.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the sampling loop over an open stream. The stream is owned by
    /// the loop from here on and released when it exits.
    pub fn start(
        &mut self,
        stream: CaptureHandle,
        dispatcher: Dispatcher,
        epoch: u64,
        period: Duration,
        metrics: MetricsCollector,
    ) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyInProgress("monitoring"));
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(sampling_loop(
            stream,
            dispatcher,
            epoch,
            period,
            token_clone,
            metrics,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("frame sampler started, one sample every {period:?}");
        Ok(())
    }

    /// Cancel ticking and wait for the loop to exit; no tick fires after this
    /// returns and the capture stream is released. Safe to call when idle.
    /// Returns whether a run was actually stopped.
    pub async fn stop(&mut self) -> bool {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => {
                if let Err(err) = handle.await {
                    error!("sampling loop task failed to join: {err}");
                }
                true
            }
            None => false,
        }
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
