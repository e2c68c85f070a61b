use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, ErrorInfo};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    Idle,
    UploadPending,
    Monitoring,
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Idle
    }
}

/// Outcome of one settled analysis request.
#[derive(Debug, Clone)]
pub enum Settlement {
    Success(AnalysisResult),
    Failure(ErrorInfo),
}

/// The single authoritative session aggregate: current mode, latest known
/// result, error status and the in-flight request count. Pure data plus
/// transitions; all I/O lives in the controller and dispatcher, which mutate
/// this under one lock so transitions never interleave.
///
/// Settlements carry the epoch they were submitted under; the epoch is bumped
/// on every mode transition, so anything that settles after the session moved
/// on is discarded no matter when its response arrives.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub mode: SessionMode,
    pub latest_result: Option<AnalysisResult>,
    pub last_error: Option<ErrorInfo>,
    pub active_requests: u32,
    epoch: u64,
    /// Submission time of the request behind `latest_result`.
    result_applied_at: Option<DateTime<Utc>>,
    /// Submission time of the request behind `last_error`.
    error_applied_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// `Idle -> UploadPending`. Clears the previous outcome. The controller
    /// stops monitoring before calling this; a racing caller that still sees
    /// `Monitoring` here is rejected rather than silently switched.
    pub fn begin_upload(&mut self) -> Result<u64> {
        match self.mode {
            SessionMode::UploadPending => Err(Error::AlreadyInProgress("upload")),
            SessionMode::Monitoring => Err(Error::AlreadyInProgress("monitoring")),
            SessionMode::Idle => {
                self.mode = SessionMode::UploadPending;
                self.latest_result = None;
                self.last_error = None;
                self.result_applied_at = None;
                self.error_applied_at = None;
                Ok(self.bump())
            }
        }
    }

    /// `Idle | UploadPending -> Monitoring`. An abandoned upload settles into
    /// a stale epoch and is dropped.
    pub fn begin_monitoring(&mut self) -> Result<u64> {
        if self.mode == SessionMode::Monitoring {
            return Err(Error::AlreadyInProgress("monitoring"));
        }
        self.mode = SessionMode::Monitoring;
        Ok(self.bump())
    }

    /// `Monitoring -> Idle`. No-op in any other mode.
    pub fn end_monitoring(&mut self) {
        if self.mode == SessionMode::Monitoring {
            self.mode = SessionMode::Idle;
            self.bump();
        }
    }

    /// Terminal transition: back to `Idle` from anywhere, abandoning whatever
    /// is in flight. Idempotent.
    pub fn teardown(&mut self) {
        self.mode = SessionMode::Idle;
        self.bump();
    }

    /// Record a failure that did not come from a request settlement, e.g.
    /// device acquisition. The mode is left untouched.
    pub fn record_error(&mut self, info: ErrorInfo) {
        self.error_applied_at = Some(info.occurred_at);
        self.last_error = Some(info);
    }

    pub fn request_started(&mut self) {
        self.active_requests += 1;
    }

    fn request_settled(&mut self) {
        debug_assert!(
            self.active_requests > 0,
            "settled more requests than were started"
        );
        self.active_requests = self.active_requests.saturating_sub(1);
    }

    /// Settle the one-shot upload. Returns whether the outcome was applied;
    /// a stale epoch means the upload was abandoned and the payload dropped.
    pub fn settle_upload(
        &mut self,
        outcome: Settlement,
        submitted_at: DateTime<Utc>,
        epoch: u64,
    ) -> bool {
        self.request_settled();
        if self.mode != SessionMode::UploadPending || epoch != self.epoch {
            return false;
        }

        match outcome {
            Settlement::Success(result) => {
                self.latest_result = Some(result);
                self.result_applied_at = Some(submitted_at);
                self.last_error = None;
            }
            Settlement::Failure(info) => {
                // The stale preview result stays; the caller discards it.
                self.error_applied_at = Some(submitted_at);
                self.last_error = Some(info);
            }
        }
        self.mode = SessionMode::Idle;
        self.bump();
        true
    }

    /// Settle a periodic frame request under last-submitted-wins: a response
    /// is applied only if it was submitted no earlier than the one currently
    /// shown. Responses from a run the session already left are discarded
    /// unconditionally. Returns whether the outcome was applied.
    pub fn apply_frame(
        &mut self,
        outcome: Settlement,
        submitted_at: DateTime<Utc>,
        epoch: u64,
    ) -> bool {
        self.request_settled();
        if self.mode != SessionMode::Monitoring || epoch != self.epoch {
            return false;
        }

        match outcome {
            Settlement::Success(result) => {
                if self
                    .result_applied_at
                    .map_or(false, |applied| submitted_at < applied)
                {
                    return false;
                }
                self.latest_result = Some(result);
                self.result_applied_at = Some(submitted_at);
                true
            }
            Settlement::Failure(info) => {
                if self
                    .error_applied_at
                    .map_or(false, |applied| submitted_at < applied)
                {
                    return false;
                }
                self.last_error = Some(info);
                self.error_applied_at = Some(submitted_at);
                true
            }
        }
    }
}
