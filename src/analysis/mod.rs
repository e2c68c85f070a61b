//! Wire types and client for the external analysis service.

pub mod client;
pub mod types;

pub use client::HttpAnalysisClient;
pub use types::{AnalysisRequest, AnalysisResult, AnalystReport, ErrorInfo, RequestKind};

use async_trait::async_trait;

use crate::error::Result;

/// The external analysis service as seen from the dispatcher. Both calls may
/// fail with a transport error or a service-reported message.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// One-shot upload path.
    async fn analyze_video(
        &self,
        payload: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<AnalysisResult>;

    /// Periodic live-frame path.
    async fn analyze_frame(&self, payload: Vec<u8>) -> Result<AnalysisResult>;
}
