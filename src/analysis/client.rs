use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{AnalysisBackend, AnalysisResult};
use crate::error::{Error, Result};

/// Failure body the service returns on non-2xx answers.
#[derive(Debug, Deserialize)]
struct ServiceFailure {
    error: String,
}

/// HTTP client for the analysis service.
///
/// Uploaded clips go to `POST /analyze_video` as a multipart `video` field,
/// live samples to `POST /analyze_frame` as a multipart `image` field. The
/// request timeout bounds one in-flight call; the subsystem itself imposes
/// none.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    http: Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    async fn decode(response: reqwest::Response) -> Result<AnalysisResult> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<AnalysisResult>().await?);
        }

        let message = response
            .json::<ServiceFailure>()
            .await
            .map(|failure| failure.error)
            .unwrap_or_else(|_| format!("analysis service returned {status}"));
        Err(Error::Service(message))
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn analyze_video(
        &self,
        payload: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<AnalysisResult> {
        let mut form = Form::new().part("video", Part::bytes(payload).file_name("upload.mp4"));
        if let Some(id) = user_id {
            form = form.text("user_id", id.to_string());
        }

        let mut request = self
            .http
            .post(format!("{}/analyze_video", self.base_url))
            .multipart(form);
        if let Some(id) = user_id {
            request = request.header("X-User-ID", id);
        }

        debug!("posting uploaded clip to {}/analyze_video", self.base_url);
        Self::decode(request.send().await?).await
    }

    async fn analyze_frame(&self, payload: Vec<u8>) -> Result<AnalysisResult> {
        let form = Form::new().part("image", Part::bytes(payload).file_name("frame.jpg"));

        let response = self
            .http
            .post(format!("{}/analyze_frame", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            HttpAnalysisClient::new("http://localhost:7001/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:7001");
    }
}
