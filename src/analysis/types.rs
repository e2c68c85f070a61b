use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Narrative risk report attached to a detection by the service's analyst
/// model. Field names follow the service's JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalystReport {
    pub summary: String,
    /// 0 (safe) to 10 (critical).
    pub severity_score: u8,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// One classification answer from the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisResult {
    pub classification: String,
    #[serde(default)]
    pub people_count: u32,
    #[serde(default)]
    pub analyst_report: Option<AnalystReport>,
}

impl AnalysisResult {
    pub fn is_normal(&self) -> bool {
        self.classification == "Normal"
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Frame,
    Video,
}

/// One unit of work for the dispatcher. Built once, never mutated; exactly
/// one settlement (result or error) corresponds to it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub payload: Vec<u8>,
    pub kind: RequestKind,
    pub user_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl AnalysisRequest {
    /// A periodic live-frame sample.
    pub fn frame(payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            kind: RequestKind::Frame,
            user_id: None,
            submitted_at: Utc::now(),
        }
    }

    /// A one-shot uploaded clip.
    pub fn video(payload: Vec<u8>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            kind: RequestKind::Video,
            user_id,
            submitted_at: Utc::now(),
        }
    }
}

/// A failure surfaced to the session, with the moment it was observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_deserializes_service_payload() {
        let json = r#"{
            "classification": "Flood",
            "people_count": 3,
            "analyst_report": {
                "summary": "Rising water near a crowd.",
                "severity_score": 8,
                "actions": ["Dispatch responders", "Close the road"]
            },
            "source": "Vision Agent"
        }"#;

        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.classification, "Flood");
        assert_eq!(result.people_count, 3);
        assert!(!result.is_normal());

        let report = result.analyst_report.unwrap();
        assert_eq!(report.severity_score, 8);
        assert_eq!(report.actions.len(), 2);
    }

    #[test]
    fn result_tolerates_missing_optional_fields() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"classification": "Normal"}"#).unwrap();
        assert!(result.is_normal());
        assert_eq!(result.people_count, 0);
        assert!(result.analyst_report.is_none());
    }

    #[test]
    fn requests_carry_their_kind() {
        let frame = AnalysisRequest::frame(vec![1, 2, 3]);
        assert_eq!(frame.kind, RequestKind::Frame);
        assert!(frame.user_id.is_none());

        let video = AnalysisRequest::video(vec![4, 5], Some("user-9".into()));
        assert_eq!(video.kind, RequestKind::Video);
        assert_eq!(video.user_id.as_deref(), Some("user-9"));
        assert_ne!(frame.id, video.id);
    }
}
