use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{clamp_progress, join_topics, ServiceError, TranscriptionService};
use crate::domain::job::{JobStatus, StatusReport};
use crate::domain::settings::ClientSettings;
use crate::domain::types::Segment;
use crate::infra::http::ApiClient;

/// REST バックエンドを使用した Transcription Service
pub struct HttpTranscriptionService {
    api: ApiClient,
}

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    url: &'a str,
    topics: &'a [String],
}

#[derive(Deserialize)]
struct CreateJobResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: JobStatus,
    #[serde(default)]
    progress: f64,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ResultResponse {
    segments: Vec<Segment>,
}

impl HttpTranscriptionService {
    pub fn new(settings: &ClientSettings) -> Result<Self, ServiceError> {
        Ok(Self {
            api: ApiClient::new(settings)?,
        })
    }

    pub fn with_client(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn create_job(&self, url: &str, topics: &[String]) -> Result<String, ServiceError> {
        let request = self
            .api
            .request(Method::POST, &["transcribe"])
            .json(&CreateJobRequest { url, topics });

        let response: CreateJobResponse = self.api.send_json(request).await?;
        if response.job_id.trim().is_empty() {
            return Err(ServiceError::Decode("empty jobId in response".to_string()));
        }
        Ok(response.job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ServiceError> {
        let request = self.api.request(Method::GET, &["transcribe", job_id, "status"]);
        let response: StatusResponse = self.api.send_json(request).await?;

        Ok(StatusReport {
            status: response.status,
            progress: clamp_progress(response.progress),
            message: response.message.filter(|m| !m.is_empty()),
        })
    }

    async fn filtered_result(&self, job_id: &str, topics: &[String]) -> Result<Vec<Segment>, ServiceError> {
        let request = self
            .api
            .request(Method::GET, &["transcribe", job_id, "result"])
            .query(&[("topics", join_topics(topics))]);
        let response: ResultResponse = self.api.send_json(request).await?;

        let total = response.segments.len();
        let segments: Vec<Segment> = response
            .segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .collect();
        if segments.len() != total {
            log::warn!(
                "job {job_id}: dropped {} blank segment(s) from result",
                total - segments.len()
            );
        }
        Ok(segments)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_service_name() {
        let service = HttpTranscriptionService::new(&ClientSettings::default()).unwrap();
        assert_eq!(service.name(), "http");
    }

    #[test]
    fn test_status_response_accepts_missing_progress() {
        let r: StatusResponse = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(r.status, JobStatus::Pending);
        assert_eq!(r.progress, 0.0);
        assert!(r.message.is_none());
    }

    #[test]
    fn test_status_response_rejects_unknown_status() {
        assert!(serde_json::from_str::<StatusResponse>(r#"{"status":"queued","progress":0}"#).is_err());
    }
}
