use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ServiceError, TranscriptionService};
use crate::domain::job::{JobStatus, StatusReport};
use crate::domain::types::Segment;

/// 記録された呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    CreateJob { url: String, topics: Vec<String> },
    JobStatus { job_id: String },
    FilteredResult { job_id: String, topics: Vec<String> },
}

#[derive(Default)]
struct Script {
    job_ids: VecDeque<Result<String, ServiceError>>,
    statuses: VecDeque<Result<StatusReport, ServiceError>>,
    results: VecDeque<Result<Vec<Segment>, ServiceError>>,
    calls: Vec<ServiceCall>,
}

/// ScriptedTranscriptionService: 応答をキューで与えるインメモリ実装。
///
/// ステータスと結果は最後の 1 件がキューに残り続け、以降の呼び出しでも返される。
/// job id が尽きた場合は UUID から採番する。
#[derive(Default)]
pub struct ScriptedTranscriptionService {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedTranscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出しが応答を返すまでの遅延
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_job_id(&self, job_id: impl Into<String>) -> &Self {
        self.script.lock().job_ids.push_back(Ok(job_id.into()));
        self
    }

    pub fn push_job_error(&self, error: ServiceError) -> &Self {
        self.script.lock().job_ids.push_back(Err(error));
        self
    }

    pub fn push_status(&self, status: JobStatus, progress: u8) -> &Self {
        self.push_status_report(StatusReport {
            status,
            progress,
            message: None,
        })
    }

    pub fn push_status_report(&self, report: StatusReport) -> &Self {
        self.script.lock().statuses.push_back(Ok(report));
        self
    }

    pub fn push_status_error(&self, error: ServiceError) -> &Self {
        self.script.lock().statuses.push_back(Err(error));
        self
    }

    pub fn push_result(&self, segments: Vec<Segment>) -> &Self {
        self.script.lock().results.push_back(Ok(segments));
        self
    }

    pub fn push_result_error(&self, error: ServiceError) -> &Self {
        self.script.lock().results.push_back(Err(error));
        self
    }

    /// これまでの全呼び出し（発行順）
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.script.lock().calls.clone()
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.count(|c| matches!(c, ServiceCall::JobStatus { job_id: id } if id == job_id))
    }

    pub fn result_calls(&self, job_id: &str) -> usize {
        self.count(|c| matches!(c, ServiceCall::FilteredResult { job_id: id, .. } if id == job_id))
    }

    pub fn create_calls(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::CreateJob { .. }))
    }

    fn count(&self, pred: impl Fn(&ServiceCall) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn next_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn respond<T>(&self, value: T) -> T {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        value
    }
}

#[async_trait]
impl TranscriptionService for ScriptedTranscriptionService {
    async fn create_job(&self, url: &str, topics: &[String]) -> Result<String, ServiceError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(ServiceCall::CreateJob {
                url: url.to_string(),
                topics: topics.to_vec(),
            });
            script
                .job_ids
                .pop_front()
                .unwrap_or_else(|| Ok(format!("job-{}", uuid::Uuid::new_v4())))
        };
        self.respond(next).await
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ServiceError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(ServiceCall::JobStatus {
                job_id: job_id.to_string(),
            });
            Self::next_sticky(&mut script.statuses).unwrap_or_else(|| {
                Err(ServiceError::Http {
                    status: 404,
                    body: "Job not found".to_string(),
                })
            })
        };
        self.respond(next).await
    }

    async fn filtered_result(&self, job_id: &str, topics: &[String]) -> Result<Vec<Segment>, ServiceError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(ServiceCall::FilteredResult {
                job_id: job_id.to_string(),
                topics: topics.to_vec(),
            });
            Self::next_sticky(&mut script.results).unwrap_or_else(|| Ok(Vec::new()))
        };
        self.respond(next).await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
