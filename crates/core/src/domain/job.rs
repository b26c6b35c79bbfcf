use serde::{Deserialize, Serialize};

use super::error::MonitorError;
use super::types::Segment;

/// ジョブ状態（Transcription Service のワイヤ表現と一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// ポーリングを止めるべき状態か
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `self` から `next` への遷移が前進（または同一状態）か
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Processing | Completed | Failed) => true,
            (Processing, Completed | Failed) => true,
            _ => false,
        }
    }
}

/// ステータスポーリング 1 回分の観測結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    /// 0–100 に丸め済みの進捗
    pub progress: u8,
    pub message: Option<String>,
}

/// 状態遷移の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub prev_status: JobStatus,
    pub new_status: JobStatus,
    /// Completed への遷移そのもの（エッジ）か
    pub completed_edge: bool,
}

impl StateTransition {
    pub fn changed(&self) -> bool {
        self.prev_status != self.new_status
    }
}

/// 書き起こしジョブ。id / source_url / topics は生成後に変化しない。
#[derive(Debug, Clone)]
pub struct Job {
    id: String,
    source_url: String,
    topics: Vec<String>,
    status: JobStatus,
    progress: u8,
    message: Option<String>,
    segments: Vec<Segment>,
    completed_edge_fired: bool,
}

impl Job {
    /// 投入成功直後のジョブ（Pending）
    pub fn new(id: String, source_url: String, topics: Vec<String>) -> Self {
        Self {
            id,
            source_url,
            topics,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            segments: Vec::new(),
            completed_edge_fired: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Completed エッジが既に発火済みか
    pub fn completed_edge_fired(&self) -> bool {
        self.completed_edge_fired
    }

    /// ポーリング結果を適用する。
    ///
    /// 状態の後退はプロトコル違反として拒否し、状態は変更しない。
    /// Completed への最初の遷移でのみ `completed_edge` が立つ。
    pub fn apply_report(&mut self, report: &StatusReport) -> Result<StateTransition, MonitorError> {
        let prev = self.status;

        if !prev.can_advance_to(report.status) {
            return Err(MonitorError::contract_violation(format!(
                "job {} のステータスが {} から {} に後退しました",
                self.id,
                prev.as_str(),
                report.status.as_str()
            )));
        }

        if prev == JobStatus::Failed {
            // Failed は完全な終端。再観測しても何も変えない
            return Ok(StateTransition {
                prev_status: prev,
                new_status: prev,
                completed_edge: false,
            });
        }

        self.status = report.status;
        if report.message.is_some() {
            self.message = report.message.clone();
        }

        match report.status {
            JobStatus::Processing | JobStatus::Pending => {
                if report.progress < self.progress {
                    log::warn!(
                        "job {}: progress regressed {} -> {}, keeping {}",
                        self.id,
                        self.progress,
                        report.progress,
                        self.progress
                    );
                } else {
                    self.progress = report.progress;
                }
            }
            JobStatus::Completed => self.progress = 100,
            JobStatus::Failed => {}
        }

        let completed_edge = report.status == JobStatus::Completed && !self.completed_edge_fired;
        if completed_edge {
            self.completed_edge_fired = true;
        }

        Ok(StateTransition {
            prev_status: prev,
            new_status: self.status,
            completed_edge,
        })
    }

    /// 取得済みのフィルタ結果で segments を置き換える
    pub fn replace_segments(&mut self, segments: Vec<Segment>) -> Result<(), MonitorError> {
        if self.status != JobStatus::Completed {
            return Err(MonitorError::contract_violation(format!(
                "job {} は {} 状態のため結果を設定できません",
                self.id,
                self.status.as_str()
            )));
        }
        self.segments = segments;
        Ok(())
    }
}

/// トピック一覧の正規化: trim して空要素を除く（順序は維持）
pub fn normalize_topics<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    topics
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// "AI, machine learning" のようなカンマ区切り入力を分解する
pub fn parse_topic_list(input: &str) -> Vec<String> {
    normalize_topics(input.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::MonitorErrorKind;

    fn job() -> Job {
        Job::new("J1".into(), "https://v/1".into(), vec!["ai".into()])
    }

    fn report(status: JobStatus, progress: u8) -> StatusReport {
        StatusReport {
            status,
            progress,
            message: None,
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let j = job();
        assert_eq!(j.status(), JobStatus::Pending);
        assert_eq!(j.progress(), 0);
        assert!(j.segments().is_empty());
        assert!(!j.completed_edge_fired());
    }

    #[test]
    fn test_pending_to_processing() {
        let mut j = job();
        let t = j.apply_report(&report(JobStatus::Processing, 40)).unwrap();
        assert_eq!(
            t,
            StateTransition {
                prev_status: JobStatus::Pending,
                new_status: JobStatus::Processing,
                completed_edge: false,
            }
        );
        assert!(t.changed());
        assert_eq!(j.progress(), 40);
    }

    #[test]
    fn test_completed_edge_fires_once() {
        let mut j = job();
        j.apply_report(&report(JobStatus::Processing, 40)).unwrap();
        let first = j.apply_report(&report(JobStatus::Completed, 100)).unwrap();
        let second = j.apply_report(&report(JobStatus::Completed, 100)).unwrap();
        assert!(first.completed_edge);
        assert!(!second.completed_edge);
        assert!(!second.changed());
        assert_eq!(j.progress(), 100);
    }

    #[test]
    fn test_pending_straight_to_completed_is_an_edge() {
        let mut j = job();
        let t = j.apply_report(&report(JobStatus::Completed, 100)).unwrap();
        assert!(t.completed_edge);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut j = job();
        j.apply_report(&report(JobStatus::Processing, 60)).unwrap();
        j.apply_report(&report(JobStatus::Processing, 30)).unwrap();
        assert_eq!(j.progress(), 60);
    }

    #[test]
    fn test_regression_is_rejected() {
        let mut j = job();
        j.apply_report(&report(JobStatus::Processing, 50)).unwrap();
        let err = j.apply_report(&report(JobStatus::Pending, 0)).unwrap_err();
        assert_eq!(err.kind, MonitorErrorKind::ContractViolation);
        assert_eq!(j.status(), JobStatus::Processing);
        assert_eq!(j.progress(), 50);
    }

    #[test]
    fn test_completed_to_failed_is_rejected() {
        let mut j = job();
        j.apply_report(&report(JobStatus::Completed, 100)).unwrap();
        assert!(j.apply_report(&report(JobStatus::Failed, 0)).is_err());
        assert_eq!(j.status(), JobStatus::Completed);
    }

    #[test]
    fn test_failed_keeps_message() {
        let mut j = job();
        let t = j
            .apply_report(&StatusReport {
                status: JobStatus::Failed,
                progress: 0,
                message: Some("decode error".into()),
            })
            .unwrap();
        assert_eq!(t.new_status, JobStatus::Failed);
        assert_eq!(j.message(), Some("decode error"));
        assert!(j.status().is_terminal());
    }

    #[test]
    fn test_replace_segments_requires_completed() {
        let mut j = job();
        let seg = Segment::new(3, "hello").unwrap();
        assert!(j.replace_segments(vec![seg.clone()]).is_err());
        assert!(j.segments().is_empty());

        j.apply_report(&report(JobStatus::Completed, 100)).unwrap();
        j.replace_segments(vec![seg]).unwrap();
        assert_eq!(j.segments().len(), 1);
    }

    #[test]
    fn test_normalize_topics() {
        assert_eq!(
            normalize_topics(["  ai ", "", "ml", "   "]),
            vec!["ai".to_string(), "ml".to_string()]
        );
        assert!(normalize_topics(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_parse_topic_list() {
        assert_eq!(
            parse_topic_list("AI, machine learning ,programming"),
            vec!["AI", "machine learning", "programming"]
        );
        assert!(parse_topic_list("").is_empty());
        assert!(parse_topic_list(" , ").is_empty());
    }
}
