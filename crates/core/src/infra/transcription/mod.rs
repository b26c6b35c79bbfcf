mod http;
mod scripted;

pub use http::HttpTranscriptionService;
pub use scripted::{ScriptedTranscriptionService, ServiceCall};

use async_trait::async_trait;

use crate::domain::job::StatusReport;
use crate::domain::types::Segment;
pub use crate::infra::http::ServiceError;

/// Transcription Service trait（外部の書き起こしバックエンド）
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// ジョブを作成し、サービスが採番した job id を返す
    async fn create_job(&self, url: &str, topics: &[String]) -> Result<String, ServiceError>;

    /// ジョブの現在ステータスを取得する
    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ServiceError>;

    /// 完了済みジョブの結果を topics でフィルタして取得する
    async fn filtered_result(&self, job_id: &str, topics: &[String]) -> Result<Vec<Segment>, ServiceError>;

    fn name(&self) -> &str;
}

/// ワイヤ上の進捗値（JSON number）を 0–100 の整数に丸める
pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// 結果クエリ用にトピックをカンマ連結する
pub fn join_topics(topics: &[String]) -> String {
    topics.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(40.0), 40);
        assert_eq!(clamp_progress(39.6), 40);
        assert_eq!(clamp_progress(-3.0), 0);
        assert_eq!(clamp_progress(250.0), 100);
        assert_eq!(clamp_progress(f64::NAN), 0);
    }

    #[test]
    fn test_join_topics() {
        assert_eq!(join_topics(&["ai".into(), "ml".into()]), "ai,ml");
        assert_eq!(join_topics(&[]), "");
    }
}
