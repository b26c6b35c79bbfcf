use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::MonitorError;
use super::job::{Job, JobStatus};

/// 書き起こしセグメント（タイムスタンプ付きテキスト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 動画先頭からの秒数
    #[serde(deserialize_with = "de_whole_seconds")]
    pub timestamp: u64,
    pub text: String,
}

impl Segment {
    /// テキストが空白のみの場合は None
    pub fn new(timestamp: u64, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self { timestamp, text })
    }

    /// `m:ss` 形式の表示ラベル (例: 75 → "1:15")
    pub fn clock_label(&self) -> String {
        format!("{}:{:02}", self.timestamp / 60, self.timestamp % 60)
    }
}

/// バックエンドは秒を浮動小数で返すことがあるため、整数秒に切り捨てる
fn de_whole_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 0.0 {
        return Err(D::Error::custom(format!("invalid segment timestamp: {raw}")));
    }
    Ok(raw.floor() as u64)
}

/// submit 成功時に返すハンドル
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: String,
}

/// プレゼンテーション層に公開するジョブのスナップショット
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub source_url: String,
    pub topics: Vec<String>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub segments: Vec<Segment>,
    /// 直近のエラー（ポーリング失敗・取得失敗・プロトコル違反）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<MonitorError>,
    pub fetch_in_flight: bool,
}

impl JobSnapshot {
    pub fn from_job(job: &Job, last_error: Option<MonitorError>, fetch_in_flight: bool) -> Self {
        Self {
            job_id: job.id().to_string(),
            source_url: job.source_url().to_string(),
            topics: job.topics().to_vec(),
            status: job.status(),
            progress: job.progress(),
            message: job.message().map(str::to_string),
            segments: job.segments().to_vec(),
            last_error,
            fetch_in_flight,
        }
    }

    /// 完了済みだが結果がまだ無い（手動リトライ対象）
    pub fn awaiting_result(&self) -> bool {
        self.status == JobStatus::Completed && self.segments.is_empty() && !self.fetch_in_flight
    }
}

/// 保存済みノート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    pub source_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// ノート作成リクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    pub tags: Vec<String>,
    pub segments: Vec<Segment>,
    pub source_url: String,
}

/// ノート更新リクエスト（未指定フィールドは送らない）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none()
    }
}
