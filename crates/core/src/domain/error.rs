use serde::Serialize;

/// プレゼンテーション層向けのエラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_SUBMISSION")]
    Submission,
    #[serde(rename = "E_POLL")]
    Poll,
    #[serde(rename = "E_FETCH")]
    Fetch,
    #[serde(rename = "E_CONTRACT")]
    Contract,
    #[serde(rename = "E_SUPERSEDED")]
    Superseded,
}

impl ErrorCode {
    /// シリアライズ時と同じコード文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "E_SUBMISSION",
            Self::Poll => "E_POLL",
            Self::Fetch => "E_FETCH",
            Self::Contract => "E_CONTRACT",
            Self::Superseded => "E_SUPERSEDED",
        }
    }
}

/// Job Monitor のエラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorErrorKind {
    /// ジョブ作成に失敗（入力不正・通信・サーバエラー）
    Submission,
    /// ステータスポーリング 1 回分の失敗。次回のポーリングで再試行される
    Poll,
    /// 完了後の結果取得に失敗。手動リトライ可能
    Fetch,
    /// 呼び出し順序の誤りやステータスの後退
    ContractViolation,
    /// 通信中にジョブがキャンセル/置き換えられ、応答を破棄した
    Superseded,
}

impl MonitorErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Submission => ErrorCode::Submission,
            Self::Poll => ErrorCode::Poll,
            Self::Fetch => ErrorCode::Fetch,
            Self::ContractViolation => ErrorCode::Contract,
            Self::Superseded => ErrorCode::Superseded,
        }
    }
}

/// Job Monitor のエラー（スナップショットにも載る）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorError {
    pub kind: MonitorErrorKind,
    pub code: ErrorCode,
    /// 人間が読める詳細メッセージ
    pub detail: String,
    /// ユーザー操作（再投入・リトライ）で回復可能か
    pub recoverable: bool,
}

impl MonitorError {
    fn new(kind: MonitorErrorKind, detail: String, recoverable: bool) -> Self {
        Self {
            kind,
            code: kind.code(),
            detail,
            recoverable,
        }
    }

    pub fn submission(detail: impl Into<String>) -> Self {
        Self::new(MonitorErrorKind::Submission, detail.into(), true)
    }

    pub fn poll(detail: impl Into<String>) -> Self {
        Self::new(MonitorErrorKind::Poll, detail.into(), true)
    }

    pub fn fetch(detail: impl Into<String>) -> Self {
        Self::new(MonitorErrorKind::Fetch, detail.into(), true)
    }

    pub fn contract_violation(detail: impl Into<String>) -> Self {
        Self::new(MonitorErrorKind::ContractViolation, detail.into(), false)
    }

    pub fn superseded(job_id: &str) -> Self {
        Self::new(
            MonitorErrorKind::Superseded,
            format!("job {job_id} was cancelled or superseded; response discarded"),
            false,
        )
    }
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.detail)
    }
}

impl std::error::Error for MonitorError {}
