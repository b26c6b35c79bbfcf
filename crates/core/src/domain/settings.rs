use std::time::Duration;

use serde::{Deserialize, Serialize};

/// クライアント設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// バックエンド API のベース URL（例: http://localhost:8000/api）
    pub base_url: String,
    /// ステータスポーリング間隔（ミリ秒）
    pub poll_interval_ms: u64,
    /// 個々の HTTP リクエストのタイムアウト（秒）
    pub request_timeout_secs: u64,
    /// Bearer トークン（バックエンドは全ルートで認証する）
    pub auth_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
            auth_token: None,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 末尾スラッシュを除いたベース URL
    pub fn api_root(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_root().is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}
