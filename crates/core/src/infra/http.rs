use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::domain::settings::ClientSettings;

/// バックエンド呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Network(String),
    #[error("Request timeout")]
    Timeout,
    #[error("Server error: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("Response parse error: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

/// REST API 共通クライアント（ベース URL・認証・エラー変換）
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    root: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ServiceError> {
        let root = Url::parse(settings.api_root())
            .map_err(|e| ServiceError::Network(format!("invalid base_url {:?}: {e}", settings.base_url)))?;
        if root.cannot_be_a_base() {
            return Err(ServiceError::Network(format!(
                "base_url cannot be used as a base: {}",
                settings.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ServiceError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            root,
            auth_token: settings.auth_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    /// パスセグメントを連結した URL（セグメントはパーセントエンコードされる）
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// リクエストを送り、2xx なら JSON をデコードする
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ServiceError> {
        let response = Self::checked(builder).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// ボディを読まずにステータスだけ確認する
    pub async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ServiceError> {
        Self::checked(builder).await.map(|_| ())
    }

    async fn checked(builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http { status, body });
        }
        Ok(response)
    }
}
