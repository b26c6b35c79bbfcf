use async_trait::async_trait;
use reqwest::Method;

use crate::domain::settings::ClientSettings;
use crate::domain::types::{Note, NoteDraft, NoteUpdate};
use crate::infra::http::{ApiClient, ServiceError};

/// Notes Store trait（保存済み書き起こしの CRUD）
#[async_trait]
pub trait NotesStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Note>, ServiceError>;
    async fn get(&self, id: &str) -> Result<Note, ServiceError>;
    async fn create(&self, draft: &NoteDraft) -> Result<Note, ServiceError>;
    async fn update(&self, id: &str, update: &NoteUpdate) -> Result<Note, ServiceError>;
    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

/// REST バックエンドの /notes エンドポイント
pub struct HttpNotesStore {
    api: ApiClient,
}

impl HttpNotesStore {
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
impl NotesStore for HttpNotesStore {
    async fn list(&self) -> Result<Vec<Note>, ServiceError> {
        self.api.send_json(self.api.request(Method::GET, &["notes"])).await
    }

    async fn get(&self, id: &str) -> Result<Note, ServiceError> {
        self.api
            .send_json(self.api.request(Method::GET, &["notes", id]))
            .await
    }

    async fn create(&self, draft: &NoteDraft) -> Result<Note, ServiceError> {
        let request = self.api.request(Method::POST, &["notes"]).json(draft);
        self.api.send_json(request).await
    }

    async fn update(&self, id: &str, update: &NoteUpdate) -> Result<Note, ServiceError> {
        let request = self.api.request(Method::PUT, &["notes", id]).json(update);
        self.api.send_json(request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.api
            .send_empty(self.api.request(Method::DELETE, &["notes", id]))
            .await
    }
}
