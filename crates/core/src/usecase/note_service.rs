use std::sync::Arc;

use crate::domain::job::{normalize_topics, JobStatus};
use crate::domain::types::{JobSnapshot, Note, NoteDraft, NoteUpdate};
use crate::infra::http::ServiceError;
use crate::infra::notes::NotesStore;

/// ノート操作エラー
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("Invalid note: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] ServiceError),
}

/// 書き起こし結果をノートとして保存・編集する
pub struct NoteService {
    store: Arc<dyn NotesStore>,
}

impl NoteService {
    pub fn new(store: Arc<dyn NotesStore>) -> Self {
        Self { store }
    }

    /// 完了済みジョブのセグメントをノートとして保存する
    pub async fn save_snapshot<I, S>(
        &self,
        snapshot: &JobSnapshot,
        title: &str,
        tags: I,
    ) -> Result<Note, NoteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let title = title.trim();
        if title.is_empty() {
            return Err(NoteError::Validation("タイトルが空です".to_string()));
        }
        if snapshot.status != JobStatus::Completed {
            return Err(NoteError::Validation(format!(
                "job {} はまだ完了していません ({})",
                snapshot.job_id,
                snapshot.status.as_str()
            )));
        }
        if snapshot.segments.is_empty() {
            return Err(NoteError::Validation(format!(
                "job {} に保存できるセグメントがありません",
                snapshot.job_id
            )));
        }

        let draft = NoteDraft {
            title: title.to_string(),
            tags: normalize_topics(tags),
            segments: snapshot.segments.clone(),
            source_url: snapshot.source_url.clone(),
        };
        let note = self.store.create(&draft).await?;
        log::info!("job {} saved as note {}", snapshot.job_id, note.id);
        Ok(note)
    }

    pub async fn list(&self) -> Result<Vec<Note>, NoteError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Note, NoteError> {
        Ok(self.store.get(id).await?)
    }

    /// タイトル・タグの更新（指定されたものだけ送る）
    pub async fn retitle(
        &self,
        id: &str,
        title: Option<&str>,
        tags: Option<Vec<String>>,
    ) -> Result<Note, NoteError> {
        let title = match title.map(str::trim) {
            Some("") => return Err(NoteError::Validation("タイトルが空です".to_string())),
            other => other.map(str::to_string),
        };
        let update = NoteUpdate {
            title,
            tags: tags.map(normalize_topics),
        };
        if update.is_empty() {
            return Err(NoteError::Validation("更新する項目がありません".to_string()));
        }
        Ok(self.store.update(id, &update).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), NoteError> {
        self.store.delete(id).await?;
        log::info!("note {id} deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::job::Job;
    use crate::domain::types::Segment;

    /// 作成・更新をメモリ上に保持するストア
    #[derive(Default)]
    struct MemoryStore {
        notes: Mutex<Vec<Note>>,
        updates: Mutex<Vec<NoteUpdate>>,
    }

    #[async_trait]
    impl NotesStore for MemoryStore {
        async fn list(&self) -> Result<Vec<Note>, ServiceError> {
            Ok(self.notes.lock().clone())
        }

        async fn get(&self, id: &str) -> Result<Note, ServiceError> {
            self.notes
                .lock()
                .iter()
                .find(|n| n.id == id)
                .cloned()
                .ok_or(ServiceError::Http {
                    status: 404,
                    body: "Note not found".into(),
                })
        }

        async fn create(&self, draft: &NoteDraft) -> Result<Note, ServiceError> {
            let mut notes = self.notes.lock();
            let note = Note {
                id: format!("n{}", notes.len() + 1),
                title: draft.title.clone(),
                tags: draft.tags.clone(),
                segments: draft.segments.clone(),
                source_url: draft.source_url.clone(),
                created_at: "2025-01-15T10:30:00Z".into(),
                updated_at: "2025-01-15T10:30:00Z".into(),
            };
            notes.push(note.clone());
            Ok(note)
        }

        async fn update(&self, id: &str, update: &NoteUpdate) -> Result<Note, ServiceError> {
            self.updates.lock().push(update.clone());
            let mut notes = self.notes.lock();
            let note = notes.iter_mut().find(|n| n.id == id).ok_or(ServiceError::Http {
                status: 404,
                body: "Note not found".into(),
            })?;
            if let Some(title) = &update.title {
                note.title = title.clone();
            }
            if let Some(tags) = &update.tags {
                note.tags = tags.clone();
            }
            Ok(note.clone())
        }

        async fn delete(&self, id: &str) -> Result<(), ServiceError> {
            self.notes.lock().retain(|n| n.id != id);
            Ok(())
        }
    }

    fn completed_snapshot(segments: Vec<Segment>) -> JobSnapshot {
        let mut job = Job::new("J1".into(), "https://v/1".into(), vec!["ai".into()]);
        job.apply_report(&crate::domain::job::StatusReport {
            status: JobStatus::Completed,
            progress: 100,
            message: None,
        })
        .unwrap();
        job.replace_segments(segments).unwrap();
        JobSnapshot::from_job(&job, None, false)
    }

    fn service() -> (Arc<MemoryStore>, NoteService) {
        let store = Arc::new(MemoryStore::default());
        (store.clone(), NoteService::new(store))
    }

    #[tokio::test]
    async fn test_save_snapshot_creates_note() {
        let (store, notes) = service();
        let snap = completed_snapshot(vec![Segment::new(4, "hello").unwrap()]);

        let note = notes
            .save_snapshot(&snap, "  My talk ", ["AI", " tutorial ", ""])
            .await
            .unwrap();
        assert_eq!(note.title, "My talk");
        assert_eq!(note.tags, vec!["AI", "tutorial"]);
        assert_eq!(note.source_url, "https://v/1");
        assert_eq!(note.segments.len(), 1);
        assert_eq!(store.notes.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_save_requires_title_and_segments() {
        let (store, notes) = service();

        let snap = completed_snapshot(vec![Segment::new(4, "hello").unwrap()]);
        let err = notes.save_snapshot(&snap, "   ", ["x"]).await.unwrap_err();
        assert!(matches!(err, NoteError::Validation(_)));

        let empty = completed_snapshot(vec![]);
        let err = notes.save_snapshot(&empty, "title", ["x"]).await.unwrap_err();
        assert!(matches!(err, NoteError::Validation(_)));

        assert!(store.notes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_save_rejects_unfinished_job() {
        let (_, notes) = service();
        let job = Job::new("J2".into(), "https://v/2".into(), vec![]);
        let snap = JobSnapshot::from_job(&job, None, false);
        let err = notes.save_snapshot(&snap, "title", Vec::<String>::new()).await.unwrap_err();
        assert!(err.to_string().contains("J2"));
    }

    #[tokio::test]
    async fn test_retitle_sends_only_given_fields() {
        let (store, notes) = service();
        let snap = completed_snapshot(vec![Segment::new(4, "hello").unwrap()]);
        let note = notes.save_snapshot(&snap, "old", ["a"]).await.unwrap();

        let updated = notes.retitle(&note.id, Some(" new "), None).await.unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.tags, vec!["a"]);
        assert_eq!(
            store.updates.lock().last(),
            Some(&NoteUpdate {
                title: Some("new".into()),
                tags: None,
            })
        );
    }

    #[tokio::test]
    async fn test_retitle_validation() {
        let (_, notes) = service();
        assert!(matches!(
            notes.retitle("n1", Some("  "), None).await,
            Err(NoteError::Validation(_))
        ));
        assert!(matches!(
            notes.retitle("n1", None, None).await,
            Err(NoteError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_note_surfaces_store_error() {
        let (_, notes) = service();
        let err = notes.get("missing").await.unwrap_err();
        assert!(matches!(err, NoteError::Store(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let (_, notes) = service();
        let snap = completed_snapshot(vec![Segment::new(4, "hello").unwrap()]);
        let note = notes.save_snapshot(&snap, "t", ["a"]).await.unwrap();
        assert_eq!(notes.list().await.unwrap().len(), 1);

        notes.delete(&note.id).await.unwrap();
        assert!(notes.list().await.unwrap().is_empty());
    }
}
