use std::sync::Arc;

use vn_core::domain::error::{MonitorError, MonitorErrorKind};
use vn_core::domain::job::{parse_topic_list, JobStatus};
use vn_core::domain::settings::ClientSettings;
use vn_core::domain::types::JobSnapshot;
use vn_core::infra::http::ServiceError;
use vn_core::infra::notes::HttpNotesStore;
use vn_core::infra::transcription::HttpTranscriptionService;
use vn_core::usecase::job_monitor::JobMonitor;
use vn_core::usecase::note_service::{NoteError, NoteService};

use crate::cli::{NotesCommand, TranscribeArgs};
use crate::events::{self, ProgressPrinter};

/// コマンドエラー型
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
    #[error("interrupted")]
    Interrupted,
}

type CmdResult<T> = Result<T, CliError>;

// --- transcribe ---

pub async fn transcribe(settings: &ClientSettings, args: TranscribeArgs) -> CmdResult<()> {
    let service = Arc::new(HttpTranscriptionService::new(settings)?);
    let monitor = JobMonitor::from_settings(service, settings);
    let topics = parse_topic_list(&args.topics);

    let mut rx = monitor.subscribe();
    let handle = monitor.submit(&args.url, topics.iter()).await?;
    println!("job {} submitted", handle.job_id);

    let mut printer = ProgressPrinter::default();
    let mut snapshot = loop {
        let current = rx.borrow_and_update().clone();
        if let Some(snap) = current.filter(|s| s.job_id == handle.job_id) {
            for line in printer.render(&snap) {
                println!("{line}");
            }
            if is_settled(&snap) {
                break snap;
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err(MonitorError::superseded(&handle.job_id).into());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                monitor.cancel();
                return Err(CliError::Interrupted);
            }
        }
    };

    if snapshot.status == JobStatus::Failed {
        return Err(CliError::JobFailed {
            job_id: snapshot.job_id,
            message: snapshot.message.unwrap_or_else(|| "no message".to_string()),
        });
    }

    if let Some(err) = snapshot.last_error.clone() {
        match err.kind {
            MonitorErrorKind::Fetch if args.retry_fetch => {
                println!("retrying result fetch...");
                let segments = monitor.fetch_result(&snapshot.job_id, topics.iter()).await?;
                snapshot.segments = segments;
                snapshot.last_error = None;
            }
            _ => return Err(err.into()),
        }
    }

    if snapshot.segments.is_empty() {
        println!("no segments matched the requested topics");
    } else {
        println!();
        println!("{}", events::format_transcript(&snapshot.segments));
    }

    if let Some(title) = args.save {
        let notes = note_service(settings)?;
        let tags = args.tags.as_deref().map(parse_topic_list).unwrap_or_default();
        let note = notes.save_snapshot(&snapshot, &title, tags).await?;
        println!("saved as note {}", note.id);
    }

    let summary = monitor.metrics().summary();
    log::debug!(
        "polls={} avg_poll={:?}ms avg_fetch={:?}ms",
        summary.polls_sent,
        summary.avg_latency_ms.poll,
        summary.avg_latency_ms.fetch
    );
    Ok(())
}

/// これ以上スナップショットが変わらない状態か
fn is_settled(snapshot: &JobSnapshot) -> bool {
    match snapshot.status {
        JobStatus::Failed => true,
        JobStatus::Completed => !snapshot.fetch_in_flight,
        // プロトコル違反で監視は止まっている
        _ => snapshot
            .last_error
            .as_ref()
            .is_some_and(|e| e.kind == MonitorErrorKind::ContractViolation),
    }
}

// --- notes ---

fn note_service(settings: &ClientSettings) -> CmdResult<NoteService> {
    Ok(NoteService::new(Arc::new(HttpNotesStore::new(settings)?)))
}

pub async fn notes(settings: &ClientSettings, command: NotesCommand) -> CmdResult<()> {
    let notes = note_service(settings)?;
    match command {
        NotesCommand::List => {
            let all = notes.list().await?;
            if all.is_empty() {
                println!("no notes yet");
            }
            for note in &all {
                println!("{}", events::format_note_row(note));
            }
        }
        NotesCommand::Show { id } => {
            let note = notes.get(&id).await?;
            println!("{}", events::format_note(&note));
        }
        NotesCommand::Edit { id, title, tags } => {
            let tags = tags.as_deref().map(parse_topic_list);
            let note = notes.retitle(&id, title.as_deref(), tags).await?;
            println!("{}", events::format_note_row(&note));
        }
        NotesCommand::Delete { id } => {
            notes.delete(&id).await?;
            println!("note {id} deleted");
        }
    }
    Ok(())
}

// --- config ---

pub fn show_config(settings: &ClientSettings) -> CmdResult<()> {
    let mut shown = settings.clone();
    if shown.auth_token.is_some() {
        shown.auth_token = Some("********".to_string());
    }
    let json = serde_json::to_string_pretty(&shown)
        .map_err(|e| CliError::Config(format!("cannot render settings: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: JobStatus) -> JobSnapshot {
        JobSnapshot {
            job_id: "J1".into(),
            source_url: "https://v/1".into(),
            topics: vec![],
            status,
            progress: 0,
            message: None,
            segments: vec![],
            last_error: None,
            fetch_in_flight: false,
        }
    }

    #[test]
    fn settled_states() {
        assert!(!is_settled(&snapshot(JobStatus::Pending)));
        assert!(!is_settled(&snapshot(JobStatus::Processing)));
        assert!(is_settled(&snapshot(JobStatus::Failed)));
        assert!(is_settled(&snapshot(JobStatus::Completed)));

        let mut fetching = snapshot(JobStatus::Completed);
        fetching.fetch_in_flight = true;
        assert!(!is_settled(&fetching));
    }

    #[test]
    fn poll_errors_keep_waiting_but_violations_stop() {
        let mut snap = snapshot(JobStatus::Processing);
        snap.last_error = Some(MonitorError::poll("timeout"));
        assert!(!is_settled(&snap));

        snap.last_error = Some(MonitorError::contract_violation("regressed"));
        assert!(is_settled(&snap));
    }

    #[test]
    fn errors_render_their_codes() {
        let err: CliError = MonitorError::submission("bad url").into();
        assert_eq!(err.to_string(), "[E_SUBMISSION] bad url");

        let failed = CliError::JobFailed {
            job_id: "J1".into(),
            message: "decode error".into(),
        };
        assert_eq!(failed.to_string(), "job J1 failed: decode error");
    }
}
