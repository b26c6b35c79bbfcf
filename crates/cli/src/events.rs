use vn_core::domain::job::JobStatus;
use vn_core::domain::types::{JobSnapshot, Note, Segment};

/// スナップショットの変化を端末向けの 1 行に変換する
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last: Option<(JobStatus, u8)>,
    last_error: Option<String>,
}

impl ProgressPrinter {
    /// 表示すべき変化があれば行を返す（同じ状態の連続は抑制）
    pub fn render(&mut self, snapshot: &JobSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        let current = (snapshot.status, snapshot.progress);
        if self.last != Some(current) {
            let mut line = format!("[{:>3}%] {}", snapshot.progress, snapshot.status.as_str());
            if let Some(message) = &snapshot.message {
                line.push_str(": ");
                line.push_str(message);
            }
            lines.push(line);
            self.last = Some(current);
        }

        let error = snapshot.last_error.as_ref().map(|e| e.to_string());
        if error != self.last_error {
            if let Some(error) = &error {
                lines.push(format!("  ! {error}"));
            }
            self.last_error = error;
        }

        if snapshot.fetch_in_flight && snapshot.segments.is_empty() {
            let line = "  fetching filtered transcript...".to_string();
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines
    }
}

/// `m:ss  text` 形式の書き起こし
pub fn format_transcript(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("{:>6}  {}", s.clock_label(), s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// notes list の 1 行
pub fn format_note_row(note: &Note) -> String {
    let tags = if note.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", note.tags.join(", "))
    };
    format!(
        "{}  {}{}  ({} segments, {})",
        note.id,
        note.title,
        tags,
        note.segments.len(),
        note.updated_at
    )
}

/// notes show の本文
pub fn format_note(note: &Note) -> String {
    let mut out = format!("# {}\n", note.title);
    out.push_str(&format!("source:  {}\n", note.source_url));
    if !note.tags.is_empty() {
        out.push_str(&format!("tags:    {}\n", note.tags.join(", ")));
    }
    out.push_str(&format!("created: {}\nupdated: {}\n\n", note.created_at, note.updated_at));
    out.push_str(&format_transcript(&note.segments));
    out
}
