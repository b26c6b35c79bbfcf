use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// 動画の書き起こしとノート管理の CLI
#[derive(Debug, Parser)]
#[command(name = "vnotes", version, about = "Transcribe videos into filtered, timestamped notes")]
pub struct Cli {
    /// 設定ファイル (JSON)。省略時は <config_dir>/video-notes/settings.json
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a video, follow the job and print the filtered transcript
    Transcribe(TranscribeArgs),
    /// Manage saved notes
    #[command(subcommand)]
    Notes(NotesCommand),
    /// Print the effective settings
    Config,
}

#[derive(Debug, Args)]
pub struct TranscribeArgs {
    /// Video URL (YouTube or other video platform)
    #[arg(long)]
    pub url: String,

    /// Comma-separated topics used to filter the transcript
    #[arg(long, default_value = "")]
    pub topics: String,

    /// Save the transcript as a note with this title
    #[arg(long, value_name = "TITLE")]
    pub save: Option<String>,

    /// Comma-separated tags for the saved note
    #[arg(long, requires = "save")]
    pub tags: Option<String>,

    /// Retry the result fetch once if it fails after completion
    #[arg(long)]
    pub retry_fetch: bool,
}

#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// List saved notes
    List,
    /// Show one note with its transcript
    Show { id: String },
    /// Change the title and/or tags of a note
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Comma-separated tags (replaces the existing ones)
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a note
    Delete { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transcribe_with_save() {
        let cli = Cli::try_parse_from([
            "vnotes",
            "transcribe",
            "--url",
            "https://v/1",
            "--topics",
            "ai, ml",
            "--save",
            "My talk",
            "--tags",
            "x,y",
        ])
        .unwrap();

        let Command::Transcribe(args) = cli.command else {
            panic!("expected transcribe");
        };
        assert_eq!(args.url, "https://v/1");
        assert_eq!(args.topics, "ai, ml");
        assert_eq!(args.save.as_deref(), Some("My talk"));
        assert_eq!(args.tags.as_deref(), Some("x,y"));
        assert!(!args.retry_fetch);
    }

    #[test]
    fn topics_default_to_empty() {
        let cli = Cli::try_parse_from(["vnotes", "transcribe", "--url", "https://v/1"]).unwrap();
        let Command::Transcribe(args) = cli.command else {
            panic!("expected transcribe");
        };
        assert_eq!(args.topics, "");
        assert!(args.save.is_none());
    }

    #[test]
    fn tags_require_save() {
        assert!(Cli::try_parse_from(["vnotes", "transcribe", "--url", "u", "--tags", "a"]).is_err());
    }

    #[test]
    fn url_is_required() {
        assert!(Cli::try_parse_from(["vnotes", "transcribe"]).is_err());
    }

    #[test]
    fn parses_notes_edit_and_global_config() {
        let cli = Cli::try_parse_from([
            "vnotes",
            "notes",
            "edit",
            "n1",
            "--title",
            "New",
            "--config",
            "/tmp/vn.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/vn.json")));
        match cli.command {
            Command::Notes(NotesCommand::Edit { id, title, tags }) => {
                assert_eq!(id, "n1");
                assert_eq!(title.as_deref(), Some("New"));
                assert!(tags.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
