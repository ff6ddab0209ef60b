//! Saved conversations on disk.
//!
//! Each conversation is one pretty-printed JSON file
//! `{model, timestamp, messages}` named after the model and the moment the
//! conversation started, so file names sort chronologically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

use crate::core::app::SessionSnapshot;
use crate::core::message::Message;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to create history directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize conversation: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedChat {
    pub model: String,
    /// `YYYYMMDD_HHMMSS` of the conversation start.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub path: PathBuf,
    pub model: String,
    pub timestamp: String,
    pub message_count: usize,
}

impl ChatSummary {
    /// `2024-01-05 14:30:00` when the stored timestamp is well formed.
    pub fn display_timestamp(&self) -> String {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map(|parsed| parsed.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| self.timestamp.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ChatHistory {
    dir: PathBuf,
}

impl ChatHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name_for(model: &str, started_at: &DateTime<Local>) -> String {
        let sanitized: String = model
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("chat_{sanitized}_{}.json", started_at.format(TIMESTAMP_FORMAT))
    }

    /// Write the snapshot, replacing any earlier save of the same session.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<PathBuf, HistoryError> {
        let path = match &snapshot.handle {
            Some(existing) => existing.clone(),
            None => {
                fs::create_dir_all(&self.dir).map_err(|source| HistoryError::CreateDir {
                    path: self.dir.clone(),
                    source,
                })?;
                self.dir
                    .join(Self::file_name_for(&snapshot.model, &snapshot.started_at))
            }
        };

        let chat = SavedChat {
            model: snapshot.model.clone(),
            timestamp: snapshot.started_at.format(TIMESTAMP_FORMAT).to_string(),
            messages: snapshot.messages.clone(),
        };
        let body = serde_json::to_string_pretty(&chat)?;
        write_atomically(&path, body.as_bytes()).map_err(|source| HistoryError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Saved conversations, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Vec<ChatSummary> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "Failed to read history directory");
                return Vec::new();
            }
        };

        let mut summaries: Vec<ChatSummary> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| match self.load(&path) {
                Ok(chat) => Some(ChatSummary {
                    path,
                    model: chat.model,
                    timestamp: chat.timestamp,
                    message_count: chat.messages.len(),
                }),
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable chat file");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.path.cmp(&a.path))
        });
        summaries
    }

    pub fn load(&self, path: &Path) -> Result<SavedChat, HistoryError> {
        let contents = fs::read_to_string(path).map_err(|source| HistoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ToolCallRequest;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn started_at() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 5, 14, 30, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn snapshot(messages: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            model: "llama2:latest".into(),
            messages,
            started_at: started_at(),
            handle: None,
        }
    }

    #[test]
    fn file_names_embed_sanitized_model_and_start_time() {
        assert_eq!(
            ChatHistory::file_name_for("llama2:latest", &started_at()),
            "chat_llama2_latest_20240105_143000.json"
        );
        assert_eq!(
            ChatHistory::file_name_for("library/qwen2.5:7b", &started_at()),
            "chat_library_qwen2.5_7b_20240105_143000.json"
        );
    }

    #[test]
    fn saved_conversations_load_back_unchanged() {
        let dir = TempDir::new().expect("temp dir");
        let history = ChatHistory::new(dir.path().join("history"));
        let mut arguments = serde_json::Map::new();
        arguments.insert("limit".into(), serde_json::json!(3));
        let messages = vec![
            Message::user("Prices?"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("get_top_cryptocurrencies", arguments)],
            ),
            Message::tool_result("get_top_cryptocurrencies", "{\n  \"success\": true\n}"),
            Message::assistant("Bitcoin is first.\n\n```\ntable\n```"),
        ];

        let path = history.save(&snapshot(messages.clone())).expect("save");
        let loaded = history.load(&path).expect("load");

        assert_eq!(loaded.model, "llama2:latest");
        assert_eq!(loaded.timestamp, "20240105_143000");
        assert_eq!(loaded.messages, messages);
    }

    #[test]
    fn repeated_saves_of_one_session_reuse_the_file() {
        let dir = TempDir::new().expect("temp dir");
        let history = ChatHistory::new(dir.path());

        let first = history
            .save(&snapshot(vec![Message::user("hi")]))
            .expect("first save");
        let second = history
            .save(&snapshot(vec![Message::user("hi"), Message::assistant("hello")]))
            .expect("second save");
        assert_eq!(first, second);

        let mut loaded = snapshot(vec![Message::user("from elsewhere")]);
        let elsewhere = dir.path().join("imported.json");
        loaded.handle = Some(elsewhere.clone());
        assert_eq!(history.save(&loaded).expect("save loaded"), elsewhere);

        let summaries = history.list();
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn list_is_newest_first_and_skips_broken_files() {
        let dir = TempDir::new().expect("temp dir");
        let history = ChatHistory::new(dir.path());
        fs::write(
            dir.path().join("chat_a_20231201_080000.json"),
            r#"{"model":"a","timestamp":"20231201_080000","messages":[]}"#,
        )
        .expect("write");
        fs::write(
            dir.path().join("chat_b_20240301_090000.json"),
            r#"{"model":"b","timestamp":"20240301_090000","messages":[{"role":"user","content":"x"}]}"#,
        )
        .expect("write");
        fs::write(dir.path().join("chat_broken.json"), "{not json").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let summaries = history.list();
        let models: Vec<_> = summaries.iter().map(|s| s.model.as_str()).collect();
        assert_eq!(models, vec!["b", "a"]);
        assert_eq!(summaries[0].message_count, 1);
        assert_eq!(summaries[0].display_timestamp(), "2024-03-01 09:00:00");
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let history = ChatHistory::new(dir.path().join("absent"));
        assert!(history.list().is_empty());
        assert!(matches!(
            history.load(&dir.path().join("absent/chat.json")),
            Err(HistoryError::Read { .. })
        ));
    }
}
