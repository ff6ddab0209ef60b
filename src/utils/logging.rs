use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::core::message::{Message, Role};

/// Plain-text transcript of the conversation, appended as messages land.
pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    /// A file given up front (`--log FILE`) starts logging immediately.
    pub fn new(log_file: Option<String>) -> Self {
        let is_active = log_file.is_some();
        LoggingState {
            file_path: log_file,
            is_active,
        }
    }

    pub fn set_log_file(&mut self, path: String) -> io::Result<String> {
        // Fail now rather than on the first message.
        OpenOptions::new().create(true).append(true).open(&path)?;

        self.file_path = Some(path.clone());
        self.is_active = true;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> io::Result<String> {
        match &self.file_path {
            Some(path) => {
                if self.is_active {
                    self.log_message("## Logging paused")?;
                    self.is_active = false;
                    Ok(format!("Logging paused (file: {path})"))
                } else {
                    self.is_active = true;
                    Ok(format!("Logging resumed to: {path}"))
                }
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No log file specified. Use /log <filename> to enable logging first.",
            )),
        }
    }

    pub fn log_message(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = self.file_path.as_deref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries, as on screen.
        writeln!(writer)?;

        writer.flush()
    }

    /// Log one conversation entry. User lines get a prefix, tool results
    /// are tagged with the tool name, and empty assistant text is skipped.
    pub fn log_entry(&self, message: &Message) -> io::Result<()> {
        match message.role {
            Role::User => self.log_message(&format!("You: {}", message.content)),
            Role::Assistant if message.content.is_empty() => Ok(()),
            Role::Assistant => self.log_message(&message.content),
            Role::Tool => {
                let name = message.tool_name.as_deref().unwrap_or("tool");
                self.log_message(&format!("## [{name}] {}", message.content))
            }
            Role::System => Ok(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &str| {
            Path::new(path)
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }
}
