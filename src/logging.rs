//! Diagnostic tracing setup.
//!
//! Diagnostics never share a stream with the chat transcript: by default they
//! go to a file in the data directory, and `--verbose` sends them to stderr.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "ollama-chat.log";

pub fn log_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_FILE_NAME)
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// Failure to open the log file disables diagnostics rather than aborting.
pub fn init_tracing(level: &str, verbose: bool, log_path: &Path) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let init_result = if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        if let Some(parent) = log_path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                eprintln!(
                    "⚠️  Could not create log directory {}: {err}",
                    parent.display()
                );
                return;
            }
        }
        let file = match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("⚠️  Could not open {}: {err}", log_path.display());
                return;
            }
        };
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .try_init()
    };

    if let Err(err) = init_result {
        eprintln!("⚠️  Failed to initialize diagnostics: {err}");
    }
}
