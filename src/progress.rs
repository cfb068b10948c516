// Progress log - append-only audit trail, one "<timestamp>,<message>" per line

use crate::error::{EtlError, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// e.g. 2026-Oct-18-09:14:03
pub const TIMESTAMP_FORMAT: &str = "%Y-%b-%d-%H:%M:%S";

/// Sink for stage-transition messages
pub trait ProgressSink {
    fn log(&self, message: &str) -> Result<()>;
}

pub fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("{},{}\n", at.format(TIMESTAMP_FORMAT), message)
}

/// File-backed log; the file is created on first write and only appended to
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressLog { path: path.into() }
    }
}

impl ProgressSink for ProgressLog {
    fn log(&self, message: &str) -> Result<()> {
        let line = format_line(Local::now(), message);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                EtlError::Storage(format!("failed to open progress log {}: {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| EtlError::Storage(format!("failed to append progress log: {}", e)))?;

        info!("{}", message);
        Ok(())
    }
}

/// In-memory sink, handy for embedding and tests
#[derive(Default)]
pub struct MemoryLog {
    messages: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl ProgressSink for MemoryLog {
    fn log(&self, message: &str) -> Result<()> {
        self.messages
            .lock()
            .map_err(|_| EtlError::Storage("progress log lock poisoned".into()))?
            .push(message.to_string());
        Ok(())
    }
}
