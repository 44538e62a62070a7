//! Append-only JSON conversation log with merge-on-flush

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use recall_core::{Message, Result, Role};

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Records already on disk before the flush.
    pub existing: usize,
    /// Records appended by this flush.
    pub appended: usize,
}

impl FlushReport {
    pub fn total(&self) -> usize {
        self.existing + self.appended
    }
}

/// On-disk log of every message seen in a session, deduplicated by id.
///
/// The file is a JSON array of records `{id, type, content, ...}`. Records
/// are never removed; unknown fields on existing records are kept as-is.
/// Flushes through one `PersistedLog` are serialized; two instances pointing
/// at the same file are not.
#[derive(Debug)]
pub struct PersistedLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PersistedLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merges `messages` into the log. Messages whose id is already present
    /// are skipped, so repeated flushes of overlapping buffers are harmless.
    /// A missing, empty or unparsable file counts as an empty log.
    pub async fn flush(&self, messages: &[Message]) -> Result<FlushReport> {
        self.flush_with(|| messages.to_vec()).await
    }

    /// Like [`flush`](Self::flush), but takes the messages from `snapshot`
    /// after the write lock is held. Concurrent flushes of a live buffer then
    /// append in the order the buffer had when each one got the lock.
    pub async fn flush_with<F>(&self, snapshot: F) -> Result<FlushReport>
    where
        F: FnOnce() -> Vec<Message>,
    {
        let _guard = self.write_lock.lock().await;
        let messages = snapshot();

        let mut records = read_records(&self.path).await;
        let existing = records.len();

        let mut known: HashSet<String> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| record_id(i, r))
            .collect();

        for message in &messages {
            if known.insert(message.id().to_string()) {
                records.push(serde_json::to_value(message)?);
            }
        }

        let report = FlushReport {
            existing,
            appended: records.len() - existing,
        };

        if report.appended > 0 {
            write_records(&self.path, &records).await?;
        }

        Ok(report)
    }

    /// Every decodable message in the log, oldest first.
    pub async fn read_all(&self) -> Vec<Message> {
        load_messages(&self.path).await
    }
}

/// Reads the log at `path`. Unreadable files yield an empty list; records
/// that cannot be decoded are dropped individually.
pub async fn load_messages(path: &Path) -> Vec<Message> {
    let records = read_records(path).await;
    let total = records.len();

    let messages: Vec<Message> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| decode_record(i, r))
        .collect();

    if messages.len() < total {
        debug!(
            path = %path.display(),
            dropped = total - messages.len(),
            "Dropped undecodable log records"
        );
    }

    messages
}

/// Decodes the record at `index`. Returns `None` when `type` or `content` is
/// missing or `content` is not a string (including `null`).
pub fn decode_record(index: usize, record: &Value) -> Option<Message> {
    let object = record.as_object()?;
    let role = Role::from_type(object.get("type")?.as_str()?);
    let content = object.get("content")?.as_str()?;
    let id = record_id(index, record)?;

    let created_at = object
        .get("created_at")
        .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok())
        .unwrap_or_else(Utc::now);

    Some(Message::restore(id, role, content, created_at))
}

// Records written without an id get one derived from their position, which
// is stable because the log only ever grows at the end.
fn record_id(index: usize, record: &Value) -> Option<String> {
    let object = record.as_object()?;
    if let Some(id) = object.get("id").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    let tag = object.get("type").and_then(Value::as_str).unwrap_or("base");
    Some(format!("{}-record-{}", tag, index))
}

async fn read_records(path: &Path) -> Vec<Value> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No log file yet");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read log, treating as empty");
            return Vec::new();
        }
    };

    if raw.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed log, treating as empty");
            Vec::new()
        }
    }
}

// Writes next to the target and renames over it so a crash never leaves a
// truncated log behind.
async fn write_records(path: &Path, records: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
