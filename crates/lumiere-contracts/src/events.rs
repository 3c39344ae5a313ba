use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{json, Map, Value};

use crate::runs::summary::now_utc_iso;

pub type EventPayload = Map<String, Value>;

/// Session log written to `events.jsonl`, one compact JSON object per line.
///
/// Every event is stamped with its `type`, the `session_id`, a monotonically
/// increasing `seq` and a UTC `ts`. Keys in the caller's payload win over the
/// stamp. Clones append through one lock and one counter.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    seq: AtomicU64,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                seq: AtomicU64::new(0),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;

        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst);
        let mut event = match json!({
            "type": event_type,
            "session_id": self.inner.session_id,
            "seq": seq,
            "ts": now_utc_iso(),
        }) {
            Value::Object(stamp) => stamp,
            _ => Map::new(),
        };
        event.extend(payload);

        let line = serde_json::to_string(&event)?;
        append_line(&self.inner.path, &line)?;
        Ok(Value::Object(event))
    }
}

/// Reads back the `type` field of every well-formed line, skipping garbage.
pub fn read_event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}")?;
    Ok(())
}
