use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only writer for a studio session's `events.jsonl`.
///
/// Every line carries `type`, `session_id` and `ts`; the caller payload is
/// merged last and may override them. Clones share one file lock so batch
/// workers can log from several threads.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: Some(path.into()),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Writer that builds events but never touches the filesystem.
    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: None,
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_ref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-7");

        let mut payload = EventPayload::new();
        payload.insert("aspect_ratio".to_string(), Value::String("16:9".to_string()));
        let emitted = writer.emit("image_normalized", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("image_normalized".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-7".to_string()));
        assert_eq!(parsed["aspect_ratio"], Value::String("16:9".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_overrides_default_keys() -> anyhow::Result<()> {
        let writer = EventWriter::disabled("session-7");
        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        let emitted = writer.emit("generation_started", payload)?;
        assert_eq!(emitted["session_id"], Value::String("other".to_string()));
        assert_eq!(emitted["type"], Value::String("generation_started".to_string()));
        Ok(())
    }

    #[test]
    fn clones_append_to_the_same_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-7");
        let clone = writer.clone();

        std::thread::scope(|scope| {
            scope.spawn(|| writer.emit("one", EventPayload::new()).map(|_| ()));
            scope.spawn(|| clone.emit("two", EventPayload::new()).map(|_| ()));
        });

        let content = fs::read_to_string(&path)?;
        let mut kinds = content
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).map(|value| value["type"].clone()))
            .collect::<Result<Vec<Value>, _>>()?;
        kinds.sort_by_key(|value| value.to_string());
        assert_eq!(kinds, vec![Value::from("one"), Value::from("two")]);
        Ok(())
    }

    #[test]
    fn disabled_writer_has_no_path() -> anyhow::Result<()> {
        let writer = EventWriter::disabled("quiet");
        assert!(writer.path().is_none());
        writer.emit("generation_finished", EventPayload::new())?;
        Ok(())
    }
}
