//! Decoding of the Firebase REST streaming protocol (`text/event-stream`).
//!
//! The server sends `put` and `patch` events whose `data` field is `{"path": ..., "data": ...}`
//! relative to the subscribed location. A local mirror of the subscribed value is maintained
//! so every event can be turned into a full snapshot.

use serde::Deserialize;
use serde_json::Value;

use crate::dao::tree_store::{TreePath, value_at, write_at};

/// One complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct EventFrame {
    pub event: String,
    pub data: String,
}

/// Incremental splitter turning raw body chunks into complete frames.
#[derive(Debug, Default)]
pub(super) struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Feed a body chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<EventFrame> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw)) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_frame(raw: &str) -> Option<EventFrame> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data.is_empty() {
        return None;
    }
    if event.is_empty() {
        event = "message".into();
    }
    Some(EventFrame {
        event,
        data: data.join("\n"),
    })
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Outcome of applying one frame to the mirror.
#[derive(Debug, PartialEq)]
pub(super) enum MirrorUpdate {
    /// The subscribed value changed; carries the full new value.
    Changed(Option<Value>),
    Unchanged,
    /// The server closed the subscription.
    Cancelled(String),
}

/// Local copy of the value at the subscribed location.
#[derive(Debug, Default)]
pub(super) struct Mirror {
    value: Value,
}

impl Mirror {
    pub fn apply(&mut self, frame: &EventFrame) -> serde_json::Result<MirrorUpdate> {
        match frame.event.as_str() {
            "put" => {
                let change: ChangePayload = serde_json::from_str(&frame.data)?;
                write_at(&mut self.value, &TreePath::parse(&change.path), change.data);
                Ok(MirrorUpdate::Changed(self.current()))
            }
            "patch" => {
                let change: ChangePayload = serde_json::from_str(&frame.data)?;
                let base = TreePath::parse(&change.path);
                if let Value::Object(children) = change.data {
                    for (key, value) in children {
                        write_at(&mut self.value, &base.join(&TreePath::parse(&key)), value);
                    }
                }
                Ok(MirrorUpdate::Changed(self.current()))
            }
            "cancel" => Ok(MirrorUpdate::Cancelled(if frame.data.is_empty() {
                "cancelled by server".into()
            } else {
                frame.data.clone()
            })),
            "auth_revoked" => Ok(MirrorUpdate::Cancelled("auth revoked".into())),
            _ => Ok(MirrorUpdate::Unchanged),
        }
    }

    fn current(&self) -> Option<Value> {
        value_at(&self.value, &TreePath::root()).cloned()
    }
}
