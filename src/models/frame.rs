#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;

use serde_json::{Map, Value};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Message,
    WorkflowStarted,
    WorkflowFinished,
    NodeFinished,
    MessageEnd,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct StreamFrame {
    event: FrameEvent,
    payload: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame payload is not an object")]
    NotAnObject,
}

impl StreamFrame {
    /// Parse the JSON document carried by one `data:` line. The prefix must
    /// already be stripped.
    pub fn from_json(raw: &str) -> Result<Self, FrameError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(payload) => Ok(Self::from_payload(payload)),
            _ => Err(FrameError::NotAnObject),
        }
    }

    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let event = payload
            .get("event")
            .and_then(Value::as_str)
            .map(FrameEvent::from)
            .unwrap_or_else(|| FrameEvent::Other(String::new()));
        Self { event, payload }
    }

    pub fn event(&self) -> &FrameEvent {
        &self.event
    }

    /// Non-empty top-level string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        non_empty_str(self.payload.get(name))
    }

    /// The nested `data.outputs` object of workflow and node events.
    pub fn outputs(&self) -> Option<&Map<String, Value>> {
        self.payload
            .get("data")
            .and_then(|data| data.get("outputs"))
            .and_then(Value::as_object)
    }
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl From<&str> for FrameEvent {
    fn from(value: &str) -> Self {
        match value {
            "message" => FrameEvent::Message,
            "workflow_started" => FrameEvent::WorkflowStarted,
            "workflow_finished" => FrameEvent::WorkflowFinished,
            "node_finished" => FrameEvent::NodeFinished,
            "message_end" => FrameEvent::MessageEnd,
            other => FrameEvent::Other(other.to_string()),
        }
    }
}

impl Display for FrameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameEvent::Message => write!(f, "message"),
            FrameEvent::WorkflowStarted => write!(f, "workflow_started"),
            FrameEvent::WorkflowFinished => write!(f, "workflow_finished"),
            FrameEvent::NodeFinished => write!(f, "node_finished"),
            FrameEvent::MessageEnd => write!(f, "message_end"),
            FrameEvent::Other(tag) => write!(f, "{}", tag),
        }
    }
}
