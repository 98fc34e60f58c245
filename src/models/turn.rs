use std::fmt::Display;

use super::ContextItem;
use crate::config::constants::ERROR_MARKER;

/// Lifecycle of one turn. `Committed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Streaming,
    Committed,
    Failed,
    Cancelled,
}

/// Running view of one streamed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnAccumulator {
    answer_text: String,
    retrieved_context: Vec<ContextItem>,
    session_id: Option<String>,
    ended: bool,
}

/// Copy of the accumulator handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSnapshot {
    pub turn_id: String,
    pub conversation_id: String,
    pub state: TurnState,
    pub answer_text: String,
    pub retrieved_context: Vec<ContextItem>,
    pub session_id: Option<String>,
    pub ended: bool,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Committed | TurnState::Failed | TurnState::Cancelled
        )
    }
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn retrieved_context(&self) -> &[ContextItem] {
        &self.retrieved_context
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the `message_end` marker has been seen.
    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn append_text(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.answer_text.push_str(text);
        true
    }

    pub fn replace_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.answer_text == text {
            return false;
        }
        self.answer_text = text;
        true
    }

    pub fn replace_context(&mut self, items: Vec<ContextItem>) -> bool {
        if self.retrieved_context == items {
            return false;
        }
        self.retrieved_context = items;
        true
    }

    /// First write wins: later identifiers are ignored.
    pub fn record_session(&mut self, session_id: &str) -> bool {
        if self.session_id.is_some() || session_id.is_empty() {
            return false;
        }
        self.session_id = Some(session_id.to_string());
        true
    }

    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    /// Replace whatever was streamed so far with the error marker.
    pub fn fail(&mut self, err: impl Display) {
        self.answer_text = format!("{} {}", ERROR_MARKER, err);
    }

    pub fn snapshot(
        &self,
        turn_id: &str,
        conversation_id: &str,
        state: TurnState,
    ) -> TurnSnapshot {
        TurnSnapshot {
            turn_id: turn_id.to_string(),
            conversation_id: conversation_id.to_string(),
            state,
            answer_text: self.answer_text.clone(),
            retrieved_context: self.retrieved_context.clone(),
            session_id: self.session_id.clone(),
            ended: self.ended,
        }
    }
}

impl Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::Streaming => write!(f, "streaming"),
            TurnState::Committed => write!(f, "committed"),
            TurnState::Failed => write!(f, "failed"),
            TurnState::Cancelled => write!(f, "cancelled"),
        }
    }
}
