#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use super::ContextItem;
use crate::config::constants::{TITLE_ELLIPSIS, TITLE_MAX_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    sender: Sender,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// A local conversation. `session_id` is the identifier the workflow
/// service issued for the remote dialogue; it lives alongside the local
/// `id` and never replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    id: String,
    title: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    retrieved_context: Vec<ContextItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn new_user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn new_bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: format!("New conversation {}", id),
            id,
            messages: vec![],
            retrieved_context: vec![],
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn retrieved_context(&self) -> &[ContextItem] {
        &self.retrieved_context
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|msg| msg.id == id)
    }

    pub fn set_retrieved_context(&mut self, items: Vec<ContextItem>) {
        self.retrieved_context = items;
    }

    /// Attach the remote session on first association only. The title is
    /// derived from the first message at the same time. Returns whether the
    /// conversation changed.
    pub fn associate_session(&mut self, session_id: &str) -> bool {
        if self.session_id.is_some() || session_id.is_empty() {
            return false;
        }
        self.session_id = Some(session_id.to_string());
        if let Some(first) = self.messages.first() {
            self.title = derive_title(first.text());
        }
        true
    }
}

/// First `TITLE_MAX_CHARS` characters of the text followed by an ellipsis.
pub fn derive_title(text: &str) -> String {
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}
