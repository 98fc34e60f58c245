#[cfg(test)]
#[path = "conversations_test.rs"]
mod tests;

use eyre::{Context, Result, bail};
use tokio::sync::Mutex;

use super::{ArcStore, CONVERSATIONS_KEY, CURRENT_CONVERSATION_KEY};
use crate::config::constants::DEFAULT_CONVERSATION_ID;
use crate::models::{Conversation, Message, TurnAccumulator};

/// The locally persisted conversation list and the current selection.
///
/// Every read-modify-write of the list goes through one lock, so turns
/// committing on different conversations never drop each other's updates.
pub struct ConversationBook {
    store: ArcStore,
    lock: Mutex<()>,
}

/// Handles for a submission that has been recorded but not yet answered.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    /// Id of the bot placeholder message; the turn only ever writes to it.
    pub turn_id: String,
    pub conversation_id: String,
    /// Remote session to resume, if the conversation already has one.
    pub session_id: Option<String>,
}

/// Result of committing a turn.
#[derive(Debug, Clone)]
pub struct Commit {
    pub conversation: Conversation,
    /// The conversation got its remote session with this commit.
    pub session_associated: bool,
}

impl ConversationBook {
    pub fn new(store: ArcStore) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// All conversations, oldest first. A missing or unreadable list yields
    /// the single default conversation.
    pub async fn list(&self) -> Result<Vec<Conversation>> {
        let raw = self.store.get(CONVERSATIONS_KEY).await?;
        let conversations = match raw {
            Some(raw) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(list) if !list.is_empty() => list,
                Ok(_) => default_list(),
                Err(err) => {
                    log::warn!("discarding unreadable conversation list: {}", err);
                    default_list()
                }
            },
            None => default_list(),
        };
        Ok(conversations)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let conversations = self.list().await?;
        Ok(conversations.into_iter().find(|c| c.id() == id))
    }

    /// The selected conversation, falling back to the first one.
    pub async fn current(&self) -> Result<Conversation> {
        let conversations = self.list().await?;
        let selected = self.store.get(CURRENT_CONVERSATION_KEY).await?;
        let current = pick_current(conversations, selected.as_deref());
        Ok(current)
    }

    pub async fn select(&self, id: &str) -> Result<Conversation> {
        let Some(conversation) = self.get(id).await? else {
            bail!("conversation {} not found", id);
        };
        self.store.set(CURRENT_CONVERSATION_KEY, id).await?;
        Ok(conversation)
    }

    /// Append an empty conversation and make it current.
    pub async fn new_conversation(&self) -> Result<Conversation> {
        let _guard = self.lock.lock().await;
        let mut conversations = self.list().await?;
        let conversation = Conversation::new((conversations.len() + 1).to_string());
        conversations.push(conversation.clone());
        self.save(&conversations).await?;
        self.store
            .set(CURRENT_CONVERSATION_KEY, conversation.id())
            .await?;
        Ok(conversation)
    }

    /// Record the user's query and an empty bot placeholder. The retrieval
    /// list shown for the conversation is cleared for the new turn.
    pub async fn begin_turn(&self, conversation_id: &str, query: &str) -> Result<PendingTurn> {
        let _guard = self.lock.lock().await;
        let mut conversations = self.list().await?;
        let Some(conversation) = conversations.iter_mut().find(|c| c.id() == conversation_id)
        else {
            bail!("conversation {} not found", conversation_id);
        };

        let placeholder = Message::new_bot("");
        let pending = PendingTurn {
            turn_id: placeholder.id().to_string(),
            conversation_id: conversation_id.to_string(),
            session_id: conversation.session_id().map(str::to_string),
        };

        conversation.append_message(Message::new_user(query));
        conversation.append_message(placeholder);
        conversation.set_retrieved_context(vec![]);

        self.save(&conversations).await?;
        Ok(pending)
    }

    /// Write the final value of a turn into its own bot message. Other
    /// messages and conversations are left as they are in the store.
    pub async fn commit_turn(&self, turn: &PendingTurn, result: &TurnAccumulator) -> Result<Commit> {
        let _guard = self.lock.lock().await;
        let mut conversations = self.list().await?;
        let Some(conversation) = conversations
            .iter_mut()
            .find(|c| c.id() == turn.conversation_id)
        else {
            bail!("conversation {} not found", turn.conversation_id);
        };

        match conversation.message_mut(&turn.turn_id) {
            Some(message) => message.set_text(result.answer_text()),
            None => log::warn!(
                "turn {} has no placeholder in conversation {}",
                turn.turn_id,
                turn.conversation_id
            ),
        }
        conversation.set_retrieved_context(result.retrieved_context().to_vec());

        let mut session_associated = false;
        if result.ended() {
            if let Some(session_id) = result.session_id() {
                session_associated = conversation.associate_session(session_id);
            }
        }

        let conversation = conversation.clone();
        self.save(&conversations).await?;
        Ok(Commit {
            conversation,
            session_associated,
        })
    }

    async fn save(&self, conversations: &[Conversation]) -> Result<()> {
        let raw = serde_json::to_string(conversations).wrap_err("serializing conversations")?;
        self.store.set(CONVERSATIONS_KEY, &raw).await
    }
}

fn default_list() -> Vec<Conversation> {
    vec![Conversation::new(DEFAULT_CONVERSATION_ID)]
}

fn pick_current(conversations: Vec<Conversation>, selected: Option<&str>) -> Conversation {
    let mut fallback = None;
    for conversation in conversations {
        if Some(conversation.id()) == selected {
            return conversation;
        }
        if fallback.is_none() {
            fallback = Some(conversation);
        }
    }
    fallback.unwrap_or_else(|| Conversation::new(DEFAULT_CONVERSATION_ID))
}
