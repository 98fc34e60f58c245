#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use eyre::Result;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::{ArcApi, ChatRequest, is_unauthorized};
use crate::models::{ArcEventTx, Event};
use crate::storage::ConversationBook;
use crate::stream::{Reconciler, TurnOutcome};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyQuery,

    #[error("conversation {0} is still waiting for an answer")]
    TurnInProgress(String),

    #[error("conversation {0} not found")]
    UnknownConversation(String),
}

/// Runs chat turns: records the query, streams the answer through a
/// [`Reconciler`] and commits the result into the conversation book.
/// At most one turn is pending per conversation.
pub struct ChatService {
    api: ArcApi,
    book: Arc<ConversationBook>,
    pending: Arc<Mutex<HashSet<String>>>,
}

/// Releases the conversation's pending slot when the turn is over, whichever
/// way it ended.
struct PendingSlot {
    pending: Arc<Mutex<HashSet<String>>>,
    conversation_id: String,
}

impl ChatService {
    pub fn new(api: ArcApi, book: Arc<ConversationBook>) -> Self {
        Self {
            api,
            book,
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn book(&self) -> &ConversationBook {
        &self.book
    }

    pub fn is_pending(&self, conversation_id: &str) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.contains(conversation_id)
    }

    /// Submit `query` to application `app_id` on behalf of a local
    /// conversation. Snapshots of the turn are published on `event_tx`;
    /// firing `cancel` stops the turn and keeps what was received.
    ///
    /// A rejected request still commits a failed turn. When the rejection
    /// is a 401 the error is returned afterwards so the caller can drop the
    /// credentials.
    pub async fn submit(
        &self,
        conversation_id: &str,
        app_id: i64,
        query: &str,
        event_tx: ArcEventTx,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery.into());
        }

        let _slot = self.reserve(conversation_id)?;

        if self.book.get(conversation_id).await?.is_none() {
            return Err(ChatError::UnknownConversation(conversation_id.to_string()).into());
        }

        let turn = self.book.begin_turn(conversation_id, query).await?;
        log::debug!(
            "turn {} started on conversation {} (session: {:?})",
            turn.turn_id,
            turn.conversation_id,
            turn.session_id
        );

        let reconciler = Reconciler::new(&turn.turn_id, &turn.conversation_id, event_tx.clone());
        let request = ChatRequest {
            query: query.to_string(),
            conversation_id: turn.session_id.clone(),
        };

        let mut rejected = None;
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.api.chat_stream(app_id, request) => Some(res),
        };
        let outcome = match opened {
            None => reconciler.cancel().await,
            Some(Ok(stream)) => reconciler.run(stream, cancel).await,
            Some(Err(err)) => {
                let outcome = reconciler.fail(format!("{:#}", err)).await;
                rejected = Some(err);
                outcome
            }
        };

        let commit = self.book.commit_turn(&turn, &outcome.accumulator).await?;
        if commit.session_associated {
            if let Some(session_id) = commit.conversation.session_id() {
                let event = Event::SessionAssociated {
                    conversation_id: commit.conversation.id().to_string(),
                    session_id: session_id.to_string(),
                    title: commit.conversation.title().to_string(),
                };
                if let Err(err) = event_tx.send(event).await {
                    log::warn!("session observer is gone: {}", err);
                }
            }
        }

        if let Some(err) = rejected {
            if is_unauthorized(&err) {
                return Err(err);
            }
        }
        Ok(outcome)
    }

    fn reserve(&self, conversation_id: &str) -> Result<PendingSlot, ChatError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.insert(conversation_id.to_string()) {
            return Err(ChatError::TurnInProgress(conversation_id.to_string()));
        }
        Ok(PendingSlot {
            pending: Arc::clone(&self.pending),
            conversation_id: conversation_id.to_string(),
        })
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&self.conversation_id);
    }
}
