use std::sync::Arc;

use tokio::sync::mpsc;

use super::TurnSnapshot;

#[derive(Debug)]
pub enum Event {
    /// Emitted after every frame that changed the turn, and once more with a
    /// terminal state.
    Turn(TurnSnapshot),

    /// The conversation got its remote session and a derived title.
    SessionAssociated {
        conversation_id: String,
        session_id: String,
        title: String,
    },
}

#[async_trait::async_trait]
pub trait EventTx {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>>;
}

#[async_trait::async_trait]
impl EventTx for mpsc::Sender<Event> {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.send(event).await
    }
}

#[async_trait::async_trait]
impl EventTx for mpsc::UnboundedSender<Event> {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.send(event)
    }
}

pub type ArcEventTx = Arc<dyn EventTx + Send + Sync>;
