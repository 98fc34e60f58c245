#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{LineSplitter, Utf8Decoder, frame_payload};
use crate::config::constants::{LLM_RESPONSE_FIELD, RETRIEVAL_FIELD};
use crate::models::frame::non_empty_str;
use crate::models::{
    ArcEventTx, ContextItem, Event, FrameEvent, StreamFrame, TurnAccumulator, TurnSnapshot,
    TurnState,
};

/// Folds the event stream of one submission into a [`TurnAccumulator`],
/// publishing a snapshot after each frame that changed it.
pub struct Reconciler {
    turn_id: String,
    conversation_id: String,
    state: TurnState,
    accumulator: TurnAccumulator,
    decoder: Utf8Decoder,
    lines: LineSplitter,
    event_tx: ArcEventTx,
}

/// Final value of a turn, handed to whoever commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub state: TurnState,
    pub accumulator: TurnAccumulator,
}

impl Reconciler {
    pub fn new(
        turn_id: impl Into<String>,
        conversation_id: impl Into<String>,
        event_tx: ArcEventTx,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            conversation_id: conversation_id.into(),
            state: TurnState::Idle,
            accumulator: TurnAccumulator::new(),
            decoder: Utf8Decoder::new(),
            lines: LineSplitter::new(),
            event_tx,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn accumulator(&self) -> &TurnAccumulator {
        &self.accumulator
    }

    /// Drive the turn until the stream ends, fails or `cancel` fires.
    pub async fn run<S, B, E>(mut self, stream: S, cancel: &CancellationToken) -> TurnOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.state = TurnState::Streaming;
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("turn {} cancelled", self.turn_id);
                    return self.finish(TurnState::Cancelled).await;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => self.feed(chunk.as_ref()).await,
                Some(Err(err)) => return self.fail(err).await,
                None => break,
            }
        }

        let tail = self.decoder.finish();
        let mut lines = self.lines.push(&tail);
        lines.extend(self.lines.finish());
        for line in lines {
            self.handle_line(&line).await;
        }

        self.finish(TurnState::Committed).await
    }

    /// Abort the turn with a transport failure. The streamed text is replaced
    /// by the error marker.
    pub async fn fail(mut self, err: impl Display) -> TurnOutcome {
        log::error!("turn {} failed: {}", self.turn_id, err);
        self.accumulator.fail(err);
        self.finish(TurnState::Failed).await
    }

    /// Stop the turn before any data arrived.
    pub async fn cancel(self) -> TurnOutcome {
        log::debug!("turn {} cancelled", self.turn_id);
        self.finish(TurnState::Cancelled).await
    }

    /// Apply one frame. Returns whether observable state changed.
    pub fn fold(&mut self, frame: &StreamFrame) -> bool {
        match frame.event() {
            FrameEvent::Message => {
                let mut changed = self.record_session(frame);
                let Some(answer) = frame.str_field("answer") else {
                    return changed;
                };
                let (text, context) = unwrap_answer(answer);
                changed |= self.accumulator.append_text(&text);
                if let Some(items) = context {
                    changed |= self.accumulator.replace_context(items);
                }
                changed
            }
            FrameEvent::WorkflowStarted => self.record_session(frame),
            FrameEvent::NodeFinished => {
                let result = frame
                    .outputs()
                    .and_then(|outputs| outputs.get("result"))
                    .and_then(Value::as_array);
                match result {
                    Some(list) => self
                        .accumulator
                        .replace_context(ContextItem::from_list(list)),
                    None => false,
                }
            }
            FrameEvent::WorkflowFinished => {
                let answer = frame
                    .outputs()
                    .and_then(|outputs| non_empty_str(outputs.get("answer")));
                let Some(answer) = answer else {
                    return false;
                };
                let (text, context) = unwrap_answer(answer);
                let mut changed = self.accumulator.replace_text(text);
                if let Some(items) = context {
                    changed |= self.accumulator.replace_context(items);
                }
                changed
            }
            FrameEvent::MessageEnd => {
                self.record_session(frame);
                self.accumulator.mark_ended();
                false
            }
            FrameEvent::Other(tag) => {
                log::trace!("ignoring frame event {:?}", tag);
                false
            }
        }
    }

    fn record_session(&mut self, frame: &StreamFrame) -> bool {
        match frame.str_field("conversation_id") {
            Some(id) => self.accumulator.record_session(id),
            None => false,
        }
    }

    async fn feed(&mut self, chunk: &[u8]) {
        let text = self.decoder.decode(chunk);
        for line in self.lines.push(&text) {
            self.handle_line(&line).await;
        }
    }

    async fn handle_line(&mut self, line: &str) {
        let Some(payload) = frame_payload(line) else {
            return;
        };

        let frame = match StreamFrame::from_json(payload) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("skipping frame: {}; line: {}", err, line);
                return;
            }
        };

        log::trace!("turn {} frame {}", self.turn_id, frame.event());
        if self.fold(&frame) {
            self.emit().await;
        }
    }

    async fn finish(mut self, state: TurnState) -> TurnOutcome {
        if !self.state.is_terminal() {
            self.state = state;
            self.emit().await;
        }
        TurnOutcome {
            state: self.state,
            accumulator: self.accumulator,
        }
    }

    fn snapshot(&self) -> TurnSnapshot {
        self.accumulator
            .snapshot(&self.turn_id, &self.conversation_id, self.state)
    }

    async fn emit(&self) {
        if let Err(err) = self.event_tx.send(Event::Turn(self.snapshot())).await {
            log::warn!("turn {} observer is gone: {}", self.turn_id, err);
        }
    }
}

/// Split an `answer` value into its text and optional retrieval list. The
/// answer may itself be a JSON document carrying `llm_response` and `rag`;
/// anything else is taken verbatim.
pub fn unwrap_answer(answer: &str) -> (String, Option<Vec<ContextItem>>) {
    let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(answer) else {
        return (answer.to_string(), None);
    };

    match non_empty_str(doc.get(LLM_RESPONSE_FIELD)) {
        Some(text) => {
            let context = doc
                .get(RETRIEVAL_FIELD)
                .and_then(Value::as_array)
                .map(|list| ContextItem::from_list(list));
            (text.to_string(), context)
        }
        None => (answer.to_string(), None),
    }
}
