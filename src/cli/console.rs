#[cfg(test)]
#[path = "console_test.rs"]
mod tests;

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::render::TurnPrinter;
use crate::chat::ChatService;
use crate::models::{ArcEventTx, Event};
use crate::stream::TurnOutcome;

/// Runs chat turns in the foreground. Events of a turn are printed on the
/// calling task, so a turn's output is complete once [`ChatConsole::send`]
/// returns.
pub struct ChatConsole<W: Write> {
    service: ChatService,
    app_id: i64,
    event_tx: ArcEventTx,
    event_rx: mpsc::UnboundedReceiver<Event>,
    printer: TurnPrinter<W>,
}

impl<W: Write> ChatConsole<W> {
    pub fn new(service: ChatService, app_id: i64, out: W) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        Self {
            service,
            app_id,
            event_tx: Arc::new(event_tx),
            event_rx,
            printer: TurnPrinter::new(out),
        }
    }

    pub fn app_id(&self) -> i64 {
        self.app_id
    }

    /// Submit `message` on `conversation_id` and print the answer as it
    /// streams. When `interrupt` resolves the turn is cancelled and what was
    /// received so far is kept.
    pub async fn send<I>(
        &mut self,
        conversation_id: &str,
        message: &str,
        interrupt: I,
    ) -> Result<TurnOutcome>
    where
        I: Future<Output = std::io::Result<()>>,
    {
        let cancel = CancellationToken::new();
        let submit = self.service.submit(
            conversation_id,
            self.app_id,
            message,
            Arc::clone(&self.event_tx),
            &cancel,
        );
        tokio::pin!(submit);
        tokio::pin!(interrupt);

        let res = loop {
            tokio::select! {
                res = &mut submit => break res,
                Some(event) = self.event_rx.recv() => print_event(&mut self.printer, &event),
                signal = &mut interrupt, if !cancel.is_cancelled() => {
                    if let Err(err) = signal {
                        log::warn!("listening for interrupt: {}", err);
                    }
                    log::debug!("interrupt received, cancelling turn");
                    cancel.cancel();
                }
            }
        };

        // Whatever the turn published before returning is already queued
        while let Ok(event) = self.event_rx.try_recv() {
            print_event(&mut self.printer, &event);
        }
        res
    }
}

fn print_event<W: Write>(printer: &mut TurnPrinter<W>, event: &Event) {
    if let Err(err) = printer.handle(event) {
        log::error!("Failed to print event: {}", err);
    }
}

/// Wait for the next input line unless `interrupt` resolves first, in
/// which case the result is `None` like end of input.
pub async fn read_or_interrupt<R, I>(read: R, interrupt: I) -> Result<Option<String>>
where
    R: Future<Output = Result<Option<String>>>,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = read => line,
        signal = interrupt => {
            signal.wrap_err("listening for interrupt")?;
            Ok(None)
        }
    }
}
