#[cfg(test)]
#[path = "render_test.rs"]
mod tests;

use std::io::Write;

use eyre::{Context, Result};

use crate::models::{ContextItem, Event, TurnSnapshot, TurnState};

const EXCERPT_CHARS: usize = 80;

/// Prints turn snapshots as a growing answer. Appended text is written as
/// it arrives; a replaced answer is printed again on a fresh line.
pub struct TurnPrinter<W: Write> {
    out: W,
    turn_id: Option<String>,
    printed: String,
    show_context: bool,
}

impl<W: Write> TurnPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            turn_id: None,
            printed: String::new(),
            show_context: true,
        }
    }

    pub fn with_context(mut self, show_context: bool) -> Self {
        self.show_context = show_context;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Turn(snapshot) => self.print_snapshot(snapshot),
            Event::SessionAssociated {
                conversation_id,
                session_id,
                title,
            } => {
                log::info!(
                    "conversation {} bound to session {} as {:?}",
                    conversation_id,
                    session_id,
                    title
                );
                Ok(())
            }
        }
    }

    fn print_snapshot(&mut self, snapshot: &TurnSnapshot) -> Result<()> {
        if self.turn_id.as_deref() != Some(snapshot.turn_id.as_str()) {
            self.turn_id = Some(snapshot.turn_id.clone());
            self.printed.clear();
        }

        let text = snapshot.answer_text.as_str();
        match text.strip_prefix(self.printed.as_str()) {
            Some(rest) => write!(self.out, "{}", rest)?,
            None => write!(self.out, "\n{}", text)?,
        }
        self.printed = text.to_string();

        if snapshot.state.is_terminal() {
            writeln!(self.out)?;
            if snapshot.state == TurnState::Cancelled {
                writeln!(self.out, "[cancelled]")?;
            }
            if self.show_context && !snapshot.retrieved_context.is_empty() {
                self.print_context(&snapshot.retrieved_context)?;
            }
        }

        self.out.flush().wrap_err("flushing output")?;
        Ok(())
    }

    fn print_context(&mut self, items: &[ContextItem]) -> Result<()> {
        writeln!(self.out, "Sources:")?;
        for (index, item) in items.iter().enumerate() {
            writeln!(
                self.out,
                "  [{}] {}: {}",
                index + 1,
                item.id,
                excerpt(&item.content)
            )?;
        }
        Ok(())
    }
}

/// Single-line prefix of `content`.
pub fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let mut short: String = flat.chars().take(EXCERPT_CHARS).collect();
    short.push_str("...");
    short
}
