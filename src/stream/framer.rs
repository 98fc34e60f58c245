#[cfg(test)]
#[path = "framer_test.rs"]
mod tests;

use crate::config::constants::FRAME_PREFIX;

/// Cuts decoded text into lines. A line without its terminating newline is
/// kept until the next push or until [`LineSplitter::finish`].
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return vec![];
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);
        complete.lines().map(str::to_string).collect()
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}

/// JSON text of a frame line, or `None` for anything that is not a
/// non-empty `data:` line.
pub fn frame_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix(FRAME_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    Some(payload)
}
