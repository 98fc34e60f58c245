use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// Line-oriented prompts on stdin.
pub struct Input {
    lines: Lines<BufReader<Stdin>>,
}

impl Input {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one line. `None` on end of input.
    pub async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(prompt.as_bytes())
            .await
            .wrap_err("writing prompt")?;
        stdout.flush().await.wrap_err("flushing prompt")?;

        let line = self.lines.next_line().await.wrap_err("reading stdin")?;
        Ok(line.map(|line| line.trim_end_matches('\r').to_string()))
    }

    /// Use `value` when given, otherwise ask for it.
    pub async fn value_or_prompt(&mut self, value: Option<String>, prompt: &str) -> Result<String> {
        if let Some(value) = value {
            return Ok(value);
        }
        Ok(self.read_line(prompt).await?.unwrap_or_default())
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}
