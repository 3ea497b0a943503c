//! Line-oriented console input

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Source of user input lines
#[async_trait]
pub trait Console: Send {
    /// Show `prompt` and read one line; `None` at end of input
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Console over the process's stdin/stdout
///
/// Lines are read on a plain OS thread and handed over a channel. A read
/// blocked on the terminal then never holds up runtime shutdown.
pub struct StdinConsole {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl StdinConsole {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || read_lines(std::io::stdin().lock(), tx));
        Self { lines: rx }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward lines from `input` until end of input, an error, or the receiver goes away
fn read_lines(mut input: impl BufRead, tx: mpsc::Sender<std::io::Result<String>>) {
    loop {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.blocking_send(Ok(trimmed)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    tracing::debug!("stdin reader finished");
}

#[async_trait]
impl Console for StdinConsole {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(prompt.as_bytes())
                .context("Failed to write prompt")?;
            stdout.flush().context("Failed to flush stdout")?;
        }

        match self.lines.recv().await {
            Some(line) => line.map(Some).context("Failed to read from stdin"),
            None => Ok(None),
        }
    }
}
