//! Interactive terminal channel.

use async_trait::async_trait;
use futures::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::{Channel, IncomingMessage, MessageStream, Reply, ReplyRoute};
use crate::error::ChannelError;

const PROMPT: &str = "> ";

/// Reads answers from the terminal on behalf of a single local user.
///
/// Line editing runs on a dedicated OS thread since rustyline blocks. The
/// stream ends on Ctrl-C or Ctrl-D.
pub struct ReplChannel {
    user_id: String,
}

impl ReplChannel {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl Channel for ReplChannel {
    fn name(&self) -> &'static str {
        ReplyRoute::Repl.channel()
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let mut editor = DefaultEditor::new().map_err(|e| ChannelError::StartupFailed {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel(32);
        let user_id = self.user_id.clone();

        std::thread::spawn(move || {
            loop {
                match editor.readline(PROMPT) {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let _ = editor.add_history_entry(line.as_str());
                        let msg = IncomingMessage::new(ReplyRoute::Repl, &user_id, line);
                        if tx.blocking_send(msg).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        tracing::debug!("REPL input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("REPL read error: {}", e);
                        break;
                    }
                }
            }
        });

        println!("Напиши /calc чтобы начать расчёт, /help для справки. Ctrl-D для выхода.");
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        println!("{}\n", reply.content);
        Ok(())
    }
}
