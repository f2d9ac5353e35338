//! Main message loop.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::agent::router::Command;
use crate::channels::{ChannelManager, IncomingMessage, Reply};
use crate::collector::{FIELDS, InMemorySessionStore, InputCollector};
use crate::config::SessionConfig;
use crate::error::{CalcError, ChannelError};

/// Reply to `/start` and to answers sent outside a calculation.
pub const GREETING: &str = "Привет! Напиши /calc чтобы начать расчёт.";

const CANCELLED: &str = "Расчёт отменён. Напиши /calc чтобы начать заново.";
const NOTHING_TO_CANCEL: &str = "Нет активного расчёта. Напиши /calc чтобы начать.";
const INTERNAL_ERROR: &str = "Что-то пошло не так. Напиши /calc чтобы начать заново.";

/// Dispatches channel messages to the collector.
pub struct Bot {
    channels: Arc<ChannelManager>,
    collector: Arc<InputCollector>,
}

impl Bot {
    pub fn new(channels: Arc<ChannelManager>, collector: Arc<InputCollector>) -> Self {
        Self {
            channels,
            collector,
        }
    }

    /// Produce the reply for one message.
    pub fn handle_message(&self, msg: &IncomingMessage) -> Reply {
        let user_id = msg.user_id.as_str();

        let reply = match Command::parse(&msg.content) {
            Some(Command::Start) => {
                self.collector.cancel(user_id);
                GREETING.to_string()
            }
            Some(Command::Calc) => self.collector.start(user_id).to_string(),
            Some(Command::Cancel) => {
                if self.collector.cancel(user_id) {
                    CANCELLED.to_string()
                } else {
                    NOTHING_TO_CANCEL.to_string()
                }
            }
            Some(Command::Help) => self.help_text(user_id),
            Some(Command::Unknown(name)) => {
                format!("Неизвестная команда /{}. Доступны: /calc, /cancel, /help.", name)
            }
            None => match self.collector.submit(user_id, &msg.content) {
                Ok(outcome) => outcome.text(),
                Err(CalcError::NoActiveSession { .. }) => GREETING.to_string(),
                Err(e) => {
                    tracing::error!(user_id, channel = msg.channel(), "Calculation failed: {}", e);
                    INTERNAL_ERROR.to_string()
                }
            },
        };

        msg.reply(reply)
    }

    fn help_text(&self, user_id: &str) -> String {
        let mut text = String::from(GREETING);
        text.push_str("\n\nЯ задам вопросы по порядку:\n");
        for field in FIELDS.iter() {
            text.push_str(field.prompt);
            text.push('\n');
        }
        text.push_str("\nДробные числа можно писать через запятую. /cancel отменяет расчёт.");
        if let Some(field) = self.collector.current_field(user_id) {
            text.push_str("\n\nСейчас жду ответ на вопрос:\n");
            text.push_str(field.prompt);
        }
        text
    }

    /// Process messages from every channel until all streams end.
    ///
    /// Messages are handled one at a time in arrival order, so answers from a
    /// single user are never reordered.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let mut messages = self.channels.start_all().await?;
        let unhealthy = self.channels.check_health().await;
        if !unhealthy.is_empty() {
            tracing::warn!(channels = ?unhealthy, "Some channels are not healthy at startup");
        }

        while let Some(msg) = messages.next().await {
            tracing::debug!(
                user_id = %msg.user_id,
                user_name = ?msg.user_name,
                channel = msg.channel(),
                "Received message"
            );
            let reply = self.handle_message(&msg);
            if let Err(e) = self.channels.send(reply).await {
                tracing::error!(channel = msg.channel(), "Failed to send reply: {}", e);
            }
        }

        tracing::info!("All channels closed");
        self.channels.shutdown_all().await;
        Ok(())
    }
}

/// Periodically drop sessions idle longer than the configured timeout.
///
/// Returns `None` when idle expiry is disabled.
pub fn spawn_session_pruner(
    store: Arc<InMemorySessionStore>,
    config: SessionConfig,
) -> Option<JoinHandle<()>> {
    let max_idle = config.idle_timeout?;

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.prune_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = store.prune_stale(max_idle);
            tracing::debug!(pruned, active = store.len(), "Session sweep finished");
        }
    }))
}
