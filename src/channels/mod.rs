//! Message transports.
//!
//! - [`ReplChannel`]: interactive terminal session for a single local user
//! - [`TelegramChannel`]: Telegram Bot API via long polling
//! - [`HttpChannel`]: JSON webhook, served by [`WebhookServer`]
//!
//! Every message carries a [`ReplyRoute`] naming its transport and address.
//! [`ChannelManager`] merges the channels' streams and delivers each
//! [`Reply`] along its route.

mod channel;
mod http;
mod manager;
mod repl;
mod telegram;
mod webhook_server;

pub use channel::{Channel, IncomingMessage, MessageStream, Reply, ReplyRoute};
pub use http::HttpChannel;
pub use manager::ChannelManager;
pub use repl::ReplChannel;
pub use telegram::TelegramChannel;
pub use webhook_server::WebhookServer;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Mutex;

    use super::*;
    use crate::error::ChannelError;

    /// Stands in for the terminal: replays a script of `(user_id, text)`
    /// lines and records every reply as `(user_id, content)`.
    pub(crate) struct RecordingChannel {
        script: Mutex<Vec<IncomingMessage>>,
        sent: Arc<Mutex<Vec<(String, String)>>>,
        healthy: bool,
    }

    impl RecordingChannel {
        pub(crate) fn new(script: Vec<(&str, &str)>) -> Self {
            let script = script
                .into_iter()
                .map(|(user, text)| IncomingMessage::new(ReplyRoute::Repl, user, text))
                .collect();
            Self {
                script: Mutex::new(script),
                sent: Arc::new(Mutex::new(Vec::new())),
                healthy: true,
            }
        }

        pub(crate) fn unhealthy(mut self) -> Self {
            self.healthy = false;
            self
        }

        pub(crate) fn sent(&self) -> Arc<Mutex<Vec<(String, String)>>> {
            Arc::clone(&self.sent)
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &'static str {
            ReplyRoute::Repl.channel()
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let script = std::mem::take(&mut *self.script.lock().await);
            Ok(futures::stream::iter(script).boxed())
        }

        async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
            self.sent.lock().await.push((reply.user_id, reply.content));
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            if self.healthy {
                Ok(())
            } else {
                Err(ChannelError::HealthCheckFailed {
                    name: self.name().to_string(),
                })
            }
        }
    }
}
