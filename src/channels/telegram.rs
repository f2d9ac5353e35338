//! Telegram Bot API channel using long polling.
//!
//! Only private text messages from human users are turned into
//! [`IncomingMessage`]s. The sender's Telegram id becomes the session key and
//! the chat id travels in the reply route so answers reach the same chat.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::{Channel, IncomingMessage, MessageStream, Reply, ReplyRoute};
use crate::config::TelegramConfig;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "telegram";

/// Pause after a failed poll before retrying.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Extra time on top of the long-poll timeout before the HTTP request gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(10);

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram Update object.
/// https://core.telegram.org/bots/api#update
#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

/// Telegram Message object.
/// https://core.telegram.org/bots/api#message
#[derive(Debug, Deserialize)]
struct TelegramMessage {
    /// Sender (empty for channel posts).
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

/// Telegram User object.
/// https://core.telegram.org/bots/api#user
#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    is_bot: bool,
    first_name: String,
    username: Option<String>,
}

/// Telegram Chat object.
/// https://core.telegram.org/bots/api#chat
#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    /// private, group, supergroup, or channel.
    #[serde(rename = "type")]
    chat_type: String,
}

/// Telegram API response wrapper.
#[derive(Debug, Deserialize)]
struct TelegramApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Thin Bot API client.
struct TelegramApi {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramApi {
    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, ChannelError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // The token is part of the URL; strip URLs from errors so it never
        // reaches the logs.
        let url = format!(
            "{}/bot{}/{}",
            self.config.api_url,
            self.config.bot_token.expose_secret(),
            method
        );
        let response: TelegramApiResponse<T> = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| ChannelError::Http(e.without_url()))?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::Api {
                name: CHANNEL_NAME.to_string(),
                reason: response
                    .description
                    .unwrap_or_else(|| format!("{} failed", method)),
            }),
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>, ChannelError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.config.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &request, self.config.poll_timeout + REQUEST_SLACK)
            .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let text = truncate_chars(text, MAX_MESSAGE_CHARS);
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self.call("sendMessage", &request, REQUEST_SLACK).await?;
        Ok(())
    }
}

/// Telegram bot channel.
pub struct TelegramChannel {
    api: Arc<TelegramApi>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            api: Arc::new(TelegramApi { client, config }),
            poller: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "already started".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(256);
        let api = Arc::clone(&self.api);
        *poller = Some(tokio::spawn(poll_loop(api, tx)));

        tracing::info!("Telegram channel polling");
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        let ReplyRoute::Telegram { chat_id } = reply.route else {
            return Err(ChannelError::InvalidMessage {
                name: CHANNEL_NAME.to_string(),
                reason: format!("cannot deliver to {} route", reply.route.channel()),
            });
        };
        self.api.send_message(chat_id, &reply.content).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.api
            .call::<_, serde_json::Value>("getMe", &serde_json::json!({}), REQUEST_SLACK)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!("Telegram health check failed: {}", e);
                ChannelError::HealthCheckFailed {
                    name: CHANNEL_NAME.to_string(),
                }
            })
    }

    async fn shutdown(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
    }
}

async fn poll_loop(api: Arc<TelegramApi>, tx: mpsc::Sender<IncomingMessage>) {
    let mut offset = 0;
    loop {
        match api.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(msg) = update_to_message(update) {
                        if tx.send(msg).await.is_err() {
                            tracing::debug!("Telegram receiver dropped, stopping poller");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Telegram getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Convert an update into a message, skipping anything that is not a
/// private text message from a human.
fn update_to_message(update: TelegramUpdate) -> Option<IncomingMessage> {
    let message = update.message?;
    let from = message.from?;
    if from.is_bot || message.chat.chat_type != "private" {
        return None;
    }
    let text = message.text?;

    let route = ReplyRoute::Telegram {
        chat_id: message.chat.id,
    };
    let user_name = from.username.unwrap_or(from.first_name);

    Some(IncomingMessage::new(route, from.id.to_string(), text).with_user_name(user_name))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn parse(json: serde_json::Value) -> TelegramUpdate {
        serde_json::from_value(json).unwrap()
    }

    fn private_update(text: Option<&str>, is_bot: bool) -> TelegramUpdate {
        parse(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 77,
                "from": { "id": 4242, "is_bot": is_bot, "first_name": "Анна", "username": "anna" },
                "chat": { "id": 4242, "type": "private" },
                "date": 1700000000,
                "text": text
            }
        }))
    }

    #[test]
    fn test_private_text_becomes_message() {
        let msg = update_to_message(private_update(Some("/calc"), false)).unwrap();
        assert_eq!(msg.channel(), "telegram");
        assert_eq!(msg.user_id, "4242");
        assert_eq!(msg.user_name.as_deref(), Some("anna"));
        assert_eq!(msg.content, "/calc");
        assert_eq!(msg.route, ReplyRoute::Telegram { chat_id: 4242 });
    }

    #[test]
    fn test_skips_bots_and_non_text() {
        assert!(update_to_message(private_update(Some("hi"), true)).is_none());
        assert!(update_to_message(private_update(None, false)).is_none());
        assert!(update_to_message(parse(serde_json::json!({ "update_id": 11 }))).is_none());
    }

    #[test]
    fn test_skips_group_chats() {
        let update = parse(serde_json::json!({
            "update_id": 12,
            "message": {
                "message_id": 1,
                "from": { "id": 1, "is_bot": false, "first_name": "Bob" },
                "chat": { "id": -100, "type": "group", "title": "Sellers" },
                "text": "100"
            }
        }));
        assert!(update_to_message(update).is_none());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    #[tokio::test]
    async fn test_send_rejects_foreign_route() {
        let channel = TelegramChannel::new(TelegramConfig {
            bot_token: SecretString::from("123:abc".to_string()),
            api_url: "http://127.0.0.1:9".to_string(),
            poll_timeout: Duration::from_secs(1),
        })
        .unwrap();

        let msg = IncomingMessage::new(ReplyRoute::Repl, "4242", "hi");
        let result = channel.send(msg.reply("x")).await;
        assert!(matches!(result, Err(ChannelError::InvalidMessage { .. })));
    }
}
