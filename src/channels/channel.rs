//! Messages exchanged with transports and the [`Channel`] trait.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::ChannelError;

/// Transport-specific address a reply has to be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRoute {
    /// The local terminal.
    Repl,
    /// A Telegram private chat.
    Telegram { chat_id: i64 },
    /// A webhook request, possibly still waiting for its answer.
    Http { request_id: Uuid },
}

impl ReplyRoute {
    /// Name of the channel that owns this route.
    pub fn channel(&self) -> &'static str {
        match self {
            ReplyRoute::Repl => "repl",
            ReplyRoute::Telegram { .. } => "telegram",
            ReplyRoute::Http { .. } => "http",
        }
    }
}

/// A line of text sent by a seller.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Sessions are keyed by this id, so it must be stable per seller.
    pub user_id: String,
    pub user_name: Option<String>,
    pub content: String,
    pub route: ReplyRoute,
}

impl IncomingMessage {
    pub fn new(route: ReplyRoute, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            route,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn channel(&self) -> &'static str {
        self.route.channel()
    }

    /// Answer addressed to the sender of this message.
    pub fn reply(&self, content: impl Into<String>) -> Reply {
        Reply {
            user_id: self.user_id.clone(),
            content: content.into(),
            route: self.route,
        }
    }
}

/// Text for one seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub user_id: String,
    pub content: String,
    pub route: ReplyRoute,
}

pub type MessageStream = BoxStream<'static, IncomingMessage>;

/// A transport the bot talks through.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Must equal [`ReplyRoute::channel`] for every route the channel emits.
    fn name(&self) -> &'static str;

    /// Begin receiving. The stream ends when the transport closes for good.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a reply whose route belongs to this channel.
    async fn send(&self, reply: Reply) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) {}
}
