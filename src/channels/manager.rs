//! Registry of the transports the bot runs on.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use futures::StreamExt;
use futures::stream;

use crate::channels::{Channel, MessageStream, Reply};
use crate::error::ChannelError;

/// Channels keyed by name. Filled before the bot starts, read-only afterwards.
#[derive(Default)]
pub struct ChannelManager {
    channels: BTreeMap<&'static str, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel. Each name may be registered once.
    pub fn register(&mut self, channel: Box<dyn Channel>) -> Result<(), ChannelError> {
        match self.channels.entry(channel.name()) {
            Entry::Occupied(entry) => Err(ChannelError::StartupFailed {
                name: entry.key().to_string(),
                reason: "registered twice".to_string(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(channel = entry.key(), "Registered channel");
                entry.insert(channel);
                Ok(())
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.channels.keys().copied().collect()
    }

    /// Start every channel and merge their messages into one stream.
    ///
    /// A channel that fails to start is logged and left out. Fails only when
    /// none started.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            match channel.start().await {
                Ok(messages) => {
                    tracing::info!(channel = name, "Channel started");
                    streams.push(messages);
                }
                Err(e) => tracing::error!(channel = name, "Channel failed to start: {}", e),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".to_string(),
                reason: "no channel started".to_string(),
            });
        }
        Ok(stream::select_all(streams).boxed())
    }

    /// Check every channel. Returns the names of the unhealthy ones.
    pub async fn check_health(&self) -> Vec<&'static str> {
        let mut unhealthy = Vec::new();
        for (name, channel) in &self.channels {
            if let Err(e) = channel.health_check().await {
                tracing::warn!(channel = name, "Health check failed: {}", e);
                unhealthy.push(*name);
            }
        }
        unhealthy
    }

    /// Hand the reply to the channel its route belongs to.
    pub async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        let name = reply.route.channel();
        match self.channels.get(name) {
            Some(channel) => channel.send(reply).await,
            None => Err(ChannelError::SendFailed {
                name: name.to_string(),
                reason: format!("no such channel for user {}", reply.user_id),
            }),
        }
    }

    pub async fn shutdown_all(&self) {
        for (name, channel) in &self.channels {
            channel.shutdown().await;
            tracing::debug!(channel = name, "Channel stopped");
        }
    }
}
