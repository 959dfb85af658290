use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::ReplySurface;
use guildmind_common::{Error, Result};
use serenity::all::{ChannelId, MessageId};
use serenity::builder::EditMessage;
use serenity::http::Http;

/// The bot's in-progress reply message, as the renderer sees it.
pub struct DiscordSurface {
    http: Arc<Http>,
    channel_id: ChannelId,
    message_id: MessageId,
}

impl DiscordSurface {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            http,
            channel_id,
            message_id,
        }
    }
}

#[async_trait]
impl ReplySurface for DiscordSurface {
    async fn edit(&self, text: &str) -> Result<()> {
        self.channel_id
            .edit_message(
                &self.http,
                self.message_id,
                EditMessage::new().content(text),
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::Discord(e.to_string()))
    }

    async fn send_followup(&self, text: &str) -> Result<()> {
        self.channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| Error::Discord(e.to_string()))
    }
}
