use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::{HistorySource, HistoryTurn};
use guildmind_common::{Error, Result};
use serenity::all::{ChannelId, Message, MessageId, MessageType, UserId};
use serenity::builder::GetMessages;
use serenity::http::Http;

/// Channel history preceding the triggering message, shaped for the
/// conversation builder.
pub struct DiscordHistory {
    http: Arc<Http>,
    channel_id: ChannelId,
    before: MessageId,
    bot_user_id: UserId,
}

impl DiscordHistory {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, before: MessageId, bot_user_id: UserId) -> Self {
        Self {
            http,
            channel_id,
            before,
            bot_user_id,
        }
    }
}

pub(crate) fn to_turn(message: &Message, bot_user_id: UserId) -> HistoryTurn {
    HistoryTurn {
        author_display: message
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| message.author.name.clone()),
        content: message.content.clone(),
        from_self: message.author.id == bot_user_id,
        has_attachment: !message.attachments.is_empty(),
    }
}

#[async_trait]
impl HistorySource for DiscordHistory {
    async fn recent_turns(&self, limit: usize) -> Result<Vec<HistoryTurn>> {
        let messages = self
            .channel_id
            .messages(
                &self.http,
                GetMessages::new()
                    .before(self.before)
                    .limit(limit.min(100) as u8),
            )
            .await
            .map_err(|e| Error::Discord(e.to_string()))?;

        // Discord returns newest-first, which is what the builder expects;
        // system messages (joins, pins, boosts) are not conversation.
        Ok(messages
            .iter()
            .filter(|m| m.kind == MessageType::Regular || m.kind == MessageType::InlineReply)
            .map(|m| to_turn(m, self.bot_user_id))
            .collect())
    }
}
