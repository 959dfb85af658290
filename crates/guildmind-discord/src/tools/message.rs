use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::Result;
use serde_json::{Value, json};
use serenity::all::{ChannelId, Colour, MessageId, Timestamp};
use serenity::builder::{
    CreateEmbed, CreateEmbedFooter, CreateMessage, EditMember, GetMessages,
};
use serenity::http::Http;
use tracing::warn;

use super::{discord_err, guild_channel, id_arg, opt_u64, parse_reaction, require_admin, str_arg};

pub struct SendMessage {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for SendMessage {
    fn name(&self) -> &'static str {
        "send_message"
    }

    fn description(&self) -> &'static str {
        "Send a message to a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Discord channel id"},
                "content": {"type": "string", "description": "Message body"}
            },
            "required": ["channel_id", "content"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message = channel
            .say(&self.http, str_arg(&args, "content")?)
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!(
            "Message sent. Message id: {}",
            message.id
        )))
    }
}

pub struct SendEmbed {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for SendEmbed {
    fn name(&self) -> &'static str {
        "send_embed"
    }

    fn description(&self) -> &'static str {
        "Send an embed message to a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Discord channel id"},
                "title": {"type": "string", "description": "Embed title"},
                "description": {"type": "string", "description": "Embed body"},
                "color": {"type": "string", "description": "Hex color such as '#FF0000' (optional)"},
                "footer": {"type": "string", "description": "Footer text (optional)"}
            },
            "required": ["channel_id", "title", "description"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);

        let mut embed = CreateEmbed::new()
            .title(str_arg(&args, "title")?)
            .description(str_arg(&args, "description")?);

        if let Some(hex) = args.get("color").and_then(Value::as_str) {
            match u32::from_str_radix(hex.trim_start_matches('#'), 16) {
                Ok(value) => embed = embed.colour(Colour::new(value)),
                Err(_) => warn!("invalid color code '{hex}', using default"),
            }
        }
        if let Some(footer) = args.get("footer").and_then(Value::as_str) {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }

        let message = channel
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!(
            "Embed sent. Message id: {}",
            message.id
        )))
    }
}

pub struct ReadMessages {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for ReadMessages {
    fn name(&self) -> &'static str {
        "read_messages"
    }

    fn description(&self) -> &'static str {
        "Read recent messages from a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Discord channel id"},
                "limit": {"type": "number", "description": "How many messages (max 100)", "minimum": 1, "maximum": 100}
            },
            "required": ["channel_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let limit = opt_u64(&args, "limit").unwrap_or(10).min(100) as u8;

        let messages = channel
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(discord_err)?;

        let lines: Vec<String> = messages
            .iter()
            .map(|m| {
                let reactions = if m.reactions.is_empty() {
                    "none".to_string()
                } else {
                    m.reactions
                        .iter()
                        .map(|r| format!("{}({})", r.reaction_type, r.count))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!(
                    "{} ({}): {}\nreactions: {}",
                    m.author.name, m.timestamp, m.content, reactions
                )
            })
            .collect();

        Ok(ToolOutput::text(format!(
            "{} messages:\n\n{}",
            messages.len(),
            lines.join("\n")
        )))
    }
}

pub struct AddReaction {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for AddReaction {
    fn name(&self) -> &'static str {
        "add_reaction"
    }

    fn description(&self) -> &'static str {
        "Add a reaction to a message"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel id"},
                "message_id": {"type": "string", "description": "Message id"},
                "emoji": {"type": "string", "description": "Emoji to add"}
            },
            "required": ["channel_id", "message_id", "emoji"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let emoji = str_arg(&args, "emoji")?;
        channel
            .create_reaction(
                &self.http,
                MessageId::new(id_arg(&args, "message_id")?),
                parse_reaction(emoji)?,
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Added {emoji} reaction")))
    }
}

pub struct AddMultipleReactions {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for AddMultipleReactions {
    fn name(&self) -> &'static str {
        "add_multiple_reactions"
    }

    fn description(&self) -> &'static str {
        "Add several reactions to a message"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel id"},
                "message_id": {"type": "string", "description": "Message id"},
                "emojis": {
                    "type": "array",
                    "items": {"type": "string", "description": "Emoji"},
                    "description": "Emojis to add, in order"
                }
            },
            "required": ["channel_id", "message_id", "emojis"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message_id = MessageId::new(id_arg(&args, "message_id")?);
        let emojis: Vec<&str> = args
            .get("emojis")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for emoji in &emojis {
            channel
                .create_reaction(&self.http, message_id, parse_reaction(emoji)?)
                .await
                .map_err(discord_err)?;
        }
        Ok(ToolOutput::text(format!(
            "Added reactions: {}",
            emojis.join(", ")
        )))
    }
}

pub struct RemoveReaction {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for RemoveReaction {
    fn name(&self) -> &'static str {
        "remove_reaction"
    }

    fn description(&self) -> &'static str {
        "Remove the bot's reaction from a message"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel id"},
                "message_id": {"type": "string", "description": "Message id"},
                "emoji": {"type": "string", "description": "Emoji to remove"}
            },
            "required": ["channel_id", "message_id", "emoji"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let emoji = str_arg(&args, "emoji")?;
        channel
            .delete_reaction(
                &self.http,
                MessageId::new(id_arg(&args, "message_id")?),
                None,
                parse_reaction(emoji)?,
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Removed {emoji} reaction")))
    }
}

pub struct ModerateMessage {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for ModerateMessage {
    fn name(&self) -> &'static str {
        "moderate_message"
    }

    fn description(&self) -> &'static str {
        "Delete a message and optionally time out its author"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel the message is in"},
                "message_id": {"type": "string", "description": "Message to act on"},
                "reason": {"type": "string", "description": "Moderation reason"},
                "timeout_minutes": {"type": "number", "description": "Timeout duration in minutes", "minimum": 0, "maximum": 40320}
            },
            "required": ["channel_id", "message_id", "reason"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;

        let channel_id = ChannelId::new(id_arg(&args, "channel_id")?);
        let message_id = MessageId::new(id_arg(&args, "message_id")?);
        let reason = str_arg(&args, "reason")?;

        let message = channel_id
            .message(&self.http, message_id)
            .await
            .map_err(discord_err)?;
        self.http
            .delete_message(channel_id, message_id, Some(reason))
            .await
            .map_err(discord_err)?;

        let minutes = opt_u64(&args, "timeout_minutes").unwrap_or(0);
        if minutes > 0 {
            let guild_id = guild_channel(&self.http, channel_id.get()).await?.guild_id;
            let until = Timestamp::from_unix_timestamp(
                Utc::now().timestamp() + minutes as i64 * 60,
            )
            .map_err(|e| guildmind_common::Error::Tool(format!("invalid timeout: {e}")))?;
            guild_id
                .edit_member(
                    &self.http,
                    message.author.id,
                    EditMember::new().disable_communication_until_datetime(until),
                )
                .await
                .map_err(discord_err)?;
            return Ok(ToolOutput::text(format!(
                "Message deleted and author timed out for {minutes} minutes."
            )));
        }

        Ok(ToolOutput::text("Message deleted."))
    }
}

pub struct GetImageFromMessage {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for GetImageFromMessage {
    fn name(&self) -> &'static str {
        "get_image_from_message"
    }

    fn description(&self) -> &'static str {
        "Fetch image attachments from a message"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel the message is in"},
                "message_id": {"type": "string", "description": "Message carrying the image"}
            },
            "required": ["channel_id", "message_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message = channel
            .message(&self.http, MessageId::new(id_arg(&args, "message_id")?))
            .await
            .map_err(discord_err)?;

        let images: Vec<String> = message
            .attachments
            .iter()
            .filter(|a| {
                a.content_type
                    .as_deref()
                    .is_some_and(|ct| ct.starts_with("image/"))
            })
            .map(|a| {
                format!(
                    "- {} ({}x{}): {}",
                    a.filename,
                    a.width.unwrap_or(0),
                    a.height.unwrap_or(0),
                    a.url
                )
            })
            .collect();

        if images.is_empty() {
            return Ok(ToolOutput::text("The message has no image attachments."));
        }
        Ok(ToolOutput::text(format!(
            "Found {} image(s):\n{}",
            images.len(),
            images.join("\n")
        )))
    }
}

/// Keyword heuristic for "the user is wrapping up"; reacts instead of
/// producing another wall of text.
pub struct JudgeConversationEnding {
    pub(crate) http: Arc<Http>,
}

const ENDING_KEYWORDS: &[&str] = &[
    "thanks", "thank you", "thx", "ty", "ok", "okay", "got it", "understood", "great", "perfect",
    "cool", "sure", "yep", "nice", "sounds good",
];

#[async_trait]
impl Tool for JudgeConversationEnding {
    fn name(&self) -> &'static str {
        "judge_conversation_ending"
    }

    fn description(&self) -> &'static str {
        "Judge whether a message closes the conversation and react with a fitting emoji"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message_content": {"type": "string", "description": "Message text to judge"},
                "channel_id": {"type": "string", "description": "Channel the message is in"},
                "message_id": {"type": "string", "description": "Message to react to"}
            },
            "required": ["message_content", "channel_id", "message_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let content = str_arg(&args, "message_content")?.to_lowercase();
        let is_ending = ENDING_KEYWORDS.iter().any(|k| content.contains(k));

        if !is_ending {
            return Ok(ToolOutput::text(
                "The message does not close the conversation. ending: false",
            ));
        }

        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message_id = MessageId::new(id_arg(&args, "message_id")?);

        channel
            .create_reaction(&self.http, message_id, parse_reaction("👍")?)
            .await
            .map_err(discord_err)?;

        if content.contains("thank") {
            let _ = channel
                .create_reaction(&self.http, message_id, parse_reaction("❤️")?)
                .await;
        } else if content.contains("got it") || content.contains("understood") {
            let _ = channel
                .create_reaction(&self.http, message_id, parse_reaction("✅")?)
                .await;
        }

        Ok(ToolOutput::text(
            "Judged as a conversation close and reacted with 👍. ending: true",
        ))
    }
}
