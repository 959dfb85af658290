use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::Result;
use serde_json::{Value, json};
use serenity::all::{ChannelId, ChannelType, GuildId};
use serenity::builder::{CreateChannel, EditChannel};
use serenity::http::Http;

use super::{discord_err, id_arg, opt_u64, require_admin, str_arg};

async fn create_channel(
    http: &Http,
    args: &Value,
    ctx: &TurnContext,
    kind: ChannelType,
) -> Result<ToolOutput> {
    require_admin(ctx)?;

    let guild = GuildId::new(id_arg(args, "server_id")?);
    let name = str_arg(args, "name")?;

    let mut builder = CreateChannel::new(name).kind(kind);
    if let Some(category) = args.get("category_id").and_then(Value::as_str) {
        let id: u64 = category
            .parse()
            .map_err(|_| guildmind_common::Error::Tool("invalid category_id".into()))?;
        builder = builder.category(ChannelId::new(id));
    }

    let channel = guild
        .create_channel(http, builder)
        .await
        .map_err(discord_err)?;
    Ok(ToolOutput::text(format!(
        "Channel created: {} (id {})",
        channel.name, channel.id
    )))
}

pub struct CreateTextChannel {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for CreateTextChannel {
    fn name(&self) -> &'static str {
        "create_text_channel"
    }

    fn description(&self) -> &'static str {
        "Create a new text channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "name": {"type": "string", "description": "Channel name"},
                "category_id": {"type": "string", "description": "Parent category id (optional)"}
            },
            "required": ["server_id", "name"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        create_channel(&self.http, &args, ctx, ChannelType::Text).await
    }
}

pub struct CreateVoiceChannel {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for CreateVoiceChannel {
    fn name(&self) -> &'static str {
        "create_voice_channel"
    }

    fn description(&self) -> &'static str {
        "Create a new voice channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "name": {"type": "string", "description": "Channel name"},
                "category_id": {"type": "string", "description": "Parent category id (optional)"}
            },
            "required": ["server_id", "name"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        create_channel(&self.http, &args, ctx, ChannelType::Voice).await
    }
}

pub struct DeleteChannel {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for DeleteChannel {
    fn name(&self) -> &'static str {
        "delete_channel"
    }

    fn description(&self) -> &'static str {
        "Delete a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel to delete"}
            },
            "required": ["channel_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        channel.delete(&self.http).await.map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Channel {channel} deleted.")))
    }
}

pub struct RenameChannel {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for RenameChannel {
    fn name(&self) -> &'static str {
        "rename_channel"
    }

    fn description(&self) -> &'static str {
        "Rename a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel to rename"},
                "new_name": {"type": "string", "description": "New channel name"}
            },
            "required": ["channel_id", "new_name"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let name = str_arg(&args, "new_name")?;
        let updated = channel
            .edit(&self.http, EditChannel::new().name(name))
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Channel renamed to {}.", updated.name)))
    }
}

pub struct SetChannelTopic {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for SetChannelTopic {
    fn name(&self) -> &'static str {
        "set_channel_topic"
    }

    fn description(&self) -> &'static str {
        "Set a text channel's topic"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel to update"},
                "topic": {"type": "string", "description": "New topic"}
            },
            "required": ["channel_id", "topic"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let topic = str_arg(&args, "topic")?;
        channel
            .edit(&self.http, EditChannel::new().topic(topic))
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Topic set to: {topic}")))
    }
}

pub struct SetSlowmode {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for SetSlowmode {
    fn name(&self) -> &'static str {
        "set_slowmode"
    }

    fn description(&self) -> &'static str {
        "Set a channel's slowmode interval"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel to update"},
                "seconds": {"type": "number", "description": "Seconds between messages (0 disables)", "minimum": 0, "maximum": 21600}
            },
            "required": ["channel_id", "seconds"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let seconds = opt_u64(&args, "seconds").unwrap_or(0).min(21600) as u16;
        channel
            .edit(&self.http, EditChannel::new().rate_limit_per_user(seconds))
            .await
            .map_err(discord_err)?;
        if seconds == 0 {
            Ok(ToolOutput::text("Slowmode disabled."))
        } else {
            Ok(ToolOutput::text(format!("Slowmode set to {seconds}s.")))
        }
    }
}
