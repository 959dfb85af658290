use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::{Error, Result};
use serde_json::{Value, json};
use serenity::all::{ChannelType, GuildId};
use serenity::builder::CreateInvite;
use serenity::http::Http;

use super::{discord_err, guild_channel, id_arg, opt_u64, str_arg};

pub struct GetServerInfo {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for GetServerInfo {
    fn name(&self) -> &'static str {
        "get_server_info"
    }

    fn description(&self) -> &'static str {
        "Look up Discord server information"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server (guild) id"}
            },
            "required": ["server_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let guild_id = GuildId::new(id_arg(&args, "server_id")?);
        let guild = self
            .http
            .get_guild_with_counts(guild_id)
            .await
            .map_err(discord_err)?;

        let roles: Vec<String> = guild
            .roles
            .values()
            .map(|r| format!("{} (id {})", r.name, r.id))
            .collect();

        Ok(ToolOutput::text(format!(
            "Server: {} (id {})\nOwner: {}\nMembers: {}\nRoles:\n{}",
            guild.name,
            guild.id,
            guild.owner_id,
            guild
                .approximate_member_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".into()),
            roles.join("\n")
        )))
    }
}

/// Context-derived fallback for when the model lacks a server id. The
/// ambient ids in the system prompt usually make this unnecessary, but a
/// message referenced from another channel still needs it.
pub struct GetServerIdFromMessage;

#[async_trait]
impl Tool for GetServerIdFromMessage {
    fn name(&self) -> &'static str {
        "get_server_id_from_message"
    }

    fn description(&self) -> &'static str {
        "Resolve the server id of the message being handled"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message_id": {"type": "string", "description": "Message id (defaults to the triggering message)"}
            },
            "required": ["message_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, _args: Value) -> Result<ToolOutput> {
        match ctx.guild_id {
            Some(id) => Ok(ToolOutput::text(format!("Server ID: {id}"))),
            None => Err(Error::Tool("the message is not in a server".into())),
        }
    }
}

pub struct SearchChannel {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for SearchChannel {
    fn name(&self) -> &'static str {
        "search_channel"
    }

    fn description(&self) -> &'static str {
        "Find channels in a server by name"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "channel_name": {"type": "string", "description": "Name (or part of it) to search for"}
            },
            "required": ["server_id", "channel_name"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let needle = str_arg(&args, "channel_name")?.to_lowercase();

        let channels = guild.channels(&self.http).await.map_err(discord_err)?;
        let matches: Vec<String> = channels
            .values()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .map(|c| format!("{} (id {}, {})", c.name, c.id, c.kind.name()))
            .collect();

        if matches.is_empty() {
            return Ok(ToolOutput::text(format!("No channel matching '{needle}'.")));
        }
        Ok(ToolOutput::text(format!(
            "{} channel(s) found:\n{}",
            matches.len(),
            matches.join("\n")
        )))
    }
}

pub struct GetChannelInfo {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for GetChannelInfo {
    fn name(&self) -> &'static str {
        "get_channel_info"
    }

    fn description(&self) -> &'static str {
        "Look up details of a channel by id"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel id"}
            },
            "required": ["channel_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = guild_channel(&self.http, id_arg(&args, "channel_id")?).await?;
        Ok(ToolOutput::text(format!(
            "Channel: {} (id {})\nKind: {}\nTopic: {}\nNSFW: {}\nPosition: {}",
            channel.name,
            channel.id,
            channel.kind.name(),
            channel.topic.as_deref().unwrap_or("none"),
            channel.nsfw,
            channel.position
        )))
    }
}

pub struct ListCategories {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for ListCategories {
    fn name(&self) -> &'static str {
        "list_categories"
    }

    fn description(&self) -> &'static str {
        "List a server's channel categories"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"}
            },
            "required": ["server_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let channels = guild.channels(&self.http).await.map_err(discord_err)?;

        let categories: Vec<String> = channels
            .values()
            .filter(|c| c.kind == ChannelType::Category)
            .map(|c| format!("{} (id {})", c.name, c.id))
            .collect();

        if categories.is_empty() {
            return Ok(ToolOutput::text("The server has no categories."));
        }
        Ok(ToolOutput::text(format!(
            "{} categories:\n{}",
            categories.len(),
            categories.join("\n")
        )))
    }
}

pub struct CreateInviteLink {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for CreateInviteLink {
    fn name(&self) -> &'static str {
        "create_invite"
    }

    fn description(&self) -> &'static str {
        "Create an invite link for a channel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel the invite points at"},
                "max_age_seconds": {"type": "number", "description": "Invite lifetime in seconds (0 = never expires)"},
                "max_uses": {"type": "number", "description": "Use limit (0 = unlimited)"}
            },
            "required": ["channel_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = guild_channel(&self.http, id_arg(&args, "channel_id")?).await?;
        let max_age = opt_u64(&args, "max_age_seconds").unwrap_or(86400) as u32;
        let max_uses = opt_u64(&args, "max_uses").unwrap_or(0).min(100) as u8;

        let invite = channel
            .create_invite(
                &self.http,
                CreateInvite::new().max_age(max_age).max_uses(max_uses),
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Invite created: {}", invite.url())))
    }
}
