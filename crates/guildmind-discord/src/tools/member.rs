use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::Result;
use serde_json::{Value, json};
use serenity::all::{GuildId, UserId};
use serenity::builder::EditMember;
use serenity::http::Http;

use super::{discord_err, id_arg, opt_u64, require_admin, str_arg};

pub struct ListMembers {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for ListMembers {
    fn name(&self) -> &'static str {
        "list_members"
    }

    fn description(&self) -> &'static str {
        "List members of a server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "limit": {"type": "number", "description": "Maximum members to fetch", "minimum": 1, "maximum": 1000}
            },
            "required": ["server_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let limit = opt_u64(&args, "limit").unwrap_or(100).min(1000);

        let members = guild
            .members(&self.http, Some(limit), None)
            .await
            .map_err(discord_err)?;

        let lines: Vec<String> = members
            .iter()
            .map(|m| {
                let nick = m
                    .nick
                    .as_deref()
                    .map(|n| format!(" (nick: {n})"))
                    .unwrap_or_default();
                format!("{} (id {}){}", m.user.name, m.user.id, nick)
            })
            .collect();

        Ok(ToolOutput::text(format!(
            "{} member(s):\n{}",
            members.len(),
            lines.join("\n")
        )))
    }
}

pub struct GetUserInfo {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for GetUserInfo {
    fn name(&self) -> &'static str {
        "get_user_info"
    }

    fn description(&self) -> &'static str {
        "Look up a Discord user by id"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {"type": "string", "description": "Discord user id"}
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let user_id = UserId::new(id_arg(&args, "user_id")?);
        let user = self.http.get_user(user_id).await.map_err(discord_err)?;

        Ok(ToolOutput::text(format!(
            "User: {} (id {})\nDisplay name: {}\nBot: {}\nCreated: {}",
            user.name,
            user.id,
            user.global_name.as_deref().unwrap_or("none"),
            user.bot,
            user.created_at()
        )))
    }
}

pub struct ChangeNickname {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for ChangeNickname {
    fn name(&self) -> &'static str {
        "change_nickname"
    }

    fn description(&self) -> &'static str {
        "Change a member's nickname"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "user_id": {"type": "string", "description": "Member whose nickname changes"},
                "new_nickname": {"type": "string", "description": "New nickname"}
            },
            "required": ["server_id", "user_id", "new_nickname"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let user = UserId::new(id_arg(&args, "user_id")?);
        let nickname = str_arg(&args, "new_nickname")?;

        guild
            .edit_member(&self.http, user, EditMember::new().nickname(nickname))
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Nickname changed to {nickname}.")))
    }
}

pub struct KickMember {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for KickMember {
    fn name(&self) -> &'static str {
        "kick_member"
    }

    fn description(&self) -> &'static str {
        "Kick a member from the server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "user_id": {"type": "string", "description": "Member to kick"},
                "reason": {"type": "string", "description": "Kick reason (optional)"}
            },
            "required": ["server_id", "user_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let user = UserId::new(id_arg(&args, "user_id")?);
        let reason = args.get("reason").and_then(Value::as_str).unwrap_or("");

        guild
            .kick_with_reason(&self.http, user, reason)
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Member {user} kicked.")))
    }
}

pub struct BanMember {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for BanMember {
    fn name(&self) -> &'static str {
        "ban_member"
    }

    fn description(&self) -> &'static str {
        "Ban a member from the server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "user_id": {"type": "string", "description": "Member to ban"},
                "reason": {"type": "string", "description": "Ban reason (optional)"},
                "delete_message_days": {"type": "number", "description": "Days of messages to purge (max 7)", "minimum": 0, "maximum": 7}
            },
            "required": ["server_id", "user_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let guild = GuildId::new(id_arg(&args, "server_id")?);
        let user = UserId::new(id_arg(&args, "user_id")?);
        let reason = args.get("reason").and_then(Value::as_str).unwrap_or("");
        let days = opt_u64(&args, "delete_message_days").unwrap_or(0).min(7) as u8;

        guild
            .ban_with_reason(&self.http, user, days, reason)
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!("Member {user} banned.")))
    }
}
