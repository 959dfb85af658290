use std::sync::Arc;

use async_trait::async_trait;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::Result;
use serde_json::{Value, json};
use serenity::all::{Colour, GuildId, RoleId, UserId};
use serenity::builder::EditRole;
use serenity::http::Http;
use tracing::warn;

use super::{discord_err, id_arg, require_admin, str_arg};

pub struct AddRole {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for AddRole {
    fn name(&self) -> &'static str {
        "add_role"
    }

    fn description(&self) -> &'static str {
        "Give a role to a member"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "user_id": {"type": "string", "description": "Member receiving the role"},
                "role_id": {"type": "string", "description": "Role to add"}
            },
            "required": ["server_id", "user_id", "role_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        self.http
            .add_member_role(
                GuildId::new(id_arg(&args, "server_id")?),
                UserId::new(id_arg(&args, "user_id")?),
                RoleId::new(id_arg(&args, "role_id")?),
                None,
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text("Role added."))
    }
}

pub struct RemoveRole {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for RemoveRole {
    fn name(&self) -> &'static str {
        "remove_role"
    }

    fn description(&self) -> &'static str {
        "Take a role away from a member"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "user_id": {"type": "string", "description": "Member losing the role"},
                "role_id": {"type": "string", "description": "Role to remove"}
            },
            "required": ["server_id", "user_id", "role_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        self.http
            .remove_member_role(
                GuildId::new(id_arg(&args, "server_id")?),
                UserId::new(id_arg(&args, "user_id")?),
                RoleId::new(id_arg(&args, "role_id")?),
                None,
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text("Role removed."))
    }
}

pub struct CreateRole {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for CreateRole {
    fn name(&self) -> &'static str {
        "create_role"
    }

    fn description(&self) -> &'static str {
        "Create a new role in a server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "name": {"type": "string", "description": "Role name"},
                "color": {"type": "string", "description": "Hex color such as '#FF0000' (optional)"},
                "hoist": {"type": "boolean", "description": "Show members separately in the sidebar (optional)"}
            },
            "required": ["server_id", "name"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        let guild = GuildId::new(id_arg(&args, "server_id")?);

        let mut builder = EditRole::new().name(str_arg(&args, "name")?);
        if let Some(hex) = args.get("color").and_then(Value::as_str) {
            match u32::from_str_radix(hex.trim_start_matches('#'), 16) {
                Ok(value) => builder = builder.colour(Colour::new(value)),
                Err(_) => warn!("invalid color code '{hex}', using default"),
            }
        }
        if let Some(hoist) = args.get("hoist").and_then(Value::as_bool) {
            builder = builder.hoist(hoist);
        }

        let role = guild
            .create_role(&self.http, builder)
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text(format!(
            "Role created: {} (id {})",
            role.name, role.id
        )))
    }
}

pub struct DeleteRole {
    pub(crate) http: Arc<Http>,
}

#[async_trait]
impl Tool for DeleteRole {
    fn name(&self) -> &'static str {
        "delete_role"
    }

    fn description(&self) -> &'static str {
        "Delete a role from a server"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server_id": {"type": "string", "description": "Discord server id"},
                "role_id": {"type": "string", "description": "Role to delete"}
            },
            "required": ["server_id", "role_id"]
        })
    }

    async fn execute(&self, ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        require_admin(ctx)?;
        GuildId::new(id_arg(&args, "server_id")?)
            .delete_role(&self.http, RoleId::new(id_arg(&args, "role_id")?))
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text("Role deleted."))
    }
}
