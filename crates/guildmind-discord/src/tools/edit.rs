use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::{Error, Result};
use serde_json::{Value, json};
use serenity::all::{ChannelId, MessageId};
use serenity::builder::EditMessage as EditMessageBuilder;
use serenity::http::Http;

use super::{discord_err, id_arg, str_arg};

/// Process-wide map of message id to pre-edit content, shared by the edit
/// and undo tools. Two concurrent turns editing the same message race on
/// this entry; last write wins.
#[derive(Default)]
pub struct EditHistory {
    previous: DashMap<u64, String>,
}

pub struct EditOwnMessage {
    pub(crate) http: Arc<Http>,
    pub(crate) history: Arc<EditHistory>,
}

#[async_trait]
impl Tool for EditOwnMessage {
    fn name(&self) -> &'static str {
        "edit_message"
    }

    fn description(&self) -> &'static str {
        "Edit one of the bot's own messages"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel the message is in"},
                "message_id": {"type": "string", "description": "Message to edit"},
                "new_content": {"type": "string", "description": "Replacement text"}
            },
            "required": ["channel_id", "message_id", "new_content"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message_id = MessageId::new(id_arg(&args, "message_id")?);
        let new_content = str_arg(&args, "new_content")?;

        let message = channel
            .message(&self.http, message_id)
            .await
            .map_err(discord_err)?;
        let me = self
            .http
            .get_current_user()
            .await
            .map_err(discord_err)?;
        if message.author.id != me.id {
            return Err(Error::Tool("only the bot's own messages can be edited".into()));
        }

        self.history.previous.insert(message_id.get(), message.content.clone());
        channel
            .edit_message(
                &self.http,
                message_id,
                EditMessageBuilder::new().content(new_content),
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text("Message edited. The edit can be undone with undo_edit."))
    }
}

pub struct UndoEdit {
    pub(crate) http: Arc<Http>,
    pub(crate) history: Arc<EditHistory>,
}

#[async_trait]
impl Tool for UndoEdit {
    fn name(&self) -> &'static str {
        "undo_edit"
    }

    fn description(&self) -> &'static str {
        "Restore a message to its content before the last edit_message call"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {"type": "string", "description": "Channel the message is in"},
                "message_id": {"type": "string", "description": "Message to restore"}
            },
            "required": ["channel_id", "message_id"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let channel = ChannelId::new(id_arg(&args, "channel_id")?);
        let message_id = MessageId::new(id_arg(&args, "message_id")?);

        let Some((_, previous)) = self.history.previous.remove(&message_id.get()) else {
            return Err(Error::Tool("no recorded edit for that message".into()));
        };

        channel
            .edit_message(
                &self.http,
                message_id,
                EditMessageBuilder::new().content(previous),
            )
            .await
            .map_err(discord_err)?;
        Ok(ToolOutput::text("Message restored to its previous content."))
    }
}
