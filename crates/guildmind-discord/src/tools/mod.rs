use std::sync::Arc;

use guildmind_agents::{Tool, TurnContext};
use guildmind_common::{Error, Result};
use serde_json::Value;
use serenity::all::{Channel, ChannelId, GuildChannel, ReactionType};
use serenity::http::Http;

pub mod channel;
pub mod edit;
pub mod image;
pub mod member;
pub mod message;
pub mod role;
pub mod server;

/// The static toolset registered at startup. Tool modules do not
/// self-register; this list is the single place a tool becomes visible.
pub fn build_toolset(http: Arc<Http>) -> Vec<Arc<dyn Tool>> {
    let edit_history = Arc::new(edit::EditHistory::default());

    vec![
        Arc::new(message::SendMessage { http: http.clone() }),
        Arc::new(message::SendEmbed { http: http.clone() }),
        Arc::new(message::ReadMessages { http: http.clone() }),
        Arc::new(message::AddReaction { http: http.clone() }),
        Arc::new(message::AddMultipleReactions { http: http.clone() }),
        Arc::new(message::RemoveReaction { http: http.clone() }),
        Arc::new(message::ModerateMessage { http: http.clone() }),
        Arc::new(message::GetImageFromMessage { http: http.clone() }),
        Arc::new(message::JudgeConversationEnding { http: http.clone() }),
        Arc::new(channel::CreateTextChannel { http: http.clone() }),
        Arc::new(channel::CreateVoiceChannel { http: http.clone() }),
        Arc::new(channel::DeleteChannel { http: http.clone() }),
        Arc::new(channel::RenameChannel { http: http.clone() }),
        Arc::new(channel::SetChannelTopic { http: http.clone() }),
        Arc::new(channel::SetSlowmode { http: http.clone() }),
        Arc::new(server::GetServerInfo { http: http.clone() }),
        Arc::new(server::GetServerIdFromMessage),
        Arc::new(server::SearchChannel { http: http.clone() }),
        Arc::new(server::GetChannelInfo { http: http.clone() }),
        Arc::new(server::ListCategories { http: http.clone() }),
        Arc::new(server::CreateInviteLink { http: http.clone() }),
        Arc::new(member::ListMembers { http: http.clone() }),
        Arc::new(member::GetUserInfo { http: http.clone() }),
        Arc::new(member::ChangeNickname { http: http.clone() }),
        Arc::new(member::KickMember { http: http.clone() }),
        Arc::new(member::BanMember { http: http.clone() }),
        Arc::new(role::AddRole { http: http.clone() }),
        Arc::new(role::RemoveRole { http: http.clone() }),
        Arc::new(role::CreateRole { http: http.clone() }),
        Arc::new(role::DeleteRole { http: http.clone() }),
        Arc::new(edit::EditOwnMessage {
            http: http.clone(),
            history: edit_history.clone(),
        }),
        Arc::new(edit::UndoEdit {
            http,
            history: edit_history,
        }),
        Arc::new(image::GenerateImage),
    ]
}

pub(crate) fn discord_err(e: serenity::Error) -> Error {
    Error::Discord(e.to_string())
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Tool(format!("parameter '{key}' must be a string")))
}

/// Snowflake ids travel as strings in the tool schemas.
pub(crate) fn id_arg(args: &Value, key: &str) -> Result<u64> {
    let id: u64 = str_arg(args, key)?
        .parse()
        .map_err(|_| Error::Tool(format!("parameter '{key}' is not a valid id")))?;
    if id == 0 {
        return Err(Error::Tool(format!("parameter '{key}' is not a valid id")));
    }
    Ok(id)
}

pub(crate) fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub(crate) fn require_admin(ctx: &TurnContext) -> Result<()> {
    if ctx.user_is_admin {
        Ok(())
    } else {
        Err(Error::Tool(
            "this operation requires administrator permission".into(),
        ))
    }
}

pub(crate) fn parse_reaction(emoji: &str) -> Result<ReactionType> {
    ReactionType::try_from(emoji)
        .map_err(|_| Error::Tool(format!("'{emoji}' is not a valid emoji")))
}

pub(crate) async fn guild_channel(http: &Http, channel_id: u64) -> Result<GuildChannel> {
    match http
        .get_channel(ChannelId::new(channel_id))
        .await
        .map_err(discord_err)?
    {
        Channel::Guild(channel) => Ok(channel),
        _ => Err(Error::Tool("channel is not a server channel".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn toolset_has_unique_names_and_sound_schemas() {
        let toolset = build_toolset(Arc::new(Http::new("")));

        let mut names = HashSet::new();
        for tool in &toolset {
            assert!(names.insert(tool.name()), "duplicate tool name: {}", tool.name());

            // every required parameter must be declared as a property
            let schema = tool.input_schema();
            let properties = schema["properties"]
                .as_object()
                .unwrap_or_else(|| panic!("{} schema lacks properties", tool.name()));
            if let Some(required) = schema["required"].as_array() {
                for key in required.iter().filter_map(Value::as_str) {
                    assert!(
                        properties.contains_key(key),
                        "{}: required '{key}' not in properties",
                        tool.name()
                    );
                }
            }
            assert!(!tool.description().is_empty());
        }

        assert!(names.contains("send_message"));
        assert!(names.contains("generate_image"));
        assert!(names.contains("get_server_id_from_message"));
    }
}
