use std::sync::Arc;

use guildmind_store::DataStore;
use serenity::all::GuildId;
use tracing::info;

/// Shared data accessible in all poise commands.
pub struct CommandData {
    pub store: Arc<DataStore>,
}

pub type CommandError = Box<dyn std::error::Error + Send + Sync>;
pub type CommandContext<'a> = poise::Context<'a, CommandData, CommandError>;

/// `/activate` — answer every message in this channel.
#[poise::command(slash_command, required_permissions = "ADMINISTRATOR")]
pub async fn activate(ctx: CommandContext<'_>) -> Result<(), CommandError> {
    let added = ctx.data().store.add_chat_channel(ctx.channel_id().get())?;
    ctx.say(if added {
        "✅ This channel is now a chat channel."
    } else {
        "This channel is already active."
    })
    .await?;
    Ok(())
}

/// `/deactivate` — stop answering unprompted in this channel.
#[poise::command(slash_command, required_permissions = "ADMINISTRATOR")]
pub async fn deactivate(ctx: CommandContext<'_>) -> Result<(), CommandError> {
    let removed = ctx.data().store.remove_chat_channel(ctx.channel_id().get())?;
    ctx.say(if removed {
        "This channel is no longer a chat channel."
    } else {
        "This channel was not active."
    })
    .await?;
    Ok(())
}

/// `/history_limit` — how many prior messages are replayed into each turn.
#[poise::command(slash_command, required_permissions = "ADMINISTRATOR")]
pub async fn history_limit(
    ctx: CommandContext<'_>,
    #[description = "Number of prior messages (1-50)"]
    #[min = 1]
    #[max = 50]
    limit: u32,
) -> Result<(), CommandError> {
    ctx.data().store.set_setting("history_num", &limit.to_string())?;
    ctx.say(format!("History depth set to {limit}.")).await?;
    Ok(())
}

/// `/status` — bot health check.
#[poise::command(slash_command)]
pub async fn status(ctx: CommandContext<'_>) -> Result<(), CommandError> {
    let channels = ctx.data().store.chat_channels().len();
    ctx.say(format!(
        "**Guildmind** v{}\nStatus: ✅ connected\nActive chat channels: {channels}",
        env!("CARGO_PKG_VERSION")
    ))
    .await?;
    Ok(())
}

pub fn all_commands() -> Vec<poise::Command<CommandData, CommandError>> {
    vec![activate(), deactivate(), history_limit(), status()]
}

/// Build the poise framework. Commands register per-guild when guild ids are
/// configured (instant), globally otherwise (propagates within an hour).
pub fn build_framework(
    store: Arc<DataStore>,
    guild_ids: Vec<u64>,
) -> poise::Framework<CommandData, CommandError> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                if guild_ids.is_empty() {
                    poise::builtins::register_globally(ctx, commands).await?;
                } else {
                    for guild_id in &guild_ids {
                        poise::builtins::register_in_guild(ctx, commands, GuildId::new(*guild_id))
                            .await?;
                    }
                }
                info!("registered {} slash commands", commands.len());
                Ok(CommandData { store })
            })
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_commands_includes_expected_commands() {
        let commands = all_commands();
        let names: Vec<_> = commands.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"activate"));
        assert!(names.contains(&"deactivate"));
        assert!(names.contains(&"history_limit"));
        assert!(names.contains(&"status"));
    }
}
