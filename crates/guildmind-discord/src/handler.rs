use std::sync::Arc;

use guildmind_agents::{
    ConversationBuilder, ImageAttachment, IncrementalRenderer, Orchestrator, ReplySurface,
    TurnContext,
};
use guildmind_config::ChatConfig;
use guildmind_store::DataStore;
use serenity::all::{Channel, Context, EventHandler, Message, MessageType, Ready};
use tracing::{debug, error, info, warn};

use crate::history::DiscordHistory;
use crate::permissions;
use crate::surface::DiscordSurface;

/// Everything a conversation turn needs, wired once at startup.
pub struct BotContext {
    pub store: Arc<DataStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub chat: ChatConfig,
    pub owner_ids: Vec<u64>,
}

/// Serenity event handler that turns incoming messages into conversation
/// turns. Each message event runs as its own task; turns share nothing but
/// the read-only registry and the store.
pub struct GuildmindHandler {
    bot: Arc<BotContext>,
}

impl GuildmindHandler {
    pub fn new(bot: Arc<BotContext>) -> Self {
        Self { bot }
    }
}

#[serenity::async_trait]
impl EventHandler for GuildmindHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "connected as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // never answer bots (including ourselves) or system messages
        if msg.author.bot {
            return;
        }
        if msg.kind != MessageType::Regular && msg.kind != MessageType::InlineReply {
            return;
        }

        let activated = self.bot.store.is_chat_channel(msg.channel_id.get());
        let mentioned = msg.mentions_me(&ctx).await.unwrap_or(false);
        if !activated && !mentioned {
            return;
        }

        let bot_user_id = ctx.cache.current_user().id;
        let prompt = msg
            .content
            .replace(&format!("<@{bot_user_id}>"), "")
            .replace(&format!("<@!{bot_user_id}>"), "")
            .trim()
            .to_string();

        let image = msg
            .attachments
            .iter()
            .find(|a| {
                a.content_type
                    .as_deref()
                    .is_some_and(|ct| ct.starts_with("image/"))
            })
            .map(|a| ImageAttachment { url: a.url.clone() });

        if prompt.is_empty() && image.is_none() {
            return;
        }

        debug!(
            message_id = %msg.id,
            author = %msg.author.name,
            channel = %msg.channel_id,
            "handling chat message"
        );

        let channel_name = match msg.channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => Some(channel.name),
            _ => None,
        };
        let guild_name = match msg.guild_id {
            Some(guild_id) => ctx.http.get_guild(guild_id).await.ok().map(|g| g.name),
            None => None,
        };
        let user_name = msg.author_nick(&ctx).await.unwrap_or_else(|| {
            msg.author
                .global_name
                .clone()
                .unwrap_or_else(|| msg.author.name.clone())
        });
        let user_is_admin = permissions::is_admin(&ctx.http, &msg, &self.bot.owner_ids).await;

        let turn_ctx = TurnContext {
            guild_id: msg.guild_id.map(|g| g.get()),
            guild_name,
            channel_id: msg.channel_id.get(),
            channel_name,
            user_id: msg.author.id.get(),
            user_name,
            message_id: msg.id.get(),
            user_is_admin,
        };

        let reply = match msg.reply(&ctx.http, ". . .").await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("could not create reply message: {e}");
                return;
            }
        };

        let surface = Arc::new(DiscordSurface::new(
            ctx.http.clone(),
            msg.channel_id,
            reply.id,
        ));
        let history = DiscordHistory::new(ctx.http.clone(), msg.channel_id, msg.id, bot_user_id);

        let history_depth = self
            .bot
            .store
            .get_setting("history_num")
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.bot.chat.history_depth);
        let builder = ConversationBuilder::new(history_depth, self.bot.chat.history_with_image);

        let built = builder
            .build(&turn_ctx, &history, &prompt, image.as_ref())
            .await;
        let (system, messages) = match built {
            Ok(parts) => parts,
            Err(e) => {
                error!("conversation build failed: {e}");
                let _ = surface.edit(&format!("An error occurred: {e}")).await;
                return;
            }
        };

        let mut renderer =
            IncrementalRenderer::new(surface.clone(), self.bot.chat.edit_threshold);
        if let Err(e) = self
            .bot
            .orchestrator
            .run_turn(&turn_ctx, system, messages, &mut renderer)
            .await
        {
            error!("conversation turn failed: {e}");
            let _ = surface.edit(&format!("An error occurred: {e}")).await;
        }
    }
}
