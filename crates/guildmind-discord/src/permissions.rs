use serenity::all::Message;
use serenity::http::Http;
use tracing::debug;

/// Resolve whether the author of `msg` passes the admin check: a configured
/// owner id, the guild owner, or a member holding the ADMINISTRATOR
/// permission. DMs only pass for configured owners.
pub async fn is_admin(http: &Http, msg: &Message, owner_ids: &[u64]) -> bool {
    if owner_ids.contains(&msg.author.id.get()) {
        return true;
    }

    let Some(guild_id) = msg.guild_id else {
        return false;
    };
    let Ok(guild) = http.get_guild(guild_id).await else {
        debug!("admin check: could not fetch guild {guild_id}");
        return false;
    };
    if guild.owner_id == msg.author.id {
        return true;
    }

    let Ok(member) = http.get_member(guild_id, msg.author.id).await else {
        return false;
    };
    member.roles.iter().any(|role_id| {
        guild
            .roles
            .get(role_id)
            .is_some_and(|role| role.permissions.administrator())
    })
}
