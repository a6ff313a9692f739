//! Discord adapter: gateway events in, HTTP API calls out.

pub mod handler;
pub mod platform;

use serenity::all::{Cache, Client, Context, GatewayIntents, GuildId, Http, Member, Mentionable};
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::events::{BotEvent, MemberInfo};
pub use handler::Handler;
pub use platform::SerenityPlatform;

/// Build the Discord client without connecting.
///
/// GUILD_MEMBERS and MESSAGE_CONTENT are privileged intents and must be enabled
/// for the application in the Discord Developer Portal.
pub async fn build_client(
    token: &str,
    prefix: &str,
    events: mpsc::Sender<BotEvent>,
) -> Result<Client, serenity::Error> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(token, intents)
        .event_handler(Handler::new(events, prefix))
        .await
}

pub(crate) fn member_info(member: &Member, guild_name: String) -> MemberInfo {
    MemberInfo {
        user_id: member.user.id.get(),
        guild_id: member.guild_id.get(),
        display_name: member.display_name().to_string(),
        user_name: member.user.name.clone(),
        mention: member.mention().to_string(),
        guild_name,
        avatar_url: member.face(),
    }
}

/// Guild name from the cache, falling back to the API
pub(crate) async fn guild_name(cache: &Cache, http: &Http, guild_id: GuildId) -> String {
    if let Some(name) = cache.guild(guild_id).map(|g| g.name.clone()) {
        return name;
    }
    match http.get_guild(guild_id).await {
        Ok(guild) => guild.name,
        Err(e) => {
            warn!("Failed to look up guild {}: {}", guild_id, e);
            String::new()
        }
    }
}

pub(crate) async fn context_guild_name(ctx: &Context, guild_id: GuildId) -> String {
    guild_name(&ctx.cache, &ctx.http, guild_id).await
}
