use serenity::all::{
    Cache, ChannelId, CreateAttachment, CreateMessage, GuildId, Http, MessageId, UserId,
};
use serenity::async_trait;
use serenity::http::HttpError;
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::warn;

use crate::core::events::MemberInfo;
use crate::core::platform::{ChatPlatform, OutboundMessage, PlatformError};
use crate::discord::{guild_name, member_info};

/// `ChatPlatform` over the Discord HTTP API
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

fn platform_error(err: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = &err {
        if resp.status_code.as_u16() == 403 {
            return PlatformError::Forbidden;
        }
    }
    PlatformError::Other(err.to_string())
}

/// Serenity ids panic on zero, so every id coming from storage or commands goes through here
fn non_zero(kind: &str, id: u64) -> Result<u64, PlatformError> {
    NonZeroU64::new(id)
        .map(NonZeroU64::get)
        .ok_or_else(|| PlatformError::Other(format!("invalid {kind} id 0")))
}

impl SerenityPlatform {
    /// Channel name from any cached guild
    fn cached_channel_name(&self, id: ChannelId) -> Option<String> {
        self.cache.guilds().into_iter().find_map(|guild_id| {
            let guild = self.cache.guild(guild_id)?;
            guild.channels.get(&id).map(|c| c.name.clone())
        })
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn send_message(
        &self,
        channel_id: u64,
        message: OutboundMessage,
    ) -> Result<u64, PlatformError> {
        let mut builder = CreateMessage::new().content(message.content);
        if let Some(attachment) = message.attachment {
            builder = builder.add_file(CreateAttachment::bytes(attachment.bytes, attachment.filename));
        }

        let sent = ChannelId::new(non_zero("channel", channel_id)?)
            .send_message(&self.http, builder)
            .await
            .map_err(platform_error)?;
        Ok(sent.id.get())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        let message_id = MessageId::new(non_zero("message", message_id)?);
        ChannelId::new(non_zero("channel", channel_id)?)
            .delete_message(&self.http, message_id)
            .await
            .map_err(platform_error)
    }

    async fn channel_name(&self, channel_id: u64) -> Option<String> {
        let id = ChannelId::new(non_zero("channel", channel_id).ok()?);
        if let Some(name) = self.cached_channel_name(id) {
            return Some(name);
        }
        match self.http.get_channel(id).await {
            Ok(channel) => channel.guild().map(|c| c.name),
            Err(e) => {
                warn!("Failed to look up channel {}: {}", channel_id, e);
                None
            }
        }
    }

    async fn member(&self, guild_id: u64, user_id: u64) -> Option<MemberInfo> {
        let (Ok(guild), Ok(user)) = (non_zero("guild", guild_id), non_zero("user", user_id)) else {
            return None;
        };
        let guild_id = GuildId::new(guild);
        let member = match guild_id.member(&self.http, UserId::new(user)).await {
            Ok(member) => member,
            Err(e) => {
                warn!("Failed to look up member {} in {}: {}", user_id, guild_id, e);
                return None;
            }
        };
        let name = guild_name(&self.cache, &self.http, guild_id).await;
        Some(member_info(&member, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ids_are_refused_instead_of_building_serenity_ids() {
        assert!(matches!(non_zero("channel", 0), Err(PlatformError::Other(_))));
        assert_eq!(non_zero("channel", 42).unwrap(), 42);
    }
}
