use serenity::all::{Context, EventHandler, Guild, Member, Message, Ready};
use serenity::async_trait;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::core::commands;
use crate::core::events::{BotEvent, CommandInvocation};
use crate::discord::{context_guild_name, member_info};

/// Discord bot event handler
pub struct Handler {
    events: mpsc::Sender<BotEvent>,
    prefix: String,
}

impl Handler {
    pub fn new(events: mpsc::Sender<BotEvent>, prefix: &str) -> Self {
        Self {
            events,
            prefix: prefix.to_string(),
        }
    }

    async fn forward(&self, event: BotEvent) {
        if self.events.send(event).await.is_err() {
            error!("Welcome service is not running, dropping event");
        }
    }
}

#[allow(deprecated)]
fn is_administrator(guild: &Guild, member: &Member) -> bool {
    guild.member_permissions(member).administrator()
}

#[async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready and connected to Discord
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.forward(BotEvent::Ready {
            bot_name: ready.user.name.clone(),
        })
        .await;
    }

    /// Called when a member joins a guild
    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let guild_name = context_guild_name(&ctx, new_member.guild_id).await;
        self.forward(BotEvent::MemberJoined(member_info(&new_member, guild_name)))
            .await;
    }

    /// Prefix commands typed in guild channels
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        // Rejected commands still go through the service so usage replies respect the admin gate
        let Some(command) = commands::parse(&self.prefix, &msg.content).transpose() else {
            return;
        };

        let member = match msg.member(&ctx).await {
            Ok(member) => member,
            Err(e) => {
                warn!("Could not resolve member for {}: {}", msg.author.name, e);
                return;
            }
        };
        let is_admin = msg
            .guild(&ctx.cache)
            .map(|guild| is_administrator(&guild, &member))
            .unwrap_or(false);
        let guild_name = context_guild_name(&ctx, guild_id).await;

        self.forward(BotEvent::CommandInvoked(CommandInvocation {
            guild_id: guild_id.get(),
            channel_id: msg.channel_id.get(),
            author: member_info(&member, guild_name),
            is_admin,
            command,
        }))
        .await;
    }
}
