/// Platform-neutral events consumed by the welcome service.
use crate::core::commands::{Command, CommandError};
use crate::services::template::WelcomeVars;

/// A server member as seen by the welcome service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: u64,
    pub guild_id: u64,
    pub display_name: String,
    pub user_name: String,
    pub mention: String,
    pub guild_name: String,
    pub avatar_url: String,
}

impl MemberInfo {
    pub fn welcome_vars(&self) -> WelcomeVars<'_> {
        WelcomeVars {
            display_name: &self.display_name,
            user_name: &self.user_name,
            user_mention: &self.mention,
            server_name: &self.guild_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub guild_id: u64,
    /// Channel the command was typed in; replies go here
    pub channel_id: u64,
    pub author: MemberInfo,
    pub is_admin: bool,
    /// Rejected commands are carried too, so usage errors only reach admins
    pub command: Result<Command, CommandError>,
}

#[derive(Debug, Clone)]
pub enum BotEvent {
    Ready { bot_name: String },
    MemberJoined(MemberInfo),
    CommandInvoked(CommandInvocation),
}
