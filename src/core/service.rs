/// Welcome service: turns platform events into config changes and welcome posts.
use anyhow::{Context, Result, anyhow};
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::config::WelcomeConfig;
use crate::core::commands::Command;
use crate::core::events::{BotEvent, CommandInvocation, MemberInfo};
use crate::core::platform::{ChatPlatform, OutboundMessage, PlatformError};
use crate::render::{AvatarBitmap, BackgroundAsset, EncodedAnimation, compose};
use crate::services::assets::AssetProvider;
use crate::services::storage::ConfigStore;
use crate::services::template::{render_welcome, validate_format};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub command_prefix: String,
    /// Upper bound for one compositor run; a late result is discarded
    pub compose_timeout: Duration,
    /// How long the probe message stays in a newly set welcome channel
    pub probe_delay: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            compose_timeout: Duration::from_secs(30),
            probe_delay: Duration::from_secs(5),
        }
    }
}

struct Inner<P, A> {
    store: ConfigStore,
    platform: P,
    assets: A,
    options: ServiceOptions,
}

pub struct WelcomeService<P, A> {
    inner: Arc<Inner<P, A>>,
}

impl<P, A> Clone for WelcomeService<P, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: ChatPlatform, A: AssetProvider> WelcomeService<P, A> {
    pub fn new(store: ConfigStore, platform: P, assets: A, options: ServiceOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                platform,
                assets,
                options,
            }),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.inner.store
    }

    /// Consume events until every sender is gone.
    /// Joins run on their own tasks; commands go to one worker and apply in arrival order.
    pub async fn run(self, mut events: mpsc::Receiver<BotEvent>) {
        info!("Welcome service started");
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let worker = tokio::spawn(self.clone().run_commands(commands_rx));

        while let Some(event) = events.recv().await {
            match event {
                BotEvent::CommandInvoked(invocation) => {
                    if commands_tx.send(invocation).await.is_err() {
                        error!("Command worker stopped, dropping command");
                    }
                }
                event => {
                    let svc = self.clone();
                    tokio::spawn(async move { svc.dispatch(event).await });
                }
            }
        }

        drop(commands_tx);
        if let Err(e) = worker.await {
            error!("Command worker failed: {}", e);
        }
        info!("Event stream closed, welcome service stopping");
    }

    async fn run_commands(self, mut commands: mpsc::Receiver<CommandInvocation>) {
        while let Some(invocation) = commands.recv().await {
            self.on_command(invocation).await;
        }
    }

    pub async fn dispatch(&self, event: BotEvent) {
        match event {
            BotEvent::Ready { bot_name } => self.on_ready(&bot_name).await,
            BotEvent::MemberJoined(member) => self.on_member_join(&member).await,
            BotEvent::CommandInvoked(invocation) => self.on_command(invocation).await,
        }
    }

    async fn on_ready(&self, bot_name: &str) {
        info!("Bot is ready. Logged in as {}", bot_name);

        let prefix = &self.inner.options.command_prefix;
        match self.inner.store.snapshot().await.welcome_channel_id {
            Some(id) => match self.inner.platform.channel_name(id.get()).await {
                Some(name) => info!("Welcome channel set to: {}", name),
                None => error!("Could not find channel with ID {}", id),
            },
            None => warn!(
                "Welcome channel not set. Use {}set_welcome_channel to set it.",
                prefix
            ),
        }
    }

    async fn on_member_join(&self, member: &MemberInfo) {
        let cfg = self.inner.store.snapshot().await;
        if !cfg.welcome_enabled {
            debug!("Welcome disabled, ignoring join of {}", member.user_name);
            return;
        }

        info!("New member joined: {}", member.user_name);
        let Some(channel_id) = cfg.welcome_channel_id else {
            error!(
                "Welcome channel not set. Use {}set_welcome_channel to set it.",
                self.inner.options.command_prefix
            );
            return;
        };

        let result = async {
            let (text, animation) = self.build_welcome(member, &cfg).await?;
            let message =
                OutboundMessage::with_attachment(text, "welcome.gif", animation.into_bytes());
            self.inner
                .platform
                .send_message(channel_id.get(), message)
                .await
                .context("Failed to post welcome message")
        }
        .await;

        match result {
            Ok(_) => info!("Welcome message sent for {}", member.user_name),
            Err(e) => error!(
                "Error sending welcome message for {}: {:#}",
                member.user_name, e
            ),
        }
    }

    /// Resolve the welcome text and composite the image for `member`
    async fn build_welcome(
        &self,
        member: &MemberInfo,
        cfg: &WelcomeConfig,
    ) -> Result<(String, EncodedAnimation)> {
        let text = render_welcome(&cfg.welcome_format, &member.welcome_vars())
            .context("Failed to render welcome format")?;

        let avatar_bytes = self.inner.assets.fetch_avatar(&member.avatar_url).await?;
        let background_bytes = self
            .inner
            .assets
            .fetch_background(cfg.background_type, &cfg.background_path)
            .await?;

        let layout = cfg.layout();
        let image_text = text.clone();
        let task = tokio::task::spawn_blocking(move || {
            let avatar = AvatarBitmap::decode(&avatar_bytes)?;
            let background = BackgroundAsset::decode(&background_bytes)?;
            compose(&background, &avatar, &image_text, &layout)
        });

        let timeout = self.inner.options.compose_timeout;
        let animation = time::timeout(timeout, task)
            .await
            .map_err(|_| anyhow!("Compositing timed out after {:?}", timeout))?
            .context("Compositor task failed")?
            .context("Failed to create welcome image")?;

        debug!(
            "Composited welcome image for {}: {} frames",
            member.user_name,
            animation.frame_count()
        );
        Ok((text, animation))
    }

    async fn on_command(&self, invocation: CommandInvocation) {
        let CommandInvocation {
            channel_id,
            author,
            is_admin,
            command,
            guild_id,
        } = invocation;

        if !is_admin {
            warn!("{} tried {:?} without administrator permission", author.user_name, command);
            self.reply(channel_id, "You need administrator permission to use this command.")
                .await;
            return;
        }

        let command = match command {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected command from {}: {}", author.user_name, e);
                self.reply(channel_id, e.to_string()).await;
                return;
            }
        };

        debug!("{} invoked {:?}", author.user_name, command);
        let reply = match command {
            Command::SetWelcomeChannel { channel_id: target } => {
                match target.or(NonZeroU64::new(channel_id)) {
                    Some(target) => self.set_welcome_channel(target, channel_id).await,
                    None => format!("Could not resolve channel {channel_id}."),
                }
            }
            Command::SetBackground { kind, path } => {
                let reply = format!("Background set to {kind}: {path}");
                self.apply(reply, move |cfg| {
                    cfg.background_type = kind;
                    cfg.background_path = path;
                })
                .await
            }
            Command::SetWelcomeFormat { format } => match validate_format(&format) {
                Ok(()) => {
                    let reply = format!("Welcome format set to: {format}");
                    self.apply(reply, move |cfg| cfg.welcome_format = format).await
                }
                Err(e) => format!("Invalid welcome format: {e}"),
            },
            Command::ToggleWelcome => {
                match self
                    .inner
                    .store
                    .update(|cfg| {
                        cfg.welcome_enabled = !cfg.welcome_enabled;
                        cfg.welcome_enabled
                    })
                    .await
                {
                    Ok(enabled) => format!(
                        "Welcome messages are now {}",
                        if enabled { "enabled" } else { "disabled" }
                    ),
                    Err(e) => format!("Welcome messages toggled, but the change could not be saved: {e}"),
                }
            }
            Command::SetFontSize(size) => {
                self.apply(format!("Font size set to: {size}"), move |cfg| {
                    cfg.font_size = size
                })
                .await
            }
            Command::SetFontColor([r, g, b]) => {
                self.apply(format!("Font color set to RGB: ({r}, {g}, {b})"), move |cfg| {
                    cfg.font_color = [r, g, b]
                })
                .await
            }
            Command::SetBackgroundSize { width, height } => {
                self.apply(format!("Background size set to: {width}x{height}"), move |cfg| {
                    cfg.background_width = width;
                    cfg.background_height = height;
                })
                .await
            }
            Command::SetAvatarSize(size) => {
                self.apply(format!("Avatar size set to: {size}px"), move |cfg| {
                    cfg.avatar_size = size
                })
                .await
            }
            Command::SetTextPosition(x, y) => {
                self.apply(format!("Text position set to: ({x}, {y})"), move |cfg| {
                    cfg.text_position = [x, y]
                })
                .await
            }
            Command::SetAvatarPosition(x, y) => {
                self.apply(format!("Avatar position set to: ({x}, {y})"), move |cfg| {
                    cfg.avatar_position = [x, y]
                })
                .await
            }
            Command::TestWelcome { member_id } => {
                self.test_welcome(guild_id, member_id, author).await
            }
            Command::ShowConfig => self.show_config().await,
        };

        self.reply(channel_id, reply).await;
    }

    /// Persist a change and return the confirmation text
    async fn apply(&self, confirmation: String, change: impl FnOnce(&mut WelcomeConfig)) -> String {
        match self.inner.store.update(change).await {
            Ok(()) => confirmation,
            Err(e) => format!("{confirmation}\nWarning: the change could not be saved ({e})."),
        }
    }

    async fn set_welcome_channel(&self, channel: NonZeroU64, reply_channel: u64) -> String {
        let platform = &self.inner.platform;
        let target = channel.get();
        let mention = platform.channel_mention(target);

        if let Err(e) = self
            .inner
            .store
            .update(|cfg| cfg.welcome_channel_id = Some(channel))
            .await
        {
            self.reply(reply_channel, format!("Warning: the welcome channel could not be saved ({e})."))
                .await;
        }

        // Probe message, removed after `probe_delay`
        let probe = OutboundMessage::text("This channel has been set as the welcome channel. (Test message)");
        match platform.send_message(target, probe).await {
            Ok(message_id) => {
                time::sleep(self.inner.options.probe_delay).await;
                if let Err(e) = platform.delete_message(target, message_id).await {
                    warn!("Failed to delete probe message in {}: {}", target, e);
                }
            }
            Err(PlatformError::Forbidden) => {
                return format!(
                    "Error: I don't have permission to send messages in {mention}. Please check my permissions and try again."
                );
            }
            Err(e) => {
                return format!("Error: could not post in {mention}: {e}");
            }
        }

        let name = platform
            .channel_name(target)
            .await
            .unwrap_or_else(|| target.to_string());
        info!("Welcome channel set to: {} (ID: {})", name, target);
        format!("Welcome channel successfully set to: {mention}")
    }

    async fn test_welcome(
        &self,
        guild_id: u64,
        member_id: Option<NonZeroU64>,
        author: MemberInfo,
    ) -> String {
        let cfg = self.inner.store.snapshot().await;
        let platform = &self.inner.platform;
        let Some(welcome_channel) = cfg.welcome_channel_id.map(NonZeroU64::get) else {
            return format!(
                "Welcome channel is not set. Use {}set_welcome_channel to set it first.",
                self.inner.options.command_prefix
            );
        };

        let member = match member_id {
            None => author,
            Some(id) => match platform.member(guild_id, id.get()).await {
                Some(member) => member,
                None => return format!("Could not find member with ID {id}."),
            },
        };

        let result = async {
            let (text, animation) = self.build_welcome(&member, &cfg).await?;
            let message = OutboundMessage::with_attachment(
                format!("**TEST MESSAGE**\n{text}"),
                "welcome_test.gif",
                animation.into_bytes(),
            );
            platform
                .send_message(welcome_channel, message)
                .await
                .context("Failed to post test welcome message")
        }
        .await;

        match result {
            Ok(_) => format!(
                "Test welcome message sent in {}",
                platform.channel_mention(welcome_channel)
            ),
            Err(e) => {
                error!("Error sending test welcome message: {:#}", e);
                format!("Error sending test welcome message: {e:#}")
            }
        }
    }

    async fn show_config(&self) -> String {
        let cfg = self.inner.store.snapshot().await;
        let mut display = match serde_json::to_value(&cfg) {
            Ok(v) => v,
            Err(e) => return format!("Could not display settings: {e}"),
        };
        if let Some(id) = cfg.welcome_channel_id {
            if let Some(name) = self.inner.platform.channel_name(id.get()).await {
                display["welcome_channel"] = name.into();
            }
        }
        let pretty = serde_json::to_string_pretty(&display).unwrap_or_default();
        format!("```json\n{pretty}\n```")
    }

    async fn reply(&self, channel_id: u64, content: impl Into<String>) {
        if let Err(e) = self
            .inner
            .platform
            .send_message(channel_id, OutboundMessage::text(content))
            .await
        {
            error!("Failed to reply in channel {}: {}", channel_id, e);
        }
    }
}
