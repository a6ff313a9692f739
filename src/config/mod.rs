use serde::{Deserialize, Deserializer, Serialize};
use std::num::{NonZeroU32, NonZeroU64};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the bot process (from CLI args / environment)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub command_prefix: String,
    pub config_path: PathBuf,
    pub compose_timeout: Duration,
    pub fetch_timeout: Duration,
}

/// Where the background image comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Local,
    #[default]
    Url,
}

impl std::str::FromStr for BackgroundKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(BackgroundKind::Local),
            "url" => Ok(BackgroundKind::Url),
            _ => Err(format!("Unknown background type: {s}")),
        }
    }
}

impl std::fmt::Display for BackgroundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundKind::Local => f.write_str("local"),
            BackgroundKind::Url => f.write_str("url"),
        }
    }
}

/// Persisted welcome settings. Field names match the JSON settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    pub background_type: BackgroundKind,
    pub background_path: String,
    pub background_width: NonZeroU32,
    pub background_height: NonZeroU32,
    pub font_path: PathBuf,
    pub font_size: NonZeroU32,
    pub font_color: [u8; 3],
    pub avatar_size: NonZeroU32,
    pub avatar_position: [i32; 2],
    pub text_position: [i32; 2],
    pub welcome_format: String,
    pub welcome_enabled: bool,
    /// A stored `0` reads as unset
    #[serde(deserialize_with = "channel_id_or_unset")]
    pub welcome_channel_id: Option<NonZeroU64>,
}

fn channel_id_or_unset<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NonZeroU64>, D::Error> {
    Ok(Option::<u64>::deserialize(d)?.and_then(NonZeroU64::new))
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            background_type: BackgroundKind::Url,
            background_path: "https://example.com/background.gif".to_string(),
            background_width: nz(500),
            background_height: nz(232),
            font_path: PathBuf::from("./font.ttf"),
            font_size: nz(30),
            font_color: [255, 255, 255],
            avatar_size: nz(64),
            avatar_position: [50, 84],
            text_position: [250, 180],
            welcome_format: "Welcome {display_name}! to the server!".to_string(),
            welcome_enabled: true,
            welcome_channel_id: None,
        }
    }
}

impl WelcomeConfig {
    /// Project the compositor layout out of the persisted settings
    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            background_width: self.background_width,
            background_height: self.background_height,
            avatar_size: self.avatar_size,
            avatar_position: (self.avatar_position[0], self.avatar_position[1]),
            text_position: (self.text_position[0], self.text_position[1]),
            font: FontRef {
                path: self.font_path.clone(),
                size: self.font_size,
            },
            font_color: self.font_color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontRef {
    pub path: PathBuf,
    /// Pixel height
    pub size: NonZeroU32,
}

/// Geometry and styling for one compositor call.
/// Positions may be negative; anything off-canvas is clipped.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub background_width: NonZeroU32,
    pub background_height: NonZeroU32,
    pub avatar_size: NonZeroU32,
    pub avatar_position: (i32, i32),
    pub text_position: (i32, i32),
    pub font: FontRef,
    pub font_color: [u8; 3],
}

pub(crate) const fn nz(v: u32) -> NonZeroU32 {
    match NonZeroU32::new(v) {
        Some(v) => v,
        None => panic!("zero is not a valid size"),
    }
}
