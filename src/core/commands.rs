/// Prefix command parsing (`!set_font_size 30`, ...).
/// Parsing only validates argument shape and ranges; applying happens in the service.
use std::num::{NonZeroU32, NonZeroU64};
use thiserror::Error;

use crate::config::BackgroundKind;
use crate::render::MAX_DIMENSION;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` means the channel the command was typed in
    SetWelcomeChannel { channel_id: Option<NonZeroU64> },
    SetBackground { kind: BackgroundKind, path: String },
    SetWelcomeFormat { format: String },
    ToggleWelcome,
    SetFontSize(NonZeroU32),
    SetFontColor([u8; 3]),
    SetBackgroundSize { width: NonZeroU32, height: NonZeroU32 },
    SetAvatarSize(NonZeroU32),
    SetTextPosition(i32, i32),
    SetAvatarPosition(i32, i32),
    /// `None` means the invoking member
    TestWelcome { member_id: Option<NonZeroU64> },
    ShowConfig,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {prefix}{usage}")]
    Usage { prefix: String, usage: &'static str },
    #[error("{0}")]
    Invalid(&'static str),
    #[error("{what} must be at most {max}.")]
    TooLarge { what: &'static str, max: u32 },
}

/// Parse a message. Returns `Ok(None)` for anything that is not one of our commands.
pub fn parse(prefix: &str, content: &str) -> Result<Option<Command>, CommandError> {
    let Some(body) = content.strip_prefix(prefix) else {
        return Ok(None);
    };
    let body = body.trim_start();
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(i) => (&body[..i], body[i..].trim()),
        None => (body, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();
    let usage = |usage: &'static str| CommandError::Usage {
        prefix: prefix.to_string(),
        usage,
    };

    let command = match name {
        "set_welcome_channel" => {
            let u = "set_welcome_channel [#channel]";
            let channel_id = match args.as_slice() {
                [] => None,
                [c] => Some(parse_mention(c, "#").ok_or_else(|| usage(u))?),
                _ => return Err(usage(u)),
            };
            Command::SetWelcomeChannel { channel_id }
        }
        "set_background" => {
            let u = "set_background <local|url> <path>";
            let Some((kind, path)) = rest.split_once(char::is_whitespace) else {
                return Err(usage(u));
            };
            let kind = kind
                .parse::<BackgroundKind>()
                .map_err(|_| CommandError::Invalid("Invalid background type. Use 'local' or 'url'."))?;
            Command::SetBackground {
                kind,
                path: path.trim().to_string(),
            }
        }
        "set_welcome_format" => {
            if rest.is_empty() {
                return Err(usage("set_welcome_format <text>"));
            }
            Command::SetWelcomeFormat {
                format: rest.to_string(),
            }
        }
        "toggle_welcome" => Command::ToggleWelcome,
        "set_font_size" => {
            let [n] = ints::<1>(&args).ok_or_else(|| usage("set_font_size <size>"))?;
            Command::SetFontSize(size(n, "Font size", "Font size must be a positive number.")?)
        }
        "set_font_color" => {
            let [r, g, b] = ints::<3>(&args).ok_or_else(|| usage("set_font_color <r> <g> <b>"))?;
            let channel = |c: i64| {
                u8::try_from(c).map_err(|_| CommandError::Invalid("RGB values must be between 0 and 255."))
            };
            Command::SetFontColor([channel(r)?, channel(g)?, channel(b)?])
        }
        "set_background_size" => {
            let [w, h] =
                ints::<2>(&args).ok_or_else(|| usage("set_background_size <width> <height>"))?;
            let msg = "Width and height must be positive numbers.";
            Command::SetBackgroundSize {
                width: size(w, "Width", msg)?,
                height: size(h, "Height", msg)?,
            }
        }
        "set_avatar_size" => {
            let [n] = ints::<1>(&args).ok_or_else(|| usage("set_avatar_size <size>"))?;
            Command::SetAvatarSize(size(n, "Avatar size", "Avatar size must be a positive number.")?)
        }
        "set_text_position" => {
            let [x, y] = coords(&args).ok_or_else(|| usage("set_text_position <x> <y>"))?;
            Command::SetTextPosition(x, y)
        }
        "set_avatar_position" => {
            let [x, y] = coords(&args).ok_or_else(|| usage("set_avatar_position <x> <y>"))?;
            Command::SetAvatarPosition(x, y)
        }
        "test_welcome" => {
            let u = "test_welcome [@member]";
            let member_id = match args.as_slice() {
                [] => None,
                [m] => Some(parse_member_mention(m).ok_or_else(|| usage(u))?),
                _ => return Err(usage(u)),
            };
            Command::TestWelcome { member_id }
        }
        "show_config" => Command::ShowConfig,
        _ => return Ok(None),
    };

    Ok(Some(command))
}

fn ints<const N: usize>(args: &[&str]) -> Option<[i64; N]> {
    if args.len() != N {
        return None;
    }
    let mut out = [0i64; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse().ok()?;
    }
    Some(out)
}

fn coords(args: &[&str]) -> Option<[i32; 2]> {
    let [x, y] = ints::<2>(args)?;
    Some([i32::try_from(x).ok()?, i32::try_from(y).ok()?])
}

/// Pixel size in `1..=MAX_DIMENSION`
fn size(n: i64, what: &'static str, msg: &'static str) -> Result<NonZeroU32, CommandError> {
    if n > i64::from(MAX_DIMENSION) {
        return Err(CommandError::TooLarge {
            what,
            max: MAX_DIMENSION,
        });
    }
    u32::try_from(n)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(CommandError::Invalid(msg))
}

/// `<#123>` / `<@123>` style mention or a bare id. Discord ids are never zero.
fn parse_mention(arg: &str, sigil: &str) -> Option<NonZeroU64> {
    let inner = arg
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .map(|s| s.strip_prefix(sigil))
        .unwrap_or(Some(arg))?;
    inner.parse().ok()
}

fn parse_member_mention(arg: &str) -> Option<NonZeroU64> {
    parse_mention(arg, "@!").or_else(|| parse_mention(arg, "@"))
}
