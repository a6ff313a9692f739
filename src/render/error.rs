/// Compositor error taxonomy.
/// Every variant names the asset or step that failed so callers can log it.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which input asset a load failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Background,
    Avatar,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Background => f.write_str("background"),
            AssetKind::Avatar => f.write_str("avatar"),
        }
    }
}

/// Underlying cause of an asset load failure
#[derive(Debug, Error)]
pub enum AssetSource {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Gif(#[from] gif::DecodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load {asset} image: {source}")]
    AssetLoad {
        asset: AssetKind,
        #[source]
        source: AssetSource,
    },

    #[error("failed to load font {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },

    #[error("failed to encode animation: {reason}")]
    Encoding { reason: String },
}

impl RenderError {
    pub fn asset(asset: AssetKind, source: impl Into<AssetSource>) -> Self {
        RenderError::AssetLoad {
            asset,
            source: source.into(),
        }
    }

    pub fn encoding(reason: impl Into<String>) -> Self {
        RenderError::Encoding {
            reason: reason.into(),
        }
    }
}
