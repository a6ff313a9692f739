pub mod avatar;
pub mod background;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod text;

pub use avatar::AvatarBitmap;
pub use background::BackgroundAsset;
pub use compositor::{EncodedAnimation, MAX_DIMENSION, compose};
pub use error::{AssetKind, AssetSource, RenderError};
