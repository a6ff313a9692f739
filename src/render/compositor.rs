/// Welcome image compositor.
/// Pastes a circular avatar and the welcome text onto every background frame
/// and re-encodes the result as an animated GIF. Stateless and synchronous.
use image::RgbaImage;
use image::imageops::FilterType;
use std::io::Cursor;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::render::avatar::{AvatarBitmap, circle_mask, paste_masked};
use crate::render::background::BackgroundAsset;
use crate::render::encode::{RenderedFrame, encode_gif};
use crate::render::error::RenderError;
use crate::render::text::{FontFace, draw_text};

/// Largest accepted background side, avatar side or font pixel size.
/// Bounds the memory of one composite well below what the GIF format allows.
pub const MAX_DIMENSION: u32 = 4096;

/// Encoded animated GIF
#[derive(Debug, Clone)]
pub struct EncodedAnimation {
    bytes: Vec<u8>,
    frame_count: usize,
}

impl EncodedAnimation {
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Reader positioned at the start of the stream
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes)
    }
}

pub fn compose(
    background: &BackgroundAsset,
    avatar: &AvatarBitmap,
    text: &str,
    layout: &LayoutConfig,
) -> Result<EncodedAnimation, RenderError> {
    let frames = render_frames(background, avatar, text, layout)?;
    let bytes = encode_gif(&frames)?;
    debug!(
        "Encoded welcome GIF: {} frames, {} bytes (source loop count {})",
        frames.len(),
        bytes.len(),
        background.loop_count()
    );
    Ok(EncodedAnimation {
        bytes,
        frame_count: frames.len(),
    })
}

/// Composite every background frame without encoding
pub fn render_frames(
    background: &BackgroundAsset,
    avatar: &AvatarBitmap,
    text: &str,
    layout: &LayoutConfig,
) -> Result<Vec<RenderedFrame>, RenderError> {
    check_layout(layout)?;
    let face = FontFace::load(&layout.font.path, layout.font.size.get())?;

    let avatar_size = layout.avatar_size.get();
    let avatar_img = avatar.resized(avatar_size);
    let mask = circle_mask(avatar_size);

    let (width, height) = (
        layout.background_width.get(),
        layout.background_height.get(),
    );
    let (ax, ay) = layout.avatar_position;

    let frames = background
        .frames()
        .iter()
        .map(|src| {
            let mut frame: RgbaImage =
                image::imageops::resize(&src.image, width, height, FilterType::Lanczos3);
            paste_masked(&mut frame, &avatar_img, &mask, ax, ay);
            draw_text(
                &mut frame,
                text,
                &face,
                layout.font_color,
                layout.text_position,
            );
            RenderedFrame {
                image: frame,
                delay_ms: src.delay_or_default(),
            }
        })
        .collect();

    Ok(frames)
}

/// Reject layouts whose rasters would not fit before anything is allocated
fn check_layout(layout: &LayoutConfig) -> Result<(), RenderError> {
    let (width, height) = (
        layout.background_width.get(),
        layout.background_height.get(),
    );
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::encoding(format!(
            "background {width}x{height} exceeds the {MAX_DIMENSION}px limit"
        )));
    }
    let avatar = layout.avatar_size.get();
    if avatar > MAX_DIMENSION {
        return Err(RenderError::encoding(format!(
            "avatar size {avatar} exceeds the {MAX_DIMENSION}px limit"
        )));
    }
    let font_size = layout.font.size.get();
    if font_size > MAX_DIMENSION {
        return Err(RenderError::FontLoad {
            path: layout.font.path.clone(),
            reason: format!("size {font_size} exceeds the {MAX_DIMENSION}px limit"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FontRef, nz};
    use crate::render::background::{BackgroundFrame, DEFAULT_FRAME_DELAY_MS};
    use crate::render::error::AssetKind;
    use crate::render::text::tests::test_font_path;
    use image::Rgba;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            background_width: nz(120),
            background_height: nz(60),
            avatar_size: nz(32),
            avatar_position: (10, 14),
            text_position: (60, 40),
            font: FontRef {
                path: test_font_path(),
                size: nz(12),
            },
            font_color: [255, 255, 255],
        }
    }

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    fn avatar() -> AvatarBitmap {
        AvatarBitmap::from_image(solid(48, 48, [220, 40, 40, 255]))
    }

    #[test]
    fn frame_count_and_order_are_preserved() {
        let colors = [[10, 0, 0, 255], [0, 10, 0, 255], [0, 0, 10, 255], [10, 10, 0, 255]];
        let bg = BackgroundAsset::from_frames(
            colors
                .iter()
                .map(|c| BackgroundFrame::new(solid(120, 60, *c), Some(40)))
                .collect(),
        );

        let frames = render_frames(&bg, &avatar(), "", &layout()).unwrap();
        assert_eq!(frames.len(), colors.len());
        for (frame, color) in frames.iter().zip(colors) {
            // (0, 0) is outside avatar and text
            assert_eq!(frame.image.get_pixel(0, 0).0, color);
            assert_eq!(frame.delay_ms, 40);
        }

        let encoded = compose(&bg, &avatar(), "hi", &layout()).unwrap();
        assert_eq!(encoded.frame_count(), 4);

        let mut decoder = gif::DecodeOptions::new().read_info(encoded.as_bytes()).unwrap();
        let mut n = 0;
        while decoder.read_next_frame().unwrap().is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
    }

    #[test]
    fn static_background_is_deterministic() {
        let bg = BackgroundAsset::from_image(solid(200, 100, [30, 60, 90, 255]));
        let a = render_frames(&bg, &avatar(), "Welcome Ferris!", &layout()).unwrap();
        let b = render_frames(&bg, &avatar(), "Welcome Ferris!", &layout()).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].image, b[0].image);

        let ea = compose(&bg, &avatar(), "Welcome Ferris!", &layout()).unwrap();
        let eb = compose(&bg, &avatar(), "Welcome Ferris!", &layout()).unwrap();
        assert_eq!(ea.as_bytes(), eb.as_bytes());
    }

    #[test]
    fn avatar_is_cropped_to_a_circle() {
        let background = [0, 0, 255, 255];
        let bg = BackgroundAsset::from_image(solid(120, 60, background));
        let layout = layout();
        let frames = render_frames(&bg, &avatar(), "", &layout).unwrap();
        let img = &frames[0].image;

        let (ax, ay) = layout.avatar_position;
        let size = layout.avatar_size.get();
        let mask = circle_mask(size);
        let resized = avatar().resized(size);
        for y in 0..size {
            for x in 0..size {
                let out = img.get_pixel(ax as u32 + x, ay as u32 + y).0;
                if mask.get_pixel(x, y).0[0] == 0 {
                    assert_eq!(out, background, "outside circle at ({x}, {y})");
                } else {
                    assert_eq!(out, resized.get_pixel(x, y).0, "inside circle at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn missing_delay_falls_back_to_default() {
        let bg = BackgroundAsset::from_image(solid(20, 20, [0, 0, 0, 255]));
        let encoded = compose(&bg, &avatar(), "", &layout()).unwrap();

        let mut decoder = gif::DecodeOptions::new().read_info(encoded.as_bytes()).unwrap();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(frame.delay as u32 * 10, DEFAULT_FRAME_DELAY_MS);
    }

    #[test]
    fn frames_are_resized_to_layout() {
        let bg = BackgroundAsset::from_image(solid(37, 91, [5, 5, 5, 255]));
        let frames = render_frames(&bg, &avatar(), "x", &layout()).unwrap();
        assert_eq!(frames[0].image.dimensions(), (120, 60));
    }

    #[test]
    fn bad_font_fails_before_any_frame() {
        let mut layout = layout();
        layout.font.path = "/nonexistent/font.ttf".into();
        let bg = BackgroundAsset::from_image(solid(20, 20, [0, 0, 0, 255]));
        let err = compose(&bg, &avatar(), "x", &layout).unwrap_err();
        assert!(matches!(err, RenderError::FontLoad { .. }));
    }

    #[test]
    fn undecodable_avatar_produces_no_output() {
        let result = AvatarBitmap::decode(b"not an avatar").and_then(|avatar| {
            let bg = BackgroundAsset::from_image(solid(20, 20, [0, 0, 0, 255]));
            compose(&bg, &avatar, "x", &layout())
        });
        assert!(matches!(
            result,
            Err(RenderError::AssetLoad {
                asset: AssetKind::Avatar,
                ..
            })
        ));
    }

    #[test]
    fn oversized_layout_fails_without_allocating() {
        let bg = BackgroundAsset::from_image(solid(20, 20, [0, 0, 0, 255]));

        let mut huge_canvas = layout();
        huge_canvas.background_width = nz(u32::MAX);
        huge_canvas.background_height = nz(u32::MAX);
        let err = compose(&bg, &avatar(), "x", &huge_canvas).unwrap_err();
        assert!(matches!(err, RenderError::Encoding { .. }), "{err}");

        let mut huge_avatar = layout();
        huge_avatar.avatar_size = nz(u32::MAX);
        let err = compose(&bg, &avatar(), "x", &huge_avatar).unwrap_err();
        assert!(matches!(err, RenderError::Encoding { .. }), "{err}");

        let mut huge_font = layout();
        huge_font.font.size = nz(MAX_DIMENSION + 1);
        let err = compose(&bg, &avatar(), "x", &huge_font).unwrap_err();
        assert!(matches!(err, RenderError::FontLoad { .. }), "{err}");
    }

    #[test]
    fn largest_accepted_background_side_renders() {
        let mut wide = layout();
        wide.background_width = nz(MAX_DIMENSION);
        wide.background_height = nz(2);
        wide.avatar_size = nz(2);
        let bg = BackgroundAsset::from_image(solid(4, 4, [9, 9, 9, 255]));
        let frames = render_frames(&bg, &avatar(), "", &wide).unwrap();
        assert_eq!(frames[0].image.dimensions(), (MAX_DIMENSION, 2));
    }

    #[test]
    fn reader_starts_at_beginning() {
        use std::io::Read;
        let bg = BackgroundAsset::from_image(solid(20, 20, [0, 0, 0, 255]));
        let encoded = compose(&bg, &avatar(), "", &layout()).unwrap();
        let mut magic = [0u8; 6];
        encoded.into_reader().read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"GIF89a");
    }
}
