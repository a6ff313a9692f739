/// Background decoding.
/// GIFs are decoded frame by frame into full-canvas snapshots; any other format is one frame.
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::render::error::{AssetKind, AssetSource, RenderError};

/// Frame duration used when the source carries none
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, Clone)]
pub struct BackgroundFrame {
    pub image: RgbaImage,
    /// Display duration from the source, `None` when absent
    pub delay_ms: Option<u32>,
}

impl BackgroundFrame {
    pub fn new(image: RgbaImage, delay_ms: Option<u32>) -> Self {
        Self { image, delay_ms }
    }

    pub fn delay_or_default(&self) -> u32 {
        self.delay_ms.unwrap_or(DEFAULT_FRAME_DELAY_MS)
    }
}

/// One or more raster frames plus loop count (0 = infinite)
#[derive(Debug, Clone)]
pub struct BackgroundAsset {
    frames: Vec<BackgroundFrame>,
    loop_count: u16,
}

impl BackgroundAsset {
    pub fn from_frames(frames: Vec<BackgroundFrame>) -> Self {
        Self {
            frames,
            loop_count: 0,
        }
    }

    /// A static image is a one-frame sequence without duration metadata
    pub fn from_image(image: RgbaImage) -> Self {
        Self::from_frames(vec![BackgroundFrame::new(image, None)])
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        if let Ok(image::ImageFormat::Gif) = image::guess_format(bytes) {
            return decode_gif(bytes);
        }

        let img = image::load_from_memory(bytes)
            .map_err(|e| RenderError::asset(AssetKind::Background, e))?;
        debug!("Decoded static background {}x{}", img.width(), img.height());
        Ok(Self::from_image(img.to_rgba8()))
    }

    pub fn frames(&self) -> &[BackgroundFrame] {
        &self.frames
    }

    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }
}

fn decode_gif(bytes: &[u8]) -> Result<BackgroundAsset, RenderError> {
    let gif_err = |e: gif::DecodingError| RenderError::asset(AssetKind::Background, e);

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(bytes).map_err(gif_err)?;

    let width = decoder.width() as u32;
    let height = decoder.height() as u32;
    let loop_count = match decoder.repeat() {
        gif::Repeat::Infinite => 0,
        gif::Repeat::Finite(n) => n,
    };

    // Composite canvas for handling disposal methods
    let mut canvas = RgbaImage::new(width, height);
    let mut frames = Vec::new();

    while let Some(frame) = decoder.read_next_frame().map_err(gif_err)? {
        let fx = frame.left as u32;
        let fy = frame.top as u32;
        let fw = frame.width as u32;
        let fh = frame.height as u32;

        let patch = RgbaImage::from_raw(fw, fh, frame.buffer.to_vec()).ok_or_else(|| {
            RenderError::asset(
                AssetKind::Background,
                AssetSource::Invalid(format!("frame buffer does not match {fw}x{fh}")),
            )
        })?;

        let previous = (frame.dispose == gif::DisposalMethod::Previous).then(|| canvas.clone());
        image::imageops::overlay(&mut canvas, &patch, fx as i64, fy as i64);

        // GIF delay is in centiseconds
        let delay_ms = match frame.delay {
            0 => None,
            d => Some(d as u32 * 10),
        };
        frames.push(BackgroundFrame::new(canvas.clone(), delay_ms));

        match frame.dispose {
            gif::DisposalMethod::Background => clear_rect(&mut canvas, fx, fy, fw, fh),
            gif::DisposalMethod::Previous => {
                if let Some(prev) = previous {
                    canvas = prev;
                }
            }
            _ => {}
        }
    }

    if frames.is_empty() {
        return Err(RenderError::asset(
            AssetKind::Background,
            AssetSource::Invalid("GIF has no frames".to_string()),
        ));
    }

    debug!(
        "Decoded GIF background {}x{}: {} frames, loop count {}",
        width,
        height,
        frames.len(),
        loop_count
    );

    Ok(BackgroundAsset { frames, loop_count })
}

fn clear_rect(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32) {
    let x_end = x.saturating_add(w).min(canvas.width());
    let y_end = y.saturating_add(h).min(canvas.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            canvas.put_pixel(px, py, Rgba([0, 0, 0, 0]));
        }
    }
}
