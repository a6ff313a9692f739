/// Animated GIF assembly.
use gif::{DisposalMethod, Encoder, Frame, Repeat};
use image::RgbaImage;

use crate::render::error::RenderError;

/// NeuQuant speed used when a frame has more than 256 colors (1 = best, 30 = fastest)
const QUANTIZE_SPEED: i32 = 10;

/// A composited frame ready for encoding
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub image: RgbaImage,
    pub delay_ms: u32,
}

/// Encode frames as an infinitely looping GIF.
/// Every frame covers the whole canvas and is disposed to background, so no
/// frame shows through the next.
pub fn encode_gif(frames: &[RenderedFrame]) -> Result<Vec<u8>, RenderError> {
    let first = frames
        .first()
        .ok_or_else(|| RenderError::encoding("no frames to encode"))?;
    let (width, height) = first.image.dimensions();
    let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(RenderError::encoding(format!(
                "{width}x{height} exceeds the GIF size limit"
            )));
        }
    };

    let gif_err = |e: gif::EncodingError| RenderError::encoding(e.to_string());

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, w, h, &[]).map_err(gif_err)?;
        encoder.set_repeat(Repeat::Infinite).map_err(gif_err)?;

        for (i, rendered) in frames.iter().enumerate() {
            if rendered.image.dimensions() != (width, height) {
                return Err(RenderError::encoding(format!(
                    "frame {i} is {:?}, expected {width}x{height}",
                    rendered.image.dimensions()
                )));
            }

            let mut pixels = rendered.image.as_raw().clone();
            let mut frame = Frame::from_rgba_speed(w, h, &mut pixels, QUANTIZE_SPEED);
            // GIF delay is in centiseconds
            frame.delay = u16::try_from(rendered.delay_ms / 10).unwrap_or(u16::MAX);
            frame.dispose = DisposalMethod::Background;
            encoder.write_frame(&frame).map_err(gif_err)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(rgba: [u8; 4], delay_ms: u32) -> RenderedFrame {
        RenderedFrame {
            image: RgbaImage::from_pixel(6, 4, Rgba(rgba)),
            delay_ms,
        }
    }

    #[test]
    fn zero_frames_is_an_encoding_error() {
        assert!(matches!(encode_gif(&[]), Err(RenderError::Encoding { .. })));
    }

    #[test]
    fn mismatched_frame_sizes_are_rejected() {
        let odd = RenderedFrame {
            image: RgbaImage::new(2, 2),
            delay_ms: 100,
        };
        let err = encode_gif(&[frame([0, 0, 0, 255], 100), odd]).unwrap_err();
        assert!(matches!(err, RenderError::Encoding { .. }));
    }

    #[test]
    fn output_loops_forever_and_replaces_frames() {
        let bytes = encode_gif(&[frame([255, 0, 0, 255], 70), frame([0, 0, 255, 255], 100)]).unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes.as_slice()).unwrap();
        assert_eq!((decoder.width(), decoder.height()), (6, 4));

        let mut seen = Vec::new();
        while let Some(f) = decoder.read_next_frame().unwrap() {
            seen.push((f.delay, f.dispose, f.buffer[..4].to_vec()));
        }
        assert_eq!(decoder.repeat(), Repeat::Infinite);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (7, DisposalMethod::Background, vec![255, 0, 0, 255]));
        assert_eq!(seen[1], (10, DisposalMethod::Background, vec![0, 0, 255, 255]));
    }
}
