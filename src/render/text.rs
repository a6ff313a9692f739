/// Text rendering with rusttype.
///
/// Line metrics are fixed per font: every line is `ceil(ascent - descent)` pixels
/// tall at the configured size (the line gap is not included), and a line is as
/// wide as the advance of its glyph run. This keeps measurements independent of
/// the glyphs' ink and identical across platforms.
use image::RgbaImage;
use rusttype::{Font, Scale, point};
use std::path::Path;
use tracing::debug;

use crate::render::error::RenderError;

pub struct FontFace {
    font: Font<'static>,
    scale: Scale,
}

impl FontFace {
    /// Open a TrueType/OpenType font at `size` pixels
    pub fn load(path: &Path, size: u32) -> Result<Self, RenderError> {
        let font_err = |reason: String| RenderError::FontLoad {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read(path).map_err(|e| font_err(e.to_string()))?;
        let font =
            Font::try_from_vec(data).ok_or_else(|| font_err("not a valid font file".to_string()))?;
        if size == 0 {
            return Err(font_err("font size must be positive".to_string()));
        }

        Ok(Self {
            font,
            scale: Scale::uniform(size as f32),
        })
    }

    pub fn line_height(&self) -> u32 {
        let v = self.font.v_metrics(self.scale);
        (v.ascent - v.descent).ceil() as u32
    }

    fn ascent(&self) -> f32 {
        self.font.v_metrics(self.scale).ascent
    }

    /// Width and height of a single line
    pub fn measure_line(&self, line: &str) -> (u32, u32) {
        let width = self
            .font
            .layout(line, self.scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        (width.max(0.0).ceil() as u32, self.line_height())
    }
}

/// Top-left origin of each line of a centered block.
/// Lines are centered horizontally in the canvas and the block vertically;
/// the cursor advances by each line's height.
pub fn layout_block(line_sizes: &[(u32, u32)], canvas: (u32, u32)) -> Vec<(i32, i32)> {
    let (cw, ch) = (canvas.0 as i32, canvas.1 as i32);
    let total_height: i32 = line_sizes.iter().map(|&(_, h)| h as i32).sum();

    let mut y = (ch - total_height).div_euclid(2);
    let mut origins = Vec::with_capacity(line_sizes.len());
    for &(w, h) in line_sizes {
        origins.push(((cw - w as i32).div_euclid(2), y));
        y += h as i32;
    }
    origins
}

/// Split on line breaks, accepting both `\n` and `\r\n`
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Draw `text` onto `target`.
/// Single-line text goes at `anchor` (top-left); multi-line text is centered as a block.
pub fn draw_text(
    target: &mut RgbaImage,
    text: &str,
    face: &FontFace,
    color: [u8; 3],
    anchor: (i32, i32),
) {
    let lines = split_lines(text);
    let origins = if lines.len() > 1 {
        let sizes: Vec<_> = lines.iter().map(|l| face.measure_line(l)).collect();
        layout_block(&sizes, target.dimensions())
    } else {
        vec![anchor]
    };

    for (line, (x, y)) in lines.iter().zip(origins) {
        draw_line(target, line, face, color, x, y);
    }
}

fn draw_line(target: &mut RgbaImage, line: &str, face: &FontFace, color: [u8; 3], x: i32, y: i32) {
    if line.is_empty() {
        return;
    }

    let tw = target.width() as i32;
    let th = target.height() as i32;
    let [r, g, b] = color;
    let origin = point(x as f32, y as f32 + face.ascent());

    for glyph in face.font.layout(line, face.scale, origin) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, v| {
            let px = bb.min.x + gx as i32;
            let py = bb.min.y + gy as i32;
            if px < 0 || px >= tw || py < 0 || py >= th {
                return;
            }
            let a = v.clamp(0.0, 1.0);
            if a <= 0.0 {
                return;
            }
            let dst = target.get_pixel_mut(px as u32, py as u32);
            let dst_a = dst[3] as f32 / 255.0;
            let out_a = a + dst_a * (1.0 - a);
            if out_a > 0.0 {
                let blend = |src: u8, d: u8| {
                    ((src as f32 * a + d as f32 * dst_a * (1.0 - a)) / out_a).round() as u8
                };
                dst[0] = blend(r, dst[0]);
                dst[1] = blend(g, dst[1]);
                dst[2] = blend(b, dst[2]);
                dst[3] = (out_a * 255.0).round() as u8;
            }
        });
    }

    debug!("Rendered text line '{}' at ({}, {})", line, x, y);
}
