/// Avatar preparation: decode, resize, circular mask and masked paste.
use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbaImage};

use crate::render::error::{AssetKind, RenderError};

/// Single RGBA raster of arbitrary source size
#[derive(Debug, Clone)]
pub struct AvatarBitmap {
    image: RgbaImage,
}

impl AvatarBitmap {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        let img =
            image::load_from_memory(bytes).map_err(|e| RenderError::asset(AssetKind::Avatar, e))?;
        Ok(Self::from_image(img.to_rgba8()))
    }

    /// Square resize with the same filter used for background frames
    pub fn resized(&self, size: u32) -> RgbaImage {
        image::imageops::resize(&self.image, size, size, FilterType::Lanczos3)
    }
}

/// Binary mask of the circle inscribed in a `size`×`size` square.
/// A pixel is opaque when its center lies inside the circle.
pub fn circle_mask(size: u32) -> GrayImage {
    let radius = size as f32 / 2.0;
    GrayImage::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        if dx * dx + dy * dy <= radius * radius {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Copy `src` onto `dst` at (x, y) wherever `mask` is non-zero.
/// Masked pixels replace the destination outright; off-canvas pixels are clipped.
pub fn paste_masked(dst: &mut RgbaImage, src: &RgbaImage, mask: &GrayImage, x: i32, y: i32) {
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (sx, sy, pixel) in src.enumerate_pixels() {
        if mask.get_pixel(sx, sy).0[0] == 0 {
            continue;
        }
        let px = x as i64 + sx as i64;
        let py = y as i64 + sy as i64;
        if px < 0 || py < 0 || px >= dw || py >= dh {
            continue;
        }
        dst.put_pixel(px as u32, py as u32, *pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn mask_is_opaque_in_center_and_clear_in_corners() {
        let mask = circle_mask(64);
        assert_eq!(mask.get_pixel(32, 32).0[0], 255);
        assert_eq!(mask.get_pixel(0, 32).0[0], 255);
        for (x, y) in [(0, 0), (63, 0), (0, 63), (63, 63)] {
            assert_eq!(mask.get_pixel(x, y).0[0], 0, "corner ({x}, {y})");
        }
    }

    #[test]
    fn mask_is_symmetric() {
        let mask = circle_mask(17);
        for y in 0..17 {
            for x in 0..17 {
                assert_eq!(mask.get_pixel(x, y), mask.get_pixel(16 - x, y));
                assert_eq!(mask.get_pixel(x, y), mask.get_pixel(x, 16 - y));
            }
        }
    }

    #[test]
    fn paste_only_writes_masked_pixels() {
        let mut dst = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 255]));
        let mask = circle_mask(8);
        paste_masked(&mut dst, &src, &mask, 1, 1);

        assert_eq!(dst.get_pixel(5, 5).0, [200, 100, 50, 255]);
        // avatar corner (0, 0) lands on (1, 1) but is outside the circle
        assert_eq!(dst.get_pixel(1, 1).0, [0, 0, 0, 255]);
        assert_eq!(dst.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn paste_clips_negative_and_overflowing_positions() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(6, 6, Rgba([9, 9, 9, 255]));
        let mask = GrayImage::from_pixel(6, 6, Luma([255]));
        paste_masked(&mut dst, &src, &mask, -3, 2);

        assert_eq!(dst.get_pixel(0, 2).0, [9, 9, 9, 255]);
        assert_eq!(dst.get_pixel(2, 3).0, [9, 9, 9, 255]);
        assert_eq!(dst.get_pixel(3, 2).0, [0, 0, 0, 255]);
        assert_eq!(dst.get_pixel(0, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn undecodable_avatar_is_an_avatar_load_error() {
        let err = AvatarBitmap::decode(&[0x89, 0x50, 0x4e, 0x47]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::AssetLoad {
                asset: AssetKind::Avatar,
                ..
            }
        ));
    }
}
