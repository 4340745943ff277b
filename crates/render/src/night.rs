//! Night-mode palette transform: desaturate, then invert.

use crate::buffer::{BufferPool, PixelBuffer};
use crate::error::RenderError;

const LUMA_R: f32 = 0.213;
const LUMA_G: f32 = 0.715;
const LUMA_B: f32 = 0.072;

/// Night-mode value of one RGB pixel (the same for all three channels).
pub fn night_value(rgb: [u8; 3]) -> u8 {
    let luma = LUMA_R * rgb[0] as f32 + LUMA_G * rgb[1] as f32 + LUMA_B * rgb[2] as f32;
    255 - luma.round().clamp(0.0, 255.0) as u8
}

/// Produces the night-mode version of `source` in a fresh buffer from `pool`.
///
/// Alpha is preserved. The caller drops `source` afterwards, which returns it
/// to its pool.
pub fn apply_night_mode(source: &PixelBuffer, pool: &BufferPool) -> Result<PixelBuffer, RenderError> {
    let format = source.format();
    let mut output = pool.acquire(source.width(), source.height(), format)?;
    let bpp = format.bytes_per_pixel();

    for (src, dst) in source.as_bytes().chunks_exact(bpp).zip(output.as_bytes_mut().chunks_exact_mut(bpp)) {
        let value = night_value([src[0], src[1], src[2]]);
        dst[..3].fill(value);
        if bpp == 4 {
            dst[3] = src[3];
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::PixelFormat;

    #[test]
    fn test_white_becomes_black() {
        assert_eq!(night_value([255, 255, 255]), 0);
        assert_eq!(night_value([0, 0, 0]), 255);
    }

    #[test]
    fn test_pure_green_uses_luma_weight() {
        // 0.715 * 255 = 182.3 -> 182
        assert_eq!(night_value([0, 255, 0]), 255 - 182);
    }

    #[test]
    fn test_apply_preserves_alpha() {
        let pool = BufferPool::new();
        let source =
            PixelBuffer::from_vec(1, 1, PixelFormat::Rgba8, vec![255, 255, 255, 128]).unwrap();
        let night = apply_night_mode(&source, &pool).unwrap();

        assert_eq!(night.as_bytes(), &[0, 0, 0, 128]);
        assert_eq!(night.format(), PixelFormat::Rgba8);
    }

    #[test]
    fn test_apply_rgb_buffer() {
        let pool = BufferPool::new();
        let source = PixelBuffer::from_vec(2, 1, PixelFormat::Rgb8, vec![0, 0, 0, 255, 0, 0])
            .unwrap();
        let night = apply_night_mode(&source, &pool).unwrap();

        // 0.213 * 255 = 54.3 -> 54
        assert_eq!(night.as_bytes(), &[255, 255, 255, 201, 201, 201]);
    }
}
