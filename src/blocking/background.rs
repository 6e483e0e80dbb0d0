//! Background image upload: JPEG or raw NV12 into the blocking config.

use std::sync::Arc;

use image::RgbImage;

use crate::blocking::{BlockingState, MAX_BACKGROUND_BYTES};
use crate::error::{EncodeError, Result};

/// Store a JPEG background: decode, convert to NV12, swap into the config.
///
/// A decode failure leaves the previous background intact.
pub fn upload_jpeg(state: &BlockingState, jpeg: &[u8]) -> Result<(u32, u32)> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|e| EncodeError::jpeg_decode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    // NV12 needs even geometry; odd edges are cropped.
    let w = rgb.width() & !1;
    let h = rgb.height() & !1;
    if w == 0 || h == 0 {
        return Err(EncodeError::jpeg_decode("image too small for NV12"));
    }
    let needed = w as usize * h as usize * 3 / 2;
    if needed > MAX_BACKGROUND_BYTES {
        return Err(EncodeError::BackgroundTooLarge {
            bytes: needed,
            max: MAX_BACKGROUND_BYTES,
        });
    }

    let nv12 = rgb_to_nv12(&rgb, w, h);
    state.update(|cfg| {
        cfg.background = Arc::new(nv12);
        cfg.bg_w = w;
        cfg.bg_h = h;
        cfg.bg_valid = true;
    });
    Ok((w, h))
}

/// Store an already-converted NV12 background of the given geometry.
pub fn upload_raw_nv12(state: &BlockingState, nv12: &[u8], w: u32, h: u32) -> Result<(u32, u32)> {
    let (w, h) = (w & !1, h & !1);
    if w == 0 || h == 0 {
        return Err(EncodeError::jpeg_decode("zero background geometry"));
    }
    let needed = w as usize * h as usize * 3 / 2;
    if needed > MAX_BACKGROUND_BYTES {
        return Err(EncodeError::BackgroundTooLarge {
            bytes: needed,
            max: MAX_BACKGROUND_BYTES,
        });
    }
    if nv12.len() < needed {
        return Err(EncodeError::OversizedFrame {
            needed,
            got: nv12.len(),
        });
    }
    let bytes = nv12[..needed].to_vec();
    state.update(|cfg| {
        cfg.background = Arc::new(bytes);
        cfg.bg_w = w;
        cfg.bg_h = h;
        cfg.bg_valid = true;
    });
    Ok((w, h))
}

/// BT.601 limited-range RGB to NV12.
///
/// Luma per pixel; chroma taken from the top-left pixel of each 2x2 block.
/// Y lands in [16, 235], U/V in [16, 240]. The shifts are arithmetic so the
/// negative chroma sums floor exactly like the reference integer math.
fn rgb_to_nv12(rgb: &RgbImage, w: u32, h: u32) -> Vec<u8> {
    let (w, h) = (w as usize, h as usize);
    let mut out = vec![0u8; w * h + w * (h / 2)];
    let (y_plane, uv_plane) = out.split_at_mut(w * h);

    for yy in 0..h {
        for xx in 0..w {
            let p = rgb.get_pixel(xx as u32, yy as u32);
            let (r, g, b) = (p[0] as i32, p[1] as i32, p[2] as i32);

            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[yy * w + xx] = luma.clamp(16, 235) as u8;

            if xx % 2 == 0 && yy % 2 == 0 {
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                let off = (yy / 2) * w + xx;
                uv_plane[off] = u.clamp(16, 240) as u8;
                uv_plane[off + 1] = v.clamp(16, 240) as u8;
            }
        }
    }
    out
}
