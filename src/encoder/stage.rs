//! Staging of source frames into the encoder input buffer, plus the
//! overlay/blocking hooks that run on the staged pixels.
//!
//! Both encoder backends share this path: the software backend stages into a
//! heap buffer, the hardware backend into its frame DMA buffer. Either way
//! the buffer uses the configuration's aligned strides and must have been
//! zero-filled at allocation so padding never leaks into the output.

use mj_scale::nv12::{copy_aligned_nv12, downscale_nv12, split_planes};
use mj_scale::PixelFormat;

use crate::encoder::plan::{frame_buffer_size, EncoderConfig};
use crate::error::{EncodeError, Result};
use crate::frame::Frame;
use crate::overlay;
use crate::overlay::text::Planes;
use crate::SharedState;

/// Copy (and, for NV12, optionally downscale) `src` into the staged input
/// buffer at the configuration's strides.
pub(crate) fn stage_frame(dst: &mut [u8], src: &Frame, cfg: &EncoderConfig) -> Result<()> {
    let needed = frame_buffer_size(cfg);
    if dst.len() < needed {
        return Err(EncodeError::OversizedFrame {
            needed,
            got: dst.len(),
        });
    }
    let dst = &mut dst[..needed];

    match cfg.format {
        PixelFormat::Nv12 => {
            if cfg.downscale {
                downscale_nv12(src.payload(), src.width, src.height, dst, cfg.width, cfg.height)?;
            } else {
                copy_aligned_nv12(src.payload(), src.width, src.height, dst)?;
            }
            Ok(())
        }
        PixelFormat::Nv16 => stage_semiplanar(dst, src, cfg, src.height, 1),
        PixelFormat::Nv24 => stage_semiplanar(dst, src, cfg, src.height, 2),
        PixelFormat::Yuyv | PixelFormat::Uyvy => stage_packed(dst, src, cfg, 2),
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => stage_packed(dst, src, cfg, 3),
        PixelFormat::Jpeg => Err(EncodeError::unsupported_format(cfg.format)),
    }
}

/// Row-wise copy of a semi-planar source whose chroma plane has `uv_height`
/// rows of `width * uv_channels` bytes.
fn stage_semiplanar(
    dst: &mut [u8],
    src: &Frame,
    cfg: &EncoderConfig,
    uv_height: u32,
    uv_channels: usize,
) -> Result<()> {
    let w = src.width as usize;
    let stride = cfg.hor_stride as usize;
    let ver_stride = cfg.ver_stride as usize;
    let bytes = src.payload();
    let (src_y, src_uv) = bytes.split_at(w * src.height as usize);

    for row in 0..src.height as usize {
        dst[row * stride..row * stride + w].copy_from_slice(&src_y[row * w..row * w + w]);
    }
    let uv_dst = &mut dst[stride * ver_stride..];
    let uv_row = w * uv_channels;
    let uv_stride = stride * uv_channels;
    for row in 0..uv_height as usize {
        uv_dst[row * uv_stride..row * uv_stride + uv_row]
            .copy_from_slice(&src_uv[row * uv_row..row * uv_row + uv_row]);
    }
    Ok(())
}

/// Row-wise copy of a packed source at `channels` bytes per pixel.
fn stage_packed(dst: &mut [u8], src: &Frame, cfg: &EncoderConfig, channels: usize) -> Result<()> {
    let row_bytes = src.width as usize * channels;
    let dst_stride = cfg.hor_stride as usize * channels;
    let bytes = src.payload();
    for row in 0..src.height as usize {
        dst[row * dst_stride..row * dst_stride + row_bytes]
            .copy_from_slice(&bytes[row * row_bytes..row * row_bytes + row_bytes]);
    }
    Ok(())
}

/// Run the blocking compositor and the text overlay over a staged NV12
/// buffer. Non-NV12 stages pass through untouched; blocking costs one
/// atomic load when disabled.
pub(crate) fn apply_overlays(
    dst: &mut [u8],
    src: &Frame,
    cfg: &EncoderConfig,
    shared: &SharedState,
) -> Result<()> {
    if cfg.format != PixelFormat::Nv12 {
        return Ok(());
    }
    let stride = cfg.hor_stride as usize;
    let ver_stride = cfg.ver_stride as usize;
    let (y, uv) = split_planes(dst, stride, ver_stride)?;
    let mut planes = Planes {
        y,
        uv,
        y_stride: stride,
        uv_stride: stride,
        width: cfg.width,
        height: cfg.height,
    };

    if shared.blocking.is_enabled_fast() {
        let snap = shared.blocking.snapshot();
        if snap.enabled {
            crate::blocking::compose::composite(
                &mut planes,
                src,
                &snap,
                shared.blocking.raw_cache(),
                &shared.fonts,
            );
        }
    }

    let snap = shared.overlay.snapshot();
    overlay::render(&mut planes, &snap, &shared.fonts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::plan::plan_config;
    use mj_scale::ScalePolicy;

    #[test]
    fn nv12_staging_lands_planes_at_aligned_offsets() {
        let mut src = Frame::new_raw(PixelFormat::Nv12, 20, 10).unwrap();
        src.bytes[0] = 0xAA;
        src.bytes[20 * 10] = 0xBB;
        let cfg = plan_config(ScalePolicy::P2160, &src).unwrap();
        let mut dst = vec![0u8; frame_buffer_size(&cfg)];
        stage_frame(&mut dst, &src, &cfg).unwrap();
        assert_eq!(dst[0], 0xAA);
        assert_eq!(dst[32 * 16], 0xBB); // hor_stride 32, ver_stride 16
    }

    #[test]
    fn packed_staging_respects_channel_stride() {
        let mut src = Frame::new_raw(PixelFormat::Bgr24, 20, 4).unwrap();
        // Last pixel of the first row.
        src.bytes[19 * 3] = 7;
        let cfg = plan_config(ScalePolicy::P2160, &src).unwrap();
        let mut dst = vec![0u8; frame_buffer_size(&cfg)];
        stage_frame(&mut dst, &src, &cfg).unwrap();
        assert_eq!(dst[19 * 3], 7);
        // Second source row starts at the aligned stride, not at width.
        src.bytes.fill(0);
        src.bytes[20 * 3] = 9;
        stage_frame(&mut dst, &src, &cfg).unwrap();
        assert_eq!(dst[32 * 3], 9);
    }

    #[test]
    fn downscale_staging_produces_target_geometry() {
        let src = Frame::new_raw(PixelFormat::Nv12, 3840, 2160).unwrap();
        let cfg = plan_config(ScalePolicy::Native, &src).unwrap();
        assert!(cfg.downscale);
        let mut dst = vec![0u8; frame_buffer_size(&cfg)];
        stage_frame(&mut dst, &src, &cfg).unwrap();
    }
}
