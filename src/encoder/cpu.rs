//! Software JPEG backend.
//!
//! Runs the same front half as the hardware adapter (target resolve, staged
//! copy at aligned strides, blocking/overlay hooks) and then encodes on the
//! CPU. Selected with `--encoder=cpu-jpeg`, and the default on machines
//! without a vendor video engine.

use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use mj_scale::PixelFormat;

use crate::encoder::plan::{
    clamp_quality, frame_buffer_size, plan_config, EncoderConfig, EncoderState,
};
use crate::encoder::stage::{apply_overlays, stage_frame};
use crate::error::{EncodeError, Result};
use crate::frame::Frame;
use crate::SharedState;

pub struct CpuJpegEncoder {
    name: String,
    quality: u8,
    policy: mj_scale::ScalePolicy,
    state: EncoderState,
    /// Input staging buffer at the configured strides, zero-filled on
    /// (re)allocation so padding never reaches the output.
    staging: Vec<u8>,
    shared: SharedState,
}

impl CpuJpegEncoder {
    pub fn new(
        name: impl Into<String>,
        quality: u8,
        policy: mj_scale::ScalePolicy,
        shared: SharedState,
    ) -> Self {
        Self {
            name: name.into(),
            quality: clamp_quality(quality),
            policy,
            state: EncoderState::Uninit,
            staging: Vec::new(),
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Currently configured tuple, if the encoder has seen a frame.
    pub fn configured(&self) -> Option<&EncoderConfig> {
        self.state.config()
    }

    /// Encode one frame into `out` as a standalone JPEG packet.
    pub fn compress(&mut self, src: &Frame, out: &mut Frame) -> Result<()> {
        let begin = Instant::now();
        src.check_raw()?;
        let cfg = plan_config(self.policy, src)?;
        if !self.state.accepts(&cfg) {
            self.reconfigure(cfg)?;
        }

        stage_frame(&mut self.staging, src, &cfg)?;
        apply_overlays(&mut self.staging, src, &cfg, &self.shared)?;

        let rgb = staged_to_rgb(&self.staging, &cfg);
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(&rgb, cfg.width, cfg.height, ExtendedColorType::Rgb8)
            .map_err(|e| EncodeError::retrieve(e.to_string()))?;
        if jpeg.is_empty() {
            return Err(EncodeError::EmptyPacket);
        }

        out.width = cfg.width;
        out.height = cfg.height;
        out.stride = 0;
        out.format = PixelFormat::Jpeg;
        out.used = jpeg.len();
        out.bytes = jpeg;
        out.is_key = true;
        out.gop = 0;
        out.capture_ts = src.capture_ts;
        out.encode_begin_ts = Some(begin);
        out.encode_end_ts = Some(Instant::now());
        Ok(())
    }

    fn reconfigure(&mut self, cfg: EncoderConfig) -> Result<()> {
        self.state = EncoderState::Uninit;
        let size = frame_buffer_size(&cfg);
        self.staging.clear();
        if self.staging.try_reserve(size).is_err() {
            return Err(EncodeError::reconfigure_from(
                "staging buffer",
                EncodeError::alloc("frame buffer", format!("{} bytes", size)),
            ));
        }
        self.staging.resize(size, 0);
        self.state = EncoderState::Ready(cfg);
        Ok(())
    }
}

/// Expand a staged buffer to packed RGB for the CPU JPEG encoder.
///
/// YUV inputs use the BT.601 limited-range inverse; RGB inputs only drop
/// the stride padding (BGR additionally swaps channels).
fn staged_to_rgb(staging: &[u8], cfg: &EncoderConfig) -> Vec<u8> {
    let w = cfg.width as usize;
    let h = cfg.height as usize;
    let stride = cfg.hor_stride as usize;
    let ver_stride = cfg.ver_stride as usize;
    let mut rgb = vec![0u8; w * h * 3];

    match cfg.format {
        PixelFormat::Nv12 | PixelFormat::Nv16 | PixelFormat::Nv24 => {
            let uv_plane = &staging[stride * ver_stride..];
            for row in 0..h {
                for col in 0..w {
                    let luma = staging[row * stride + col];
                    let (u, v) = match cfg.format {
                        PixelFormat::Nv12 => {
                            let off = (row / 2) * stride + (col & !1);
                            (uv_plane[off], uv_plane[off + 1])
                        }
                        PixelFormat::Nv16 => {
                            let off = row * stride + (col & !1);
                            (uv_plane[off], uv_plane[off + 1])
                        }
                        _ => {
                            let off = row * stride * 2 + col * 2;
                            (uv_plane[off], uv_plane[off + 1])
                        }
                    };
                    write_rgb(&mut rgb, (row * w + col) * 3, luma, u, v);
                }
            }
        }
        PixelFormat::Yuyv | PixelFormat::Uyvy => {
            let row_stride = stride * 2;
            for row in 0..h {
                let line = &staging[row * row_stride..];
                for col in 0..w {
                    let pair = (col & !1) * 2;
                    let (luma, u, v) = if cfg.format == PixelFormat::Yuyv {
                        (line[col * 2], line[pair + 1], line[pair + 3])
                    } else {
                        (line[col * 2 + 1], line[pair], line[pair + 2])
                    };
                    write_rgb(&mut rgb, (row * w + col) * 3, luma, u, v);
                }
            }
        }
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
            let row_stride = stride * 3;
            let swap = cfg.format == PixelFormat::Bgr24;
            for row in 0..h {
                let line = &staging[row * row_stride..row * row_stride + w * 3];
                let out = &mut rgb[row * w * 3..(row + 1) * w * 3];
                if swap {
                    for col in 0..w {
                        out[col * 3] = line[col * 3 + 2];
                        out[col * 3 + 1] = line[col * 3 + 1];
                        out[col * 3 + 2] = line[col * 3];
                    }
                } else {
                    out.copy_from_slice(line);
                }
            }
        }
        PixelFormat::Jpeg => {}
    }
    rgb
}

#[inline]
fn write_rgb(rgb: &mut [u8], off: usize, y: u8, u: u8, v: u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    rgb[off] = ((298 * c + 409 * e + 128) >> 8).clamp(0, 255) as u8;
    rgb[off + 1] = ((298 * c - 100 * d - 208 * e + 128) >> 8).clamp(0, 255) as u8;
    rgb[off + 2] = ((298 * c + 516 * d + 128) >> 8).clamp(0, 255) as u8;
}
