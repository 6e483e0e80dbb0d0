//! Encoder configuration planning.
//!
//! Everything the adapter decides *before* touching hardware lives here so
//! the reconfiguration state machine is testable without a vendor library:
//! target geometry, stride alignment, DMA buffer sizing, and the
//! reuse-vs-reconfigure decision.

use mj_scale::{align16, resolve_target, PixelFormat, ScalePolicy};

use crate::error::{EncodeError, Result};
use crate::frame::Frame;

/// The tuple an adapter is configured for. Strides are 16-aligned copies of
/// the target dimensions, as required by the hardware engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub hor_stride: u32,
    pub ver_stride: u32,
    pub format: PixelFormat,
    /// Whether the source must be run through the NV12 downscaler on its way
    /// into the input buffer (as opposed to a stride-aligned copy).
    pub downscale: bool,
}

/// Adapter lifecycle. `Ready` means the vendor context and both DMA buffers
/// are live and sized for the embedded config; there is no partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Uninit,
    Ready(EncoderConfig),
}

impl EncoderState {
    /// True when the current configuration can encode `cfg` without a
    /// teardown/reallocate cycle.
    pub fn accepts(&self, cfg: &EncoderConfig) -> bool {
        match self {
            EncoderState::Ready(current) => {
                (current.width, current.height, current.format)
                    == (cfg.width, cfg.height, cfg.format)
            }
            EncoderState::Uninit => false,
        }
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        match self {
            EncoderState::Ready(cfg) => Some(cfg),
            EncoderState::Uninit => None,
        }
    }
}

/// Resolve the configuration one source frame requires under `policy`.
///
/// Downscaling is only available for NV12; for other formats a policy that
/// asks for a smaller target falls back to the source geometry, since the
/// nearest-neighbour scaler has no packed-format path.
pub fn plan_config(policy: ScalePolicy, frame: &Frame) -> Result<EncoderConfig> {
    if frame.format == PixelFormat::Jpeg {
        return Err(EncodeError::unsupported_format(frame.format));
    }
    if frame.width < 2 || frame.height < 2 {
        return Err(EncodeError::reconfigure(format!(
            "source geometry {}x{} too small",
            frame.width, frame.height
        )));
    }

    let target = resolve_target(policy, frame.width, frame.height, frame.format);
    let (width, height, downscale) = if target.needs_downscale {
        if frame.format == PixelFormat::Nv12 {
            // The scaler emits even dimensions; configure for what it writes.
            (target.width & !1, target.height & !1, true)
        } else {
            (frame.width, frame.height, false)
        }
    } else {
        (frame.width, frame.height, false)
    };

    Ok(EncoderConfig {
        width,
        height,
        hor_stride: align16(width),
        ver_stride: align16(height),
        format: frame.format,
        downscale,
    })
}

/// Size of the input DMA buffer for a configuration: `stride * ver_stride`
/// scaled by the per-format byte multiplier.
pub fn frame_buffer_size(cfg: &EncoderConfig) -> usize {
    let base = cfg.hor_stride as usize * cfg.ver_stride as usize;
    match cfg.format {
        PixelFormat::Nv12 => base + base / 2,
        PixelFormat::Nv16 | PixelFormat::Yuyv | PixelFormat::Uyvy => base * 2,
        PixelFormat::Nv24 | PixelFormat::Rgb24 | PixelFormat::Bgr24 => base * 3,
        // Rejected by plan_config; sized defensively as opaque bytes.
        PixelFormat::Jpeg => base,
    }
}

/// Size of the output packet DMA buffer. `width * height` is a conservative
/// upper bound for a JPEG of the configured geometry.
pub fn packet_buffer_size(cfg: &EncoderConfig) -> usize {
    cfg.width as usize * cfg.height as usize
}

/// Quality is a fixed-quantiser scale; anything outside [1, 99] is clamped.
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mj_scale::ScalePolicy;

    fn nv12(w: u32, h: u32) -> Frame {
        Frame::new_raw(PixelFormat::Nv12, w, h).unwrap()
    }

    #[test]
    fn native_policy_reconfigures_4k_nv12_to_1080p() {
        let cfg = plan_config(ScalePolicy::Native, &nv12(3840, 2160)).unwrap();
        assert_eq!((cfg.width, cfg.height), (1920, 1080));
        assert!(cfg.downscale);
        assert_eq!((cfg.hor_stride, cfg.ver_stride), (1920, 1088));
    }

    #[test]
    fn native_policy_keeps_1080p_and_packed_4k() {
        let cfg = plan_config(ScalePolicy::Native, &nv12(1920, 1080)).unwrap();
        assert_eq!((cfg.width, cfg.height), (1920, 1080));
        assert!(!cfg.downscale);

        let bgr = Frame::new_raw(PixelFormat::Bgr24, 3840, 2160).unwrap();
        let cfg = plan_config(ScalePolicy::Native, &bgr).unwrap();
        assert_eq!((cfg.width, cfg.height), (3840, 2160));
        assert!(!cfg.downscale);
    }

    #[test]
    fn packed_formats_never_downscale() {
        let yuyv = Frame::new_raw(PixelFormat::Yuyv, 2560, 1440).unwrap();
        let cfg = plan_config(ScalePolicy::P1080, &yuyv).unwrap();
        assert_eq!((cfg.width, cfg.height), (2560, 1440));
        assert!(!cfg.downscale);
    }

    #[test]
    fn state_accepts_only_matching_tuple() {
        let cfg_a = plan_config(ScalePolicy::P2160, &nv12(1920, 1080)).unwrap();
        let cfg_b = plan_config(ScalePolicy::P2160, &nv12(2560, 1440)).unwrap();
        let state = EncoderState::Ready(cfg_a);
        assert!(state.accepts(&cfg_a));
        assert!(!state.accepts(&cfg_b));
        assert!(!EncoderState::Uninit.accepts(&cfg_a));
    }

    #[test]
    fn buffer_sizing_follows_format_multipliers() {
        let cfg = plan_config(ScalePolicy::P2160, &nv12(1920, 1080)).unwrap();
        // 1920x1088 strides at 3/2 bytes per pixel.
        assert_eq!(frame_buffer_size(&cfg), 1920 * 1088 * 3 / 2);
        assert_eq!(packet_buffer_size(&cfg), 1920 * 1080);

        let rgb = Frame::new_raw(PixelFormat::Rgb24, 640, 480).unwrap();
        let cfg = plan_config(ScalePolicy::P2160, &rgb).unwrap();
        assert_eq!(frame_buffer_size(&cfg), 640 * 480 * 3);
    }

    #[test]
    fn quality_is_clamped_to_fixed_quantiser_range() {
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(80), 80);
        assert_eq!(clamp_quality(255), 99);
    }

    #[test]
    fn jpeg_input_is_rejected() {
        let mut f = Frame::new_output();
        f.width = 640;
        f.height = 480;
        assert!(matches!(
            plan_config(ScalePolicy::Native, &f),
            Err(EncodeError::UnsupportedFormat { .. })
        ));
    }
}
