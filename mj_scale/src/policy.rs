// SPDX-License-Identifier: MIT
/// Target-resolution policy: collapses input geometry to a fixed output set.
use crate::format::PixelFormat;

/// User-selectable output resolution rule.
///
/// The policy is a pure configuration token; [`resolve_target`] applies it to
/// an input geometry. Output never exceeds input in either dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ScalePolicy {
    /// Pass input through, except 4K-and-up NV12 which drops to 1080p.
    #[clap(name = "native")]
    Native,
    /// Clamp to 1920x1080.
    #[clap(name = "1080p")]
    P1080,
    /// Clamp to 2560x1440.
    #[clap(name = "2k")]
    P1440,
    /// Clamp to 3840x2160 (input unchanged; nothing larger is captured).
    #[clap(name = "4k")]
    P2160,
}

/// Result of applying a [`ScalePolicy`] to one input geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
    /// True iff the target differs from the input and a downscale pass is
    /// required before encoding.
    pub needs_downscale: bool,
}

/// Map `(policy, input geometry, format)` to the encoder target geometry.
///
/// Never upscales: both target dimensions are clamped to the input. The
/// `Native` rule only engages for NV12 sources at 4K and above; everything
/// else passes through unchanged.
pub fn resolve_target(
    policy: ScalePolicy,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> TargetGeometry {
    let (tw, th) = match policy {
        ScalePolicy::P1080 => (width.min(1920), height.min(1080)),
        ScalePolicy::P1440 => (width.min(2560), height.min(1440)),
        ScalePolicy::P2160 => (width, height),
        ScalePolicy::Native => {
            if width >= 3840 && height >= 2160 && format == PixelFormat::Nv12 {
                (width.min(1920), height.min(1080))
            } else {
                (width, height)
            }
        }
    };
    TargetGeometry {
        width: tw,
        height: th,
        needs_downscale: (tw, th) != (width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_input() {
        let policies = [
            ScalePolicy::Native,
            ScalePolicy::P1080,
            ScalePolicy::P1440,
            ScalePolicy::P2160,
        ];
        let shapes = [(640, 480), (1280, 720), (1920, 1080), (2560, 1440), (3840, 2160)];
        for policy in policies {
            for (w, h) in shapes {
                let t = resolve_target(policy, w, h, PixelFormat::Nv12);
                assert!(t.width <= w && t.height <= h, "{policy:?} {w}x{h}");
                assert_eq!(t.needs_downscale, (t.width, t.height) != (w, h));
            }
        }
    }

    #[test]
    fn p1080_clamps_both_axes() {
        let t = resolve_target(ScalePolicy::P1080, 3840, 2160, PixelFormat::Nv12);
        assert_eq!((t.width, t.height), (1920, 1080));
        assert!(t.needs_downscale);

        // Smaller input passes through.
        let t = resolve_target(ScalePolicy::P1080, 1280, 720, PixelFormat::Nv12);
        assert_eq!((t.width, t.height), (1280, 720));
        assert!(!t.needs_downscale);
    }

    #[test]
    fn native_drops_4k_nv12_to_1080p() {
        let t = resolve_target(ScalePolicy::Native, 3840, 2160, PixelFormat::Nv12);
        assert_eq!((t.width, t.height), (1920, 1080));
        assert!(t.needs_downscale);
    }

    #[test]
    fn native_passes_non_nv12_and_sub_4k_through() {
        let t = resolve_target(ScalePolicy::Native, 3840, 2160, PixelFormat::Bgr24);
        assert_eq!((t.width, t.height), (3840, 2160));
        assert!(!t.needs_downscale);

        let t = resolve_target(ScalePolicy::Native, 1920, 1080, PixelFormat::Nv12);
        assert_eq!((t.width, t.height), (1920, 1080));
        assert!(!t.needs_downscale);
    }

    #[test]
    fn p2160_is_passthrough() {
        let t = resolve_target(ScalePolicy::P2160, 2560, 1440, PixelFormat::Nv12);
        assert_eq!((t.width, t.height), (2560, 1440));
        assert!(!t.needs_downscale);
    }
}
